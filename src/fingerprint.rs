use std::fmt;

use sha2::{Digest, Sha256};

/// SHA-256 digest of an element's canonical bytes, used as the multiset key.
///
/// Identical canonical bytes always produce the same fingerprint, so two
/// elements compare equal iff their fingerprints do (up to cryptographic
/// collision probability).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

/// Hashes canonical bytes into a [`Fingerprint`].
pub fn fingerprint(canonical: &[u8]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(canonical);
    Fingerprint(hasher.finalize().into())
}

impl fmt::LowerHex for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(self, f)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({self:x})")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_known_digest() {
        assert_eq!(
            fingerprint(b"abc").to_string(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_same_input_same_fingerprint() {
        assert_eq!(fingerprint(b"[1,2]"), fingerprint(b"[1,2]"));
        assert_ne!(fingerprint(b"[1,2]"), fingerprint(b"[2,1]"));
    }
}
