use std::collections::hash_map::Entry;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rustc_hash::FxHashMap;

use crate::fingerprint::Fingerprint;

/// Concurrency-safe signed multiset keyed by [`Fingerprint`].
///
/// A positive count means the left stream has produced a fingerprint more
/// often than the right stream so far; negative means the reverse. Entries
/// that reach zero are removed immediately, so an empty counter means both
/// streams have produced the same multiset of fingerprints. The storage is
/// reachable only through the four operations below; every operation takes
/// the lock once and never fails.
pub struct ShredCounter {
    entries: Mutex<FxHashMap<Fingerprint, i64>>,
}

impl ShredCounter {
    pub fn new() -> Self {
        ShredCounter {
            entries: Mutex::new(FxHashMap::default()),
        }
    }

    // Poisoning is recoverable here: every mutation is a single entry update.
    fn entries(&self) -> MutexGuard<'_, FxHashMap<Fingerprint, i64>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records one occurrence from the left stream.
    pub fn increase(&self, fingerprint: Fingerprint) {
        match self.entries().entry(fingerprint) {
            Entry::Occupied(mut occupied) => {
                if *occupied.get() == -1 {
                    // The right stream had one unmatched occurrence; cancelled.
                    occupied.remove();
                } else {
                    *occupied.get_mut() += 1;
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(1);
            }
        }
    }

    /// Records one occurrence from the right stream.
    pub fn decrease(&self, fingerprint: Fingerprint) {
        match self.entries().entry(fingerprint) {
            Entry::Occupied(mut occupied) => {
                if *occupied.get() == 1 {
                    occupied.remove();
                } else {
                    *occupied.get_mut() -= 1;
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(-1);
            }
        }
    }

    /// Number of fingerprints with a nonzero residual count.
    pub fn size(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

impl Default for ShredCounter {
    fn default() -> Self {
        Self::new()
    }
}
