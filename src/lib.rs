//! Decides whether two large JSON documents, each a top-level array, contain
//! the same multiset of elements: identical elements in any order, any number
//! of times, with object key order ignored.
//!
//! Both documents are consumed as streams. Each element is decoded
//! incrementally by [`json_array_stream::ArrayStreamReader`], reduced to a
//! canonical byte form ([`canonical_bytes`]), hashed ([`fingerprint`]), and
//! reconciled through a shared signed multiset ([`ShredCounter`]): one stream
//! counts up, the other counts down, and the documents are identical iff the
//! counter is empty at the end. See [`compare`].

mod canonical;
mod compare;
mod fingerprint;
mod shred;

pub use canonical::canonical_bytes;
pub use compare::{compare, CompareError, StreamSide, Verdict};
pub use fingerprint::{fingerprint, Fingerprint};
pub use shred::ShredCounter;
