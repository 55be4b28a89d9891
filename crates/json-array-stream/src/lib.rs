//! Incremental pull parser for JSON documents whose top level is an array.
//!
//! [`ArrayStreamReader`] validates the array structure as it goes and yields
//! one decoded [`serde_json::Value`] element per pull, so arbitrarily large
//! documents can be consumed without ever holding more than one element in
//! memory.
//!
//! Errors carry the [`Location`] (byte offset, line and column) at which they
//! were encountered, and distinguish structural problems at the top level
//! from undecodable elements and from failures of the byte stream itself.
//!
//! ```
//! use json_array_stream::ArrayStreamReader;
//!
//! let doc = br#"[{"a": 1}, [2, 3], "four"]"#;
//! let mut reader = ArrayStreamReader::from_reader(&doc[..]);
//! let mut count = 0;
//! while let Some(element) = reader.next_element().unwrap() {
//!     let _ = element;
//!     count += 1;
//! }
//! assert_eq!(count, 3);
//! ```

mod reader;
mod tokenizer;

pub use reader::{ArrayStreamReader, ByteSource, StreamError};
pub use tokenizer::{JsonToken, JsonTokenizer, Location, TokenError, TokenResult};
