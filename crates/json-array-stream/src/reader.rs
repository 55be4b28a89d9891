use std::io::{self, Read};

use serde_json::{Map, Value};
use thiserror::Error;

use crate::tokenizer::{JsonToken, JsonTokenizer, Location, TokenError};

/// Errors surfaced by [`ArrayStreamReader`].
#[derive(Debug, Error)]
pub enum StreamError {
    /// The document's top level is not a well-formed JSON array.
    #[error("malformed document structure at {location}: {msg}")]
    MalformedStructure { msg: String, location: Location },
    /// A value inside the array could not be decoded.
    #[error("malformed array element at {location}: {msg}")]
    MalformedElement { msg: String, location: Location },
    /// The byte stream failed, or ended in the middle of an element.
    #[error("stream failed at {location}: {source}")]
    StreamIo {
        #[source]
        source: io::Error,
        location: Location,
    },
}

/// Buffered byte iterator over an [`io::Read`].
///
/// Unlike `Read::bytes`, this reads in 4 KiB chunks. A read error is yielded
/// exactly once; after that the iterator is fused.
pub struct ByteSource<R> {
    reader: R,
    buf: Vec<u8>,
    valid_slice_start: usize,
    valid_slice_end: usize,
    done: bool,
}

impl<R> ByteSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: vec![0; 4096],
            valid_slice_start: 0,
            valid_slice_end: 0,
            done: false,
        }
    }
}

impl<R: Read> Iterator for ByteSource<R> {
    type Item = io::Result<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.valid_slice_start != self.valid_slice_end {
            let b = self.buf[self.valid_slice_start];
            self.valid_slice_start += 1;
            return Some(Ok(b));
        }
        if self.done {
            return None;
        }
        loop {
            match self.reader.read(&mut self.buf) {
                Ok(0) => {
                    self.done = true;
                    return None;
                }
                Ok(read_len) => {
                    self.valid_slice_start = 1;
                    self.valid_slice_end = read_len;
                    return Some(Ok(self.buf[0]));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    AtStart,
    AtFirstElement,
    BetweenElements,
    Finished,
}

/// Incrementally reads one top-level JSON array from a byte stream, yielding
/// one decoded element per call to [`next_element`](Self::next_element).
///
/// The reader is forward-only and non-restartable: the first error is
/// terminal, and after it (or after the closing bracket) no further elements
/// are produced. Only one element is buffered at a time, so documents far
/// larger than memory can be consumed.
pub struct ArrayStreamReader<I: Iterator<Item = io::Result<u8>>> {
    tokenizer: JsonTokenizer<I>,
    state: ReaderState,
}

impl<R: Read> ArrayStreamReader<ByteSource<R>> {
    /// Creates a reader over an [`io::Read`], buffering reads internally.
    pub fn from_reader(reader: R) -> Self {
        ArrayStreamReader::new(ByteSource::new(reader))
    }
}

impl<I: Iterator<Item = io::Result<u8>>> ArrayStreamReader<I> {
    /// Creates a reader over an iterator of bytes.
    pub fn new(bytes: I) -> Self {
        ArrayStreamReader {
            tokenizer: JsonTokenizer::new(bytes),
            state: ReaderState::AtStart,
        }
    }

    /// Decodes the next array element, `Ok(None)` once the closing bracket
    /// has been consumed.
    pub fn next_element(&mut self) -> Result<Option<Value>, StreamError> {
        let result = self.advance();
        if result.is_err() {
            self.state = ReaderState::Finished;
        }
        result
    }

    fn advance(&mut self) -> Result<Option<Value>, StreamError> {
        loop {
            match self.state {
                ReaderState::AtStart => {
                    let token = self.next_structural_token("expected opening bracket '['")?;
                    if token != JsonToken::ArrayOpen {
                        return Err(StreamError::MalformedStructure {
                            msg: format!(
                                "expected opening bracket '[', found {}",
                                describe(&token)
                            ),
                            location: self.tokenizer.location(),
                        });
                    }
                    self.state = ReaderState::AtFirstElement;
                }
                ReaderState::AtFirstElement => {
                    let token = self
                        .next_element_token("expected an array element or closing bracket ']'")?;
                    if token == JsonToken::ArrayClose {
                        return self.finish();
                    }
                    let value = self.parse_value(token)?;
                    self.state = ReaderState::BetweenElements;
                    return Ok(Some(value));
                }
                ReaderState::BetweenElements => {
                    let token =
                        self.next_structural_token("expected ',' or closing bracket ']'")?;
                    return match token {
                        JsonToken::ArrayClose => self.finish(),
                        JsonToken::Comma => {
                            let token = self.next_element_token("expected an array element")?;
                            Ok(Some(self.parse_value(token)?))
                        }
                        other => Err(StreamError::MalformedStructure {
                            msg: format!(
                                "expected ',' or closing bracket ']', found {}",
                                describe(&other)
                            ),
                            location: self.tokenizer.location(),
                        }),
                    };
                }
                ReaderState::Finished => return Ok(None),
            }
        }
    }

    fn finish(&mut self) -> Result<Option<Value>, StreamError> {
        self.tokenizer.expect_eof().map_err(|e| match e {
            TokenError::Syntax { msg, location } => {
                StreamError::MalformedStructure { msg, location }
            }
            other => element_error(other),
        })?;
        self.state = ReaderState::Finished;
        Ok(None)
    }

    /// Fetches a token at a top-level position: end of input here means the
    /// document structure is incomplete, not that a read failed.
    fn next_structural_token(&mut self, expected: &str) -> Result<JsonToken, StreamError> {
        match self.tokenizer.peek_past_whitespace() {
            Ok(Some(_)) => {}
            Ok(None) => {
                return Err(StreamError::MalformedStructure {
                    msg: format!("{expected}, but the input ended"),
                    location: self.tokenizer.location(),
                })
            }
            Err(e) => return Err(element_error(e)),
        }
        self.tokenizer.next_token().map_err(|e| match e {
            TokenError::Syntax { msg, location } => {
                StreamError::MalformedStructure { msg, location }
            }
            other => element_error(other),
        })
    }

    /// Fetches the first token of an element. A syntax error here belongs to
    /// the element; end of input before any byte of it is a structure error.
    fn next_element_token(&mut self, eof_msg: &str) -> Result<JsonToken, StreamError> {
        match self.tokenizer.peek_past_whitespace() {
            Ok(Some(_)) => {}
            Ok(None) => {
                return Err(StreamError::MalformedStructure {
                    msg: format!("{eof_msg}, but the input ended"),
                    location: self.tokenizer.location(),
                })
            }
            Err(e) => return Err(element_error(e)),
        }
        self.tokenizer.next_token().map_err(element_error)
    }

    fn next_value_token(&mut self) -> Result<JsonToken, StreamError> {
        self.tokenizer.next_token().map_err(element_error)
    }

    fn parse_value(&mut self, token: JsonToken) -> Result<Value, StreamError> {
        match token {
            JsonToken::Null => Ok(Value::Null),
            JsonToken::True => Ok(Value::Bool(true)),
            JsonToken::False => Ok(Value::Bool(false)),
            JsonToken::Number(n) => Ok(Value::Number(n)),
            JsonToken::String(s) => Ok(Value::String(s)),
            JsonToken::ArrayOpen => self.parse_array(),
            JsonToken::ObjOpen => self.parse_object(),
            other => Err(StreamError::MalformedElement {
                msg: format!("unexpected {} at the start of a value", describe(&other)),
                location: self.tokenizer.location(),
            }),
        }
    }

    fn parse_array(&mut self) -> Result<Value, StreamError> {
        let mut items = Vec::new();
        let mut token = self.next_value_token()?;
        if token == JsonToken::ArrayClose {
            return Ok(Value::Array(items));
        }
        loop {
            items.push(self.parse_value(token)?);
            match self.next_value_token()? {
                JsonToken::Comma => token = self.next_value_token()?,
                JsonToken::ArrayClose => return Ok(Value::Array(items)),
                other => {
                    return Err(StreamError::MalformedElement {
                        msg: format!(
                            "expected ',' or ']' in nested array, found {}",
                            describe(&other)
                        ),
                        location: self.tokenizer.location(),
                    })
                }
            }
        }
    }

    fn parse_object(&mut self) -> Result<Value, StreamError> {
        let mut map = Map::new();
        let mut token = self.next_value_token()?;
        if token == JsonToken::ObjClose {
            return Ok(Value::Object(map));
        }
        loop {
            let key = match token {
                JsonToken::String(s) => s,
                other => {
                    return Err(StreamError::MalformedElement {
                        msg: format!("object key must be a string, found {}", describe(&other)),
                        location: self.tokenizer.location(),
                    })
                }
            };
            match self.next_value_token()? {
                JsonToken::Colon => {}
                other => {
                    return Err(StreamError::MalformedElement {
                        msg: format!("expected ':' after object key, found {}", describe(&other)),
                        location: self.tokenizer.location(),
                    })
                }
            }
            let value_token = self.next_value_token()?;
            let value = self.parse_value(value_token)?;
            // Last value wins for duplicate keys, same as serde_json.
            map.insert(key, value);
            match self.next_value_token()? {
                JsonToken::Comma => token = self.next_value_token()?,
                JsonToken::ObjClose => return Ok(Value::Object(map)),
                other => {
                    return Err(StreamError::MalformedElement {
                        msg: format!("expected ',' or '}}' in object, found {}", describe(&other)),
                        location: self.tokenizer.location(),
                    })
                }
            }
        }
    }
}

fn element_error(err: TokenError) -> StreamError {
    match err {
        TokenError::Io { source, location } => StreamError::StreamIo { source, location },
        TokenError::UnexpectedEof { location } => StreamError::StreamIo {
            source: io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "input ended inside an array element",
            ),
            location,
        },
        TokenError::Syntax { msg, location } => StreamError::MalformedElement { msg, location },
    }
}

fn describe(token: &JsonToken) -> &'static str {
    match token {
        JsonToken::Number(_) => "a number",
        JsonToken::True | JsonToken::False => "a boolean",
        JsonToken::String(_) => "a string",
        JsonToken::Null => "'null'",
        JsonToken::ArrayOpen => "'['",
        JsonToken::Comma => "','",
        JsonToken::ArrayClose => "']'",
        JsonToken::ObjOpen => "'{'",
        JsonToken::Colon => "':'",
        JsonToken::ObjClose => "'}'",
    }
}
