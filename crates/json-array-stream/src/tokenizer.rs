use std::fmt;
use std::io;

use serde_json::Number;
use smallvec::SmallVec;
use thiserror::Error;

/// A single JSON token.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonToken {
    Number(Number),
    True,
    False,
    String(String),
    Null,
    ArrayOpen,
    Comma,
    ArrayClose,
    ObjOpen,
    Colon,
    ObjClose,
}

/// A byte offset and the corresponding line and column number.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Location {
    pub byte_offset: u64,
    pub line: u64,
    pub col: u64,
}

impl Location {
    fn advance_by_byte(&mut self, b: u8) {
        if b == b'\n' {
            self.col = 0;
            self.line += 1;
        } else {
            self.col += 1;
        }
        self.byte_offset += 1;
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}, col {} (byte {})",
            self.line, self.col, self.byte_offset
        )
    }
}

/// Errors produced while scanning tokens.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("{location}: {msg}")]
    Syntax { msg: String, location: Location },
    #[error("{location}: unexpected end of input")]
    UnexpectedEof { location: Location },
    #[error("{location}: read failed: {source}")]
    Io {
        #[source]
        source: io::Error,
        location: Location,
    },
}

impl TokenError {
    /// The location in the source document at which the error was encountered.
    pub fn location(&self) -> Location {
        match self {
            TokenError::Syntax { location, .. }
            | TokenError::UnexpectedEof { location }
            | TokenError::Io { location, .. } => *location,
        }
    }
}

pub type TokenResult<T> = Result<T, TokenError>;

// Note: char::is_ascii_whitespace is not usable here because some characters
// are not defined as whitespace in the JSON spec. For example, U+000C FORM
// FEED is whitespace in Rust but not in JSON.
fn is_whitespace(b: u8) -> bool {
    matches!(b, 0x20 | 0xa | 0xd | 0x9)
}

/// A pull-based tokenizer which takes an iterator over `io::Result<u8>` and
/// emits [`JsonToken`]s. Read errors from the underlying iterator surface as
/// [`TokenError::Io`].
pub struct JsonTokenizer<I: Iterator<Item = io::Result<u8>>> {
    bytes: I,
    lookahead: Option<u8>,
    location: Location,
}

impl<I: Iterator<Item = io::Result<u8>>> JsonTokenizer<I> {
    /// Creates a new [`JsonTokenizer`].
    pub fn new(it: I) -> Self {
        JsonTokenizer {
            bytes: it,
            lookahead: None,
            location: Location::default(),
        }
    }

    /// The location of the byte that will be consumed next.
    pub fn location(&self) -> Location {
        self.location
    }

    /// Returns an error if there is more than just whitespace in the
    /// remaining bytes.
    pub fn expect_eof(&mut self) -> TokenResult<()> {
        match self.peek_past_whitespace()? {
            Some(b) => self.err(format!("expected end of input, found byte {b:#x}")),
            None => Ok(()),
        }
    }

    /// Skips whitespace and peeks at the first byte of the next token, if any.
    pub fn peek_past_whitespace(&mut self) -> TokenResult<Option<u8>> {
        while let Some(b) = self.peek_byte()? {
            if !is_whitespace(b) {
                return Ok(Some(b));
            }
            self.lookahead = None;
            self.location.advance_by_byte(b);
        }
        Ok(None)
    }

    fn err<T>(&self, msg: impl Into<String>) -> TokenResult<T> {
        Err(TokenError::Syntax {
            msg: msg.into(),
            location: self.location,
        })
    }

    fn eof_err(&self) -> TokenError {
        TokenError::UnexpectedEof {
            location: self.location,
        }
    }

    fn peek_byte(&mut self) -> TokenResult<Option<u8>> {
        if self.lookahead.is_none() {
            match self.bytes.next() {
                None => {}
                Some(Ok(b)) => self.lookahead = Some(b),
                Some(Err(source)) => {
                    return Err(TokenError::Io {
                        source,
                        location: self.location,
                    })
                }
            }
        }
        Ok(self.lookahead)
    }

    fn consume_byte(&mut self) -> TokenResult<u8> {
        match self.peek_byte()? {
            Some(b) => {
                self.lookahead = None;
                self.location.advance_by_byte(b);
                Ok(b)
            }
            None => Err(self.eof_err()),
        }
    }

    fn consume_string(&mut self) -> TokenResult<JsonToken> {
        self.consume_byte()?; // opening quote, checked by the caller

        let mut s = SmallVec::<[u8; 32]>::new();
        loop {
            let b = match self.consume_byte()? {
                b'\\' => match self.consume_byte()? {
                    b'\\' => b'\\',
                    b'/' => b'/',
                    b'"' => b'"',
                    b'b' => 0x8,
                    b'f' => 0xc,
                    b'n' => b'\n',
                    b'r' => b'\r',
                    b't' => b'\t',
                    b'u' => {
                        let c = self.consume_unicode_escape()?;
                        let mut buf = [0u8; 4];
                        s.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                        continue;
                    }
                    b => return self.err(format!("{b:#x} is an invalid escape character")),
                },
                b'"' => {
                    return match String::from_utf8(s.to_vec()) {
                        Ok(s) => Ok(JsonToken::String(s)),
                        Err(_) => self.err("invalid UTF-8 in string literal"),
                    };
                }
                // JSON string literals may not contain unescaped control
                // characters, but 0x7f (DEL) is fine.
                b if b < 0x20 => {
                    return self.err(format!("unescaped control character {b:#x} in string"));
                }
                b => b,
            };

            s.push(b);
        }
    }

    fn consume_hex4(&mut self) -> TokenResult<u16> {
        let mut u = 0u16;
        for _ in 0..4 {
            let b = self.consume_byte()?;
            match ascii_byte_to_hex_digit(b) {
                Some(h) => u = u * 0x10 + h as u16,
                None => {
                    return self
                        .err(format!("unicode escape must be \\uXXXX, found byte {b:#x}"))
                }
            }
        }
        Ok(u)
    }

    fn consume_unicode_escape(&mut self) -> TokenResult<char> {
        let u = self.consume_hex4()?;
        let code = match u {
            0xD800..=0xDBFF => {
                // First surrogate. The second one must follow directly.
                if self.consume_byte()? != b'\\' || self.consume_byte()? != b'u' {
                    return self.err(format!(
                        "first UTF-16 surrogate {u:#x} must be directly followed by a \\uXXXX second surrogate"
                    ));
                }
                let u2 = self.consume_hex4()?;
                if !matches!(u2, 0xDC00..=0xDFFF) {
                    return self.err(format!(
                        "expected a second UTF-16 surrogate after {u:#x}, found {u2:#x}"
                    ));
                }
                ((((u & 0x3ff) as u32) << 10) | (u2 & 0x3ff) as u32) + 0x1_0000
            }
            0xDC00..=0xDFFF => {
                return self.err(format!("unpaired UTF-16 second surrogate {u:#x}"));
            }
            _ => u as u32,
        };
        match char::from_u32(code) {
            Some(c) => Ok(c),
            None => self.err(format!("invalid unicode scalar value {code:#x}")),
        }
    }

    fn consume_constant(&mut self, s: &'static str) -> TokenResult<()> {
        for expected_byte in s.as_bytes() {
            let b = self.consume_byte()?;
            if b != *expected_byte {
                return self.err(format!("unexpected byte {b:#x} while parsing '{s}'"));
            }
        }
        Ok(())
    }

    fn consume_null(&mut self) -> TokenResult<JsonToken> {
        self.consume_constant("null")?;
        Ok(JsonToken::Null)
    }

    fn consume_true(&mut self) -> TokenResult<JsonToken> {
        self.consume_constant("true")?;
        Ok(JsonToken::True)
    }

    fn consume_false(&mut self) -> TokenResult<JsonToken> {
        self.consume_constant("false")?;
        Ok(JsonToken::False)
    }

    // Integer literals that fit i64/u64 keep integer identity; fractional and
    // exponent forms normalize through f64. So `1` and `1.0` stay distinct
    // while `1.0`, `1.00` and `1e0` decode to the same number.
    fn consume_number(&mut self) -> TokenResult<JsonToken> {
        let mut s = SmallVec::<[u8; 16]>::new();
        if self.peek_byte()? == Some(b'-') {
            s.push(self.consume_byte()?);
        }

        let mut int_digits = 0usize;
        while let Some(d @ b'0'..=b'9') = self.peek_byte()? {
            self.consume_byte()?;
            s.push(d);
            int_digits += 1;
        }
        if int_digits == 0 {
            return self.err("integer part must not be empty in number literal");
        }
        if int_digits > 1 && s[s.len() - int_digits] == b'0' {
            return self.err("integer part of number must not start with 0 except for '0'");
        }

        let mut is_integer = true;

        if self.peek_byte()? == Some(b'.') {
            is_integer = false;
            s.push(self.consume_byte()?);
            let mut frac_digits = 0usize;
            while let Some(d @ b'0'..=b'9') = self.peek_byte()? {
                self.consume_byte()?;
                s.push(d);
                frac_digits += 1;
            }
            if frac_digits == 0 {
                return self.err("fraction part must not be empty in number literal");
            }
        }

        if matches!(self.peek_byte()?, Some(b'e') | Some(b'E')) {
            is_integer = false;
            s.push(self.consume_byte()?);
            if matches!(self.peek_byte()?, Some(b'+') | Some(b'-')) {
                s.push(self.consume_byte()?);
            }
            let mut exp_digits = 0usize;
            while let Some(d @ b'0'..=b'9') = self.peek_byte()? {
                self.consume_byte()?;
                s.push(d);
                exp_digits += 1;
            }
            if exp_digits == 0 {
                return self.err("exponent part must not be empty in number literal");
            }
        }

        let text = match std::str::from_utf8(&s) {
            Ok(text) => text,
            Err(_) => return self.err("number literal is not valid UTF-8"),
        };
        let number = if is_integer {
            if s[0] == b'-' {
                text.parse::<i64>().ok().map(Number::from)
            } else {
                text.parse::<u64>().ok().map(Number::from)
            }
            .or_else(|| parse_finite_f64(text))
        } else {
            parse_finite_f64(text)
        };
        match number {
            Some(n) => Ok(JsonToken::Number(n)),
            None => self.err(format!("number literal '{text}' is out of range")),
        }
    }

    /// Scans one token and returns it, or an error.
    pub fn next_token(&mut self) -> TokenResult<JsonToken> {
        let b = self.peek_past_whitespace()?.ok_or_else(|| self.eof_err())?;
        let token = match b {
            b'[' => JsonToken::ArrayOpen,
            b']' => JsonToken::ArrayClose,
            b'{' => JsonToken::ObjOpen,
            b'}' => JsonToken::ObjClose,
            b':' => JsonToken::Colon,
            b',' => JsonToken::Comma,
            b'0'..=b'9' | b'-' => return self.consume_number(),
            b'"' => return self.consume_string(),
            b't' => return self.consume_true(),
            b'f' => return self.consume_false(),
            b'n' => return self.consume_null(),
            b => return self.err(format!("invalid byte {b:#x}")),
        };
        self.consume_byte()?;
        Ok(token)
    }
}

fn parse_finite_f64(text: &str) -> Option<Number> {
    text.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(Number::from_f64)
}

fn ascii_byte_to_hex_digit(c: u8) -> Option<u8> {
    if c.is_ascii_digit() {
        Some(c - b'0')
    } else if (b'a'..=b'f').contains(&c) {
        Some(10 + (c - b'a'))
    } else if (b'A'..=b'F').contains(&c) {
        Some(10 + (c - b'A'))
    } else {
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn tokenize(s: &str) -> (Vec<JsonToken>, Option<TokenError>) {
        let mut tokenizer = JsonTokenizer::new(s.bytes().map(Ok::<u8, io::Error>));
        let mut v = Vec::new();
        loop {
            match tokenizer.peek_past_whitespace() {
                Ok(None) => return (v, None),
                Ok(Some(_)) => {}
                Err(e) => return (v, Some(e)),
            }
            match tokenizer.next_token() {
                Ok(token) => v.push(token),
                Err(e) => return (v, Some(e)),
            }
        }
    }

    #[test]
    fn test_basic_tokens() {
        let (v, e) = tokenize(r#"[{"key": 12, "other": [null, true, false]}]"#);
        assert!(e.is_none());
        assert_eq!(
            v,
            vec![
                JsonToken::ArrayOpen,
                JsonToken::ObjOpen,
                JsonToken::String("key".into()),
                JsonToken::Colon,
                JsonToken::Number(Number::from(12u64)),
                JsonToken::Comma,
                JsonToken::String("other".into()),
                JsonToken::Colon,
                JsonToken::ArrayOpen,
                JsonToken::Null,
                JsonToken::Comma,
                JsonToken::True,
                JsonToken::Comma,
                JsonToken::False,
                JsonToken::ArrayClose,
                JsonToken::ObjClose,
                JsonToken::ArrayClose,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        let (v, e) = tokenize("0 -7 3.25 1e2 -0.5E-1");
        assert!(e.is_none());
        assert_eq!(
            v,
            vec![
                JsonToken::Number(Number::from(0u64)),
                JsonToken::Number(Number::from(-7i64)),
                JsonToken::Number(Number::from_f64(3.25).unwrap()),
                JsonToken::Number(Number::from_f64(100.0).unwrap()),
                JsonToken::Number(Number::from_f64(-0.05).unwrap()),
            ]
        );
    }

    #[test]
    fn test_integer_and_float_literals_stay_distinct() {
        let (v, e) = tokenize("1 1.0");
        assert!(e.is_none());
        assert_ne!(v[0], v[1]);
    }

    #[test]
    fn test_bad_numbers() {
        for s in ["01", "1.", "-", "1e", "1e+", "-.5"] {
            let (_, e) = tokenize(s);
            assert!(
                matches!(e, Some(TokenError::Syntax { .. })),
                "expected syntax error for {s:?}"
            );
        }
    }

    #[test]
    fn test_huge_number_is_out_of_range() {
        let (_, e) = tokenize("1e999");
        assert!(matches!(e, Some(TokenError::Syntax { .. })));
    }

    #[test]
    fn test_string_escapes() {
        let (v, e) = tokenize(r#""a\"b\\c\nd\u0041e""#);
        assert!(e.is_none());
        assert_eq!(v, vec![JsonToken::String("a\"b\\c\ndAe".into())]);
    }

    #[test]
    fn test_surrogate_pair() {
        let (v, e) = tokenize(r#""\ud83d\ude00""#);
        assert!(e.is_none());
        assert_eq!(v, vec![JsonToken::String("\u{1F600}".into())]);
    }

    #[test]
    fn test_unpaired_surrogate_is_an_error() {
        let (_, e) = tokenize(r#""\ud83d""#);
        assert!(matches!(e, Some(TokenError::Syntax { .. })));
    }

    #[test]
    fn test_unterminated_string_hits_eof() {
        let (_, e) = tokenize(r#""abc"#);
        assert!(matches!(e, Some(TokenError::UnexpectedEof { .. })));
    }

    #[test]
    fn test_location_tracking() {
        let mut tokenizer = JsonTokenizer::new("[\n  1]".bytes().map(Ok::<u8, io::Error>));
        tokenizer.next_token().unwrap();
        tokenizer.peek_past_whitespace().unwrap();
        let location = tokenizer.location();
        assert_eq!(location.line, 1);
        assert_eq!(location.col, 2);
        assert_eq!(location.byte_offset, 4);
    }

    #[test]
    fn test_io_error_surfaces() {
        let bytes = [Ok(b'['), Err(io::Error::new(io::ErrorKind::Other, "boom"))];
        let mut tokenizer = JsonTokenizer::new(bytes.into_iter());
        assert_eq!(tokenizer.next_token().unwrap(), JsonToken::ArrayOpen);
        assert!(matches!(
            tokenizer.next_token(),
            Err(TokenError::Io { .. })
        ));
    }

    #[test]
    fn test_expect_eof() {
        let mut tokenizer = JsonTokenizer::new("[]  x".bytes().map(Ok::<u8, io::Error>));
        tokenizer.next_token().unwrap();
        tokenizer.next_token().unwrap();
        assert!(matches!(
            tokenizer.expect_eof(),
            Err(TokenError::Syntax { .. })
        ));
    }
}
