//! Splitting PDF bytes into tokens.

use crate::error::{Error, Result};
use crate::object::{Name, Number};
use crate::object::string::{decode_hex, decode_literal};
use crate::reader::Reader;
use crate::trivia::is_regular_character;
use std::fmt::{Display, Formatter};

/// A single token of the PDF syntax.
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'a> {
    /// An integer number.
    Integer(i64),
    /// A real number.
    Real(f64),
    /// A name, with escapes already decoded.
    Name(Name),
    /// A literal string `(...)`, with escapes already decoded.
    LiteralString(Vec<u8>),
    /// A hexadecimal string `<...>`, already decoded.
    HexString(Vec<u8>),
    /// `<<`
    DictStart,
    /// `>>`
    DictEnd,
    /// `[`
    ArrayStart,
    /// `]`
    ArrayEnd,
    /// A run of regular characters that isn't a number, like `obj`, `R` or `true`.
    Keyword(&'a [u8]),
}

impl Display for Token<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "integer {i}"),
            Self::Real(r) => write!(f, "real {r}"),
            Self::Name(n) => write!(f, "name {n:?}"),
            Self::LiteralString(_) | Self::HexString(_) => write!(f, "string"),
            Self::DictStart => write!(f, "`<<`"),
            Self::DictEnd => write!(f, "`>>`"),
            Self::ArrayStart => write!(f, "`[`"),
            Self::ArrayEnd => write!(f, "`]`"),
            Self::Keyword(k) => write!(f, "keyword `{}`", String::from_utf8_lossy(k)),
        }
    }
}

/// A lexer over the bytes of a PDF file.
///
/// Stream bodies are not tokenized. After the `stream` keyword, the caller is expected to
/// call [`Lexer::begin_stream_body`] and read the payload with [`Lexer::read_raw`] or
/// [`Lexer::read_until_endstream`].
#[derive(Clone, Debug)]
pub struct Lexer<'a> {
    reader: Reader<'a>,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer at the start of the data.
    pub fn new(data: &'a [u8]) -> Self {
        Self::new_at(data, 0)
    }

    /// Create a new lexer starting at the given offset.
    pub fn new_at(data: &'a [u8], offset: usize) -> Self {
        Self {
            reader: Reader::new_at(data, offset),
        }
    }

    /// The current byte offset.
    pub fn offset(&self) -> usize {
        self.reader.offset()
    }

    /// Move the lexer to a different offset.
    pub fn jump(&mut self, offset: usize) {
        self.reader.jump(offset);
    }

    /// The underlying data.
    pub fn data(&self) -> &'a [u8] {
        self.reader.data()
    }

    /// Skip white space and comments, and return the offset of the next token.
    pub fn token_offset(&mut self) -> usize {
        self.reader.skip_white_spaces_and_comments();
        self.reader.offset()
    }

    /// Return the next token without consuming it.
    pub fn peek_token(&mut self) -> Result<Option<Token<'a>>> {
        let offset = self.offset();
        let token = self.next_token();
        self.jump(offset);

        token
    }

    /// Read the next token, or `None` at the end of the input.
    pub fn next_token(&mut self) -> Result<Option<Token<'a>>> {
        let start = self.token_offset();

        let Some(b) = self.reader.peek_byte() else {
            return Ok(None);
        };

        let token = match b {
            b'/' => {
                self.reader.forward();
                let raw = self.read_regular_run();

                Token::Name(
                    Name::from_escaped(raw)
                        .ok_or_else(|| Error::malformed(start, "invalid escape in name"))?,
                )
            }
            b'(' => Token::LiteralString(self.read_literal_string(start)?),
            b'<' => {
                if self.reader.forward_tag(b"<<").is_some() {
                    Token::DictStart
                } else {
                    Token::HexString(self.read_hex_string(start)?)
                }
            }
            b'>' => {
                if self.reader.forward_tag(b">>").is_some() {
                    Token::DictEnd
                } else {
                    return Err(Error::malformed(start, "stray `>`"));
                }
            }
            b'[' => {
                self.reader.forward();
                Token::ArrayStart
            }
            b']' => {
                self.reader.forward();
                Token::ArrayEnd
            }
            b')' | b'{' | b'}' => {
                return Err(Error::malformed(
                    start,
                    format!("stray delimiter `{}`", b as char),
                ));
            }
            b'0'..=b'9' | b'+' | b'-' | b'.' => {
                let raw = self.read_regular_run();

                match Number::from_bytes(raw) {
                    Some(Number::Integer(i)) => Token::Integer(i),
                    Some(Number::Real(r)) => Token::Real(r),
                    None => {
                        return Err(Error::malformed(
                            start,
                            format!("invalid number `{}`", String::from_utf8_lossy(raw)),
                        ));
                    }
                }
            }
            _ => Token::Keyword(self.read_regular_run()),
        };

        Ok(Some(token))
    }

    /// Consume the end-of-line marker that follows the `stream` keyword.
    pub fn begin_stream_body(&mut self) {
        // Some producers put spaces between the keyword and the EOL.
        self.reader.forward_while(|b| b == b' ');
        let _ = self.reader.read_eol();
    }

    /// Read `len` raw bytes, if that many are left.
    pub fn read_raw(&mut self, len: usize) -> Option<&'a [u8]> {
        self.reader.read_bytes(len)
    }

    /// Read raw bytes up to the next `endstream` keyword and consume the keyword.
    ///
    /// A single end-of-line marker in front of the keyword is not part of the data.
    pub fn read_until_endstream(&mut self) -> Option<&'a [u8]> {
        let tail = self.reader.tail();
        let pos = memchr::memmem::find(tail, b"endstream")?;

        let mut data = &tail[..pos];
        data = data
            .strip_suffix(b"\r\n")
            .or_else(|| data.strip_suffix(b"\n"))
            .or_else(|| data.strip_suffix(b"\r"))
            .unwrap_or(data);

        self.reader.jump(self.reader.offset() + pos + b"endstream".len());

        Some(data)
    }

    fn read_regular_run(&mut self) -> &'a [u8] {
        let start = self.reader.offset();
        self.reader.forward_while(is_regular_character);

        &self.reader.data()[start..self.reader.offset()]
    }

    fn read_literal_string(&mut self, start: usize) -> Result<Vec<u8>> {
        self.reader.forward();
        let content_start = self.reader.offset();
        let mut depth = 1_u32;

        loop {
            let Some(b) = self.reader.read_byte() else {
                return Err(Error::malformed(start, "unterminated literal string"));
            };

            match b {
                b'\\' => {
                    // The escaped byte can never close or open a parenthesis.
                    self.reader.read_byte();
                }
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;

                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
        }

        let content = &self.reader.data()[content_start..self.reader.offset() - 1];

        Ok(decode_literal(content))
    }

    fn read_hex_string(&mut self, start: usize) -> Result<Vec<u8>> {
        self.reader.forward();
        let tail = self.reader.tail();

        let Some(end) = memchr::memchr(b'>', tail) else {
            return Err(Error::malformed(start, "unterminated hex string"));
        };

        let decoded = decode_hex(&tail[..end])
            .map_err(|pos| Error::malformed(start + 1 + pos, "invalid hex digit in string"))?;
        self.reader.jump(self.reader.offset() + end + 1);

        Ok(decoded)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::lexer::{Lexer, Token};
    use crate::object::Name;

    fn tokens(data: &[u8]) -> Vec<Token<'_>> {
        let mut lexer = Lexer::new(data);
        let mut out = vec![];

        while let Some(t) = lexer.next_token().unwrap() {
            out.push(t);
        }

        out
    }

    #[test]
    fn dict_with_comment() {
        assert_eq!(
            tokens(b"<< /Type /Page % a comment\n /Count 3 >>"),
            vec![
                Token::DictStart,
                Token::Name(Name::new(b"Type")),
                Token::Name(Name::new(b"Page")),
                Token::Name(Name::new(b"Count")),
                Token::Integer(3),
                Token::DictEnd,
            ]
        );
    }

    #[test]
    fn reference_and_keywords() {
        assert_eq!(
            tokens(b"[12 0 R true null]"),
            vec![
                Token::ArrayStart,
                Token::Integer(12),
                Token::Integer(0),
                Token::Keyword(b"R"),
                Token::Keyword(b"true"),
                Token::Keyword(b"null"),
                Token::ArrayEnd,
            ]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(
            tokens(b"-3 +.5 4. 1.25"),
            vec![
                Token::Integer(-3),
                Token::Real(0.5),
                Token::Real(4.0),
                Token::Real(1.25),
            ]
        );
    }

    #[test]
    fn nested_literal_string() {
        assert_eq!(
            tokens(br"(a (b) \) c)"),
            vec![Token::LiteralString(b"a (b) ) c".to_vec())]
        );
    }

    #[test]
    fn hex_string_next_to_dict() {
        assert_eq!(
            tokens(b"<</ID <4142 43>>>"),
            vec![
                Token::DictStart,
                Token::Name(Name::new(b"ID")),
                Token::HexString(b"ABC".to_vec()),
                Token::DictEnd,
            ]
        );
    }

    #[test]
    fn names_end_at_delimiters() {
        assert_eq!(
            tokens(b"/A/B(x)"),
            vec![
                Token::Name(Name::new(b"A")),
                Token::Name(Name::new(b"B")),
                Token::LiteralString(b"x".to_vec()),
            ]
        );
    }

    #[test]
    fn unterminated_string() {
        let mut lexer = Lexer::new(b"  (abc");

        assert!(matches!(
            lexer.next_token(),
            Err(Error::MalformedSyntax { offset: 2, .. })
        ));
    }

    #[test]
    fn invalid_hex_digit() {
        let mut lexer = Lexer::new(b"<4G>");

        assert!(matches!(
            lexer.next_token(),
            Err(Error::MalformedSyntax { offset: 2, .. })
        ));
    }

    #[test]
    fn invalid_name_escape() {
        assert!(Lexer::new(b"/A#ZZ").next_token().is_err());
    }

    #[test]
    fn stray_delimiter() {
        assert!(Lexer::new(b")").next_token().is_err());
        assert!(Lexer::new(b"> ").next_token().is_err());
    }

    #[test]
    fn peek_does_not_consume() {
        let mut lexer = Lexer::new(b"obj 5");

        assert_eq!(lexer.peek_token().unwrap(), Some(Token::Keyword(b"obj")));
        assert_eq!(lexer.next_token().unwrap(), Some(Token::Keyword(b"obj")));
        assert_eq!(lexer.next_token().unwrap(), Some(Token::Integer(5)));
        assert_eq!(lexer.next_token().unwrap(), None);
    }

    #[test]
    fn stream_body() {
        let data = b"stream\r\nabc\nendstream endobj";
        let mut lexer = Lexer::new(data);

        assert_eq!(lexer.next_token().unwrap(), Some(Token::Keyword(b"stream")));
        lexer.begin_stream_body();
        assert_eq!(lexer.read_until_endstream(), Some(&b"abc"[..]));
        assert_eq!(lexer.next_token().unwrap(), Some(Token::Keyword(b"endobj")));
    }
}
