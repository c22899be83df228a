//! Parsing objects from tokens.

use crate::error::{Error, Result};
use crate::lexer::{Lexer, Token};
use crate::object::dict::keys::LENGTH;
use crate::object::{Dict, Object, ObjectId, Stream, string};
use log::warn;

/// The maximum nesting depth of arrays and dictionaries.
const MAX_NESTING_DEPTH: usize = 256;

/// Resolves the value of an indirect `/Length` entry of a stream dictionary.
pub trait LengthResolver {
    /// Return the integer stored in the given object, if it can be determined.
    fn resolve_length(&self, id: ObjectId) -> Option<i64>;
}

/// A resolver that doesn't know about any objects. Indirect lengths will then always
/// fall back to scanning for the `endstream` keyword.
impl LengthResolver for () {
    fn resolve_length(&self, _: ObjectId) -> Option<i64> {
        None
    }
}

/// A parser for PDF objects.
#[derive(Clone, Debug)]
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    depth: usize,
}

impl<'a> Parser<'a> {
    /// Create a new parser at the start of the data.
    pub fn new(data: &'a [u8]) -> Self {
        Self::new_at(data, 0)
    }

    /// Create a new parser starting at the given offset.
    pub fn new_at(data: &'a [u8], offset: usize) -> Self {
        Self {
            lexer: Lexer::new_at(data, offset),
            depth: 0,
        }
    }

    /// The current byte offset.
    pub fn offset(&self) -> usize {
        self.lexer.offset()
    }

    /// Give access to the underlying lexer.
    pub fn lexer(&mut self) -> &mut Lexer<'a> {
        &mut self.lexer
    }

    /// Parse a single direct object.
    ///
    /// `a b R` is recognized as a reference. Streams can't be direct objects, so a
    /// dictionary followed by `stream` is returned as the plain dictionary.
    pub fn parse_object(&mut self) -> Result<Object> {
        let offset = self.lexer.token_offset();

        let Some(token) = self.lexer.next_token()? else {
            return Err(Error::malformed(offset, "unexpected end of data"));
        };

        self.object_from_token(token, offset)
    }

    /// Parse an indirect object `<num> <gen> obj ... endobj`.
    ///
    /// If the object is a stream with an indirect `/Length`, the length is looked up
    /// through `lengths`.
    pub fn parse_indirect_object(
        &mut self,
        lengths: &dyn LengthResolver,
    ) -> Result<(ObjectId, Object)> {
        let number = match self.next_or_unexpected("object number")? {
            (Token::Integer(n), _) if (0..=u32::MAX as i64).contains(&n) => n as u32,
            (other, offset) => {
                return Err(Error::unexpected(offset, "object number", other.to_string()));
            }
        };
        let generation = match self.next_or_unexpected("generation number")? {
            (Token::Integer(g), _) if (0..=u16::MAX as i64).contains(&g) => g as u16,
            (other, offset) => {
                return Err(Error::unexpected(offset, "generation number", other.to_string()));
            }
        };
        self.expect_keyword(b"obj", "`obj`")?;

        let id = ObjectId::new(number, generation);
        let mut object = self.parse_object()?;

        if let Object::Dict(dict) = &object {
            if let Some(Token::Keyword(b"stream")) = self.lexer.peek_token()? {
                self.lexer.next_token()?;
                object = Object::Stream(self.parse_stream_body(id, dict.clone(), lengths)?);
            }
        }

        self.expect_keyword(b"endobj", "`endobj`")?;

        Ok((id, object))
    }

    fn parse_stream_body(
        &mut self,
        id: ObjectId,
        dict: Dict,
        lengths: &dyn LengthResolver,
    ) -> Result<Stream> {
        self.lexer.begin_stream_body();
        let start = self.lexer.offset();

        let declared = match dict.get(LENGTH) {
            Some(Object::Reference(r)) => lengths.resolve_length(*r),
            Some(other) => other.as_i64(),
            None => None,
        };

        let exact = declared
            .and_then(|len| usize::try_from(len).ok())
            .and_then(|len| {
                let mut probe = self.lexer.clone();
                let data = probe.read_raw(len)?;

                match probe.next_token() {
                    Ok(Some(Token::Keyword(b"endstream"))) => Some((data, probe)),
                    _ => None,
                }
            });

        let data = match exact {
            Some((data, probe)) => {
                self.lexer = probe;
                data
            }
            None => {
                match declared {
                    Some(len) => warn!("stream {id} has wrong length {len}, scanning for endstream"),
                    None => warn!("stream {id} has no usable length, scanning for endstream"),
                }

                self.lexer
                    .read_until_endstream()
                    .ok_or_else(|| Error::malformed(start, "stream without `endstream`"))?
            }
        };

        Ok(Stream::new(dict, data))
    }

    fn object_from_token(&mut self, token: Token<'a>, offset: usize) -> Result<Object> {
        Ok(match token {
            Token::Integer(i) => match self.try_reference(i)? {
                Some(id) => Object::Reference(id),
                None => Object::from(i),
            },
            Token::Real(r) => Object::from(r),
            Token::Name(n) => Object::Name(n),
            Token::LiteralString(s) => Object::String(string::String::new(s)),
            Token::HexString(s) => Object::String(string::String::new_hex(s)),
            Token::ArrayStart => self.with_depth(offset, |p| p.parse_array(offset))?,
            Token::DictStart => Object::Dict(self.with_depth(offset, |p| p.parse_dict(offset))?),
            Token::Keyword(b"true") => Object::Boolean(true),
            Token::Keyword(b"false") => Object::Boolean(false),
            Token::Keyword(b"null") => Object::Null,
            other @ (Token::Keyword(_) | Token::ArrayEnd | Token::DictEnd) => {
                return Err(Error::unexpected(offset, "object", other.to_string()));
            }
        })
    }

    /// Check whether the integer that was just read starts an `a b R` reference, and
    /// consume the rest of it if so.
    fn try_reference(&mut self, number: i64) -> Result<Option<ObjectId>> {
        let Ok(number) = u32::try_from(number) else {
            return Ok(None);
        };

        let mut probe = self.lexer.clone();

        let generation = match probe.next_token() {
            Ok(Some(Token::Integer(g))) => g,
            _ => return Ok(None),
        };

        let Ok(generation) = u16::try_from(generation) else {
            return Ok(None);
        };

        match probe.next_token() {
            Ok(Some(Token::Keyword(b"R"))) => {
                self.lexer = probe;

                Ok(Some(ObjectId::new(number, generation)))
            }
            _ => Ok(None),
        }
    }

    fn with_depth<T>(&mut self, offset: usize, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(Error::malformed(offset, "objects are nested too deeply"));
        }

        self.depth += 1;
        let res = f(self);
        self.depth -= 1;

        res
    }

    fn parse_array(&mut self, start: usize) -> Result<Object> {
        let mut items = vec![];

        loop {
            let offset = self.lexer.token_offset();

            match self.lexer.next_token()? {
                None => return Err(Error::malformed(start, "unterminated array")),
                Some(Token::ArrayEnd) => break,
                Some(Token::DictEnd) => {
                    return Err(Error::unexpected(offset, "array element or `]`", "`>>`"));
                }
                Some(token) => items.push(self.object_from_token(token, offset)?),
            }
        }

        Ok(Object::Array(items))
    }

    fn parse_dict(&mut self, start: usize) -> Result<Dict> {
        let mut dict = Dict::new();

        loop {
            let offset = self.lexer.token_offset();

            match self.lexer.next_token()? {
                None => return Err(Error::malformed(start, "unterminated dictionary")),
                Some(Token::DictEnd) => break,
                Some(Token::Name(key)) => {
                    let value_offset = self.lexer.token_offset();

                    let value = match self.lexer.next_token()? {
                        None => return Err(Error::malformed(start, "unterminated dictionary")),
                        Some(Token::DictEnd) => {
                            return Err(Error::unexpected(value_offset, "dictionary value", "`>>`"));
                        }
                        Some(token) => self.object_from_token(token, value_offset)?,
                    };

                    // Duplicate keys: the last one wins.
                    dict.insert(key, value);
                }
                Some(other) => {
                    return Err(Error::unexpected(offset, "name", other.to_string()));
                }
            }
        }

        Ok(dict)
    }

    fn next_or_unexpected(&mut self, expected: &'static str) -> Result<(Token<'a>, usize)> {
        let offset = self.lexer.token_offset();

        match self.lexer.next_token()? {
            Some(token) => Ok((token, offset)),
            None => Err(Error::unexpected(offset, expected, "end of data")),
        }
    }

    fn expect_keyword(&mut self, keyword: &[u8], expected: &'static str) -> Result<()> {
        match self.next_or_unexpected(expected)? {
            (Token::Keyword(k), _) if k == keyword => Ok(()),
            (other, offset) => Err(Error::unexpected(offset, expected, other.to_string())),
        }
    }
}

/// Parse the header of an object stream: `n` pairs of object numbers and offsets, the
/// offsets being relative to `first`.
///
/// Returns the object numbers together with their absolute offsets in the decoded data.
pub fn parse_object_stream_header(data: &[u8], n: usize, first: usize) -> Result<Vec<(u32, usize)>> {
    let mut lexer = Lexer::new(data);
    let mut entries = Vec::with_capacity(n.min(data.len() / 2));

    for _ in 0..n {
        let offset = lexer.token_offset();

        let (Some(Token::Integer(number)), Some(Token::Integer(relative))) =
            (lexer.next_token()?, lexer.next_token()?)
        else {
            return Err(Error::malformed(offset, "invalid object stream header"));
        };

        let (Ok(number), Ok(relative)) = (u32::try_from(number), usize::try_from(relative)) else {
            return Err(Error::malformed(offset, "invalid object stream header"));
        };

        entries.push((number, first.saturating_add(relative)));
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::object::dict::keys::{LENGTH, TYPE};
    use crate::object::{Name, Object, ObjectId};
    use crate::parser::{LengthResolver, Parser, parse_object_stream_header};

    fn parse(data: &[u8]) -> Object {
        Parser::new(data).parse_object().unwrap()
    }

    struct FixedLength(i64);

    impl LengthResolver for FixedLength {
        fn resolve_length(&self, id: ObjectId) -> Option<i64> {
            (id == ObjectId::new(9, 0)).then_some(self.0)
        }
    }

    #[test]
    fn reference() {
        assert_eq!(parse(b"12 0 R"), Object::Reference(ObjectId::new(12, 0)));
    }

    #[test]
    fn integers_in_array() {
        assert_eq!(
            parse(b"[1 2 3 0 R 4]"),
            Object::Array(vec![
                Object::from(1_i64),
                Object::from(2_i64),
                Object::Reference(ObjectId::new(3, 0)),
                Object::from(4_i64),
            ])
        );
    }

    #[test]
    fn negative_not_a_reference() {
        // `-1 0` can't start a reference, which leaves the `R` dangling.
        assert!(matches!(
            Parser::new(b"[-1 0 R]").parse_object(),
            Err(Error::UnexpectedToken { offset: 6, .. })
        ));
    }

    #[test]
    fn nested_dict() {
        let obj = parse(b"<< /Type /Page /Res << /Font << /F1 5 0 R >> >> /Arr [true null] >>");
        let dict = obj.as_dict().unwrap();

        assert!(dict.has_type(b"Page"));
        assert_eq!(
            dict.get_dict(b"Res")
                .and_then(|r| r.get_dict(b"Font"))
                .and_then(|f| f.get_ref(b"F1")),
            Some(ObjectId::new(5, 0))
        );
        assert_eq!(
            dict.get_array(b"Arr"),
            Some(&[Object::Boolean(true), Object::Null][..])
        );
    }

    #[test]
    fn duplicate_keys_last_wins() {
        let obj = parse(b"<< /A 1 /A 2 >>");

        assert_eq!(obj.as_dict().unwrap().get_i64(b"A"), Some(2));
    }

    #[test]
    fn key_must_be_name() {
        assert!(matches!(
            Parser::new(b"<< 1 2 >>").parse_object(),
            Err(Error::UnexpectedToken { offset: 3, .. })
        ));
    }

    #[test]
    fn dict_end_in_array() {
        assert!(matches!(
            Parser::new(b"[1 >>").parse_object(),
            Err(Error::UnexpectedToken { offset: 3, .. })
        ));
    }

    #[test]
    fn unterminated_array() {
        assert!(matches!(
            Parser::new(b"[1 2").parse_object(),
            Err(Error::MalformedSyntax { offset: 0, .. })
        ));
    }

    #[test]
    fn too_deep() {
        let data = "[".repeat(1000);

        assert!(Parser::new(data.as_bytes()).parse_object().is_err());
    }

    #[test]
    fn indirect_dict() {
        let (id, obj) = Parser::new(b"4 0 obj\n<< /Type /Catalog >>\nendobj")
            .parse_indirect_object(&())
            .unwrap();

        assert_eq!(id, ObjectId::new(4, 0));
        assert!(obj.as_dict().unwrap().has_type(b"Catalog"));
    }

    #[test]
    fn missing_endobj() {
        assert!(matches!(
            Parser::new(b"4 0 obj 5 endobk").parse_indirect_object(&()),
            Err(Error::UnexpectedToken { offset: 10, .. })
        ));
    }

    #[test]
    fn missing_obj() {
        assert!(matches!(
            Parser::new(b"4 0 5").parse_indirect_object(&()),
            Err(Error::UnexpectedToken { offset: 4, .. })
        ));
    }

    #[test]
    fn stream_direct_length() {
        let (_, obj) = Parser::new(b"5 0 obj << /Length 5 >> stream\nhello\nendstream endobj")
            .parse_indirect_object(&())
            .unwrap();

        assert_eq!(obj.as_stream().unwrap().raw_data(), b"hello");
    }

    #[test]
    fn stream_indirect_length() {
        // The payload contains the keyword itself, so only the length can tell where it ends.
        let data = b"5 0 obj << /Length 9 0 R >> stream\nendstream\nendstream endobj";
        let (_, obj) = Parser::new(data)
            .parse_indirect_object(&FixedLength(9))
            .unwrap();

        assert_eq!(obj.as_stream().unwrap().raw_data(), b"endstream");
    }

    #[test]
    fn stream_wrong_length() {
        let data = b"5 0 obj << /Length 2 >> stream\r\nhello\r\nendstream endobj";
        let (_, obj) = Parser::new(data).parse_indirect_object(&()).unwrap();
        let stream = obj.as_stream().unwrap();

        assert_eq!(stream.raw_data(), b"hello");
        assert_eq!(stream.dict().get_i64(LENGTH), Some(2));
    }

    #[test]
    fn stream_unresolvable_length() {
        let data = b"5 0 obj << /Length 7 0 R /Type /X >> stream\nabc\nendstream\nendobj";
        let (_, obj) = Parser::new(data).parse_indirect_object(&()).unwrap();
        let stream = obj.as_stream().unwrap();

        assert_eq!(stream.raw_data(), b"abc");
        assert_eq!(stream.dict().get_name(TYPE), Some(&Name::new(b"X")));
    }

    #[test]
    fn object_stream_header() {
        assert_eq!(
            parse_object_stream_header(b"10 0 11 14 12 30 ", 3, 18).unwrap(),
            vec![(10, 18), (11, 32), (12, 48)]
        );
        assert!(parse_object_stream_header(b"10 0 11", 2, 18).is_err());
    }
}
