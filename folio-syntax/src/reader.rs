//! A cursor over the raw bytes of a PDF file.

use crate::trivia::{is_eol_character, is_white_space_character};

/// A reader for reading bytes from a PDF file.
#[derive(Clone, Debug)]
pub(crate) struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    #[inline]
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    #[inline]
    pub(crate) fn new_at(data: &'a [u8], offset: usize) -> Self {
        Self { data, offset }
    }

    #[inline]
    pub(crate) fn data(&self) -> &'a [u8] {
        self.data
    }

    #[inline]
    pub(crate) fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub(crate) fn jump(&mut self, offset: usize) {
        self.offset = offset;
    }

    /// Returns the remaining data from the current offset to the end.
    #[inline]
    pub(crate) fn tail(&self) -> &'a [u8] {
        self.data.get(self.offset..).unwrap_or_default()
    }

    #[inline]
    pub(crate) fn read_bytes(&mut self, len: usize) -> Option<&'a [u8]> {
        let v = self.peek_bytes(len)?;
        self.offset += len;

        Some(v)
    }

    #[inline]
    pub(crate) fn read_byte(&mut self) -> Option<u8> {
        let v = self.peek_byte()?;
        self.offset += 1;

        Some(v)
    }

    #[inline]
    pub(crate) fn peek_bytes(&self, len: usize) -> Option<&'a [u8]> {
        self.data.get(self.offset..self.offset.checked_add(len)?)
    }

    #[inline]
    pub(crate) fn peek_byte(&self) -> Option<u8> {
        self.data.get(self.offset).copied()
    }

    #[inline]
    pub(crate) fn forward(&mut self) {
        self.offset += 1;
    }

    /// Advances the offset while the given byte satisfies the predicate.
    #[inline]
    pub(crate) fn forward_while(&mut self, f: impl Fn(u8) -> bool) {
        while let Some(b) = self.peek_byte() {
            if f(b) {
                self.forward();
            } else {
                break;
            }
        }
    }

    /// Advances the offset if the next bytes match the specified tag.
    #[inline]
    pub(crate) fn forward_tag(&mut self, tag: &[u8]) -> Option<()> {
        self.peek_tag(tag)?;
        self.offset += tag.len();

        Some(())
    }

    #[inline]
    pub(crate) fn peek_tag(&self, tag: &[u8]) -> Option<()> {
        (self.peek_bytes(tag.len())? == tag).then_some(())
    }

    #[inline]
    pub(crate) fn skip_white_spaces(&mut self) {
        self.forward_while(is_white_space_character);
    }

    #[inline]
    pub(crate) fn skip_white_spaces_and_comments(&mut self) {
        while let Some(b) = self.peek_byte() {
            if is_white_space_character(b) {
                self.skip_white_spaces();
            } else if b == b'%' {
                self.forward_while(|b| !is_eol_character(b));
            } else {
                return;
            }
        }
    }

    /// Consume a single end-of-line marker (`\r\n`, `\n` or `\r`).
    #[inline]
    pub(crate) fn read_eol(&mut self) -> Option<()> {
        self.forward_tag(b"\r\n")
            .or_else(|| self.forward_tag(b"\n"))
            .or_else(|| self.forward_tag(b"\r"))
    }
}
