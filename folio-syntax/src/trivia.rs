//! Character classes of the PDF syntax.

#[inline(always)]
pub(crate) fn is_white_space_character(char: u8) -> bool {
    matches!(char, 0x00 | 0x09 | 0x0a | 0x0c | 0x0d | 0x20)
}

#[inline(always)]
pub(crate) fn is_delimiter_character(char: u8) -> bool {
    matches!(
        char,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

#[inline(always)]
pub(crate) fn is_regular_character(char: u8) -> bool {
    !is_white_space_character(char) && !is_delimiter_character(char)
}

#[inline(always)]
pub(crate) fn is_eol_character(char: u8) -> bool {
    matches!(char, 0x0a | 0x0d)
}

#[inline(always)]
pub(crate) fn is_octal_digit(char: u8) -> bool {
    matches!(char, b'0'..=b'7')
}

#[inline(always)]
pub(crate) fn hex_value(char: u8) -> Option<u8> {
    match char {
        b'0'..=b'9' => Some(char - b'0'),
        b'A'..=b'F' => Some(char - b'A' + 10),
        b'a'..=b'f' => Some(char - b'a' + 10),
        _ => None,
    }
}
