//! Names.

use crate::trivia::hex_value;
use std::borrow::Borrow;
use std::fmt::{Debug, Formatter};
use std::ops::Deref;

/// A PDF name, stored without the leading solidus and with `#xx` escapes decoded.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(Vec<u8>);

impl Name {
    /// Create a new name from already unescaped bytes.
    pub fn new(data: &[u8]) -> Self {
        Self(data.to_vec())
    }

    /// Create a name from its raw representation in a file, decoding `#xx` escapes.
    ///
    /// Returns `None` if an escape sequence is not followed by two hex digits.
    pub fn from_escaped(data: &[u8]) -> Option<Self> {
        if !data.contains(&b'#') {
            return Some(Self::new(data));
        }

        let mut cleaned = Vec::with_capacity(data.len());
        let mut iter = data.iter().copied();

        while let Some(b) = iter.next() {
            if b == b'#' {
                let hi = hex_value(iter.next()?)?;
                let lo = hex_value(iter.next()?)?;
                cleaned.push((hi << 4) | lo);
            } else {
                cleaned.push(b);
            }
        }

        Some(Self(cleaned))
    }

    /// Return a string representation of the name.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("{non-ascii name}")
    }
}

impl Deref for Name {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Borrow<[u8]> for Name {
    fn borrow(&self) -> &[u8] {
        &self.0
    }
}

impl Debug for Name {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}", self.as_str())
    }
}

impl PartialEq<[u8]> for Name {
    fn eq(&self, other: &[u8]) -> bool {
        self.0 == other
    }
}

impl PartialEq<&[u8]> for Name {
    fn eq(&self, other: &&[u8]) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use crate::object::Name;

    fn escaped(s: &str) -> Option<Vec<u8>> {
        Name::from_escaped(s.as_bytes()).map(|n| n.to_vec())
    }

    #[test]
    fn name_1() {
        assert_eq!(escaped("Name1").unwrap(), b"Name1");
    }

    #[test]
    fn name_2() {
        assert_eq!(escaped("lime#20Green").unwrap(), b"lime Green");
    }

    #[test]
    fn name_3() {
        assert_eq!(
            escaped("paired#28#29parentheses").unwrap(),
            b"paired()parentheses"
        );
    }

    #[test]
    fn name_4() {
        assert_eq!(escaped("The_Key_of_F#23_Minor").unwrap(), b"The_Key_of_F#_Minor");
    }

    #[test]
    fn name_5() {
        assert_eq!(escaped("A#3b").unwrap(), b"A;");
        assert_eq!(escaped("A#3B").unwrap(), b"A;");
    }

    #[test]
    fn invalid_escape() {
        assert!(escaped("AB#FG").is_none());
        assert!(escaped("AB#4").is_none());
    }
}
