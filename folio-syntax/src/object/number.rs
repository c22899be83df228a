//! Number objects.

use log::debug;
use std::fmt::{Display, Formatter};

/// A PDF number, either an integer or a real.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Number {
    /// An integer number.
    Integer(i64),
    /// A real number.
    Real(f64),
}

impl Number {
    /// Returns the number as a f64.
    pub fn as_f64(&self) -> f64 {
        match *self {
            Self::Integer(i) => i as f64,
            Self::Real(r) => r,
        }
    }

    /// Returns the number as an integer, if it doesn't have a fractional part.
    pub fn as_integer(&self) -> Option<i64> {
        match *self {
            Self::Integer(i) => Some(i),
            Self::Real(r) => {
                if r.fract() == 0.0 && r.is_finite() {
                    debug!("real {} was used as an integer", r);

                    Some(r as i64)
                } else {
                    None
                }
            }
        }
    }

    /// Parse a number from its textual representation.
    ///
    /// Integers that overflow an `i64` are read as reals.
    pub(crate) fn from_bytes(data: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(data).ok()?;

        if !text.contains('.') {
            if let Ok(i) = text.parse::<i64>() {
                return Some(Self::Integer(i));
            }
        }

        // "4." is valid PDF syntax.
        let normalized = text.strip_suffix('.').unwrap_or(text);
        let num = normalized.parse::<f64>().ok()?;

        num.is_finite().then_some(Self::Real(num))
    }
}

impl Display for Number {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{i}"),
            Self::Real(r) => write!(f, "{r}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::object::Number;

    fn num(s: &str) -> Option<Number> {
        Number::from_bytes(s.as_bytes())
    }

    #[test]
    fn int_1() {
        assert_eq!(num("0"), Some(Number::Integer(0)));
    }

    #[test]
    fn int_2() {
        assert_eq!(num("+32"), Some(Number::Integer(32)));
    }

    #[test]
    fn int_3() {
        assert_eq!(num("-32"), Some(Number::Integer(-32)));
    }

    #[test]
    fn int_overflow() {
        assert_eq!(
            num("99999999999999999999"),
            Some(Number::Real(99999999999999999999.0))
        );
    }

    #[test]
    fn real_1() {
        assert_eq!(num("3.5"), Some(Number::Real(3.5)));
    }

    #[test]
    fn real_2() {
        assert_eq!(num("-.002"), Some(Number::Real(-0.002)));
    }

    #[test]
    fn real_3() {
        assert_eq!(num("4."), Some(Number::Real(4.0)));
    }

    #[test]
    fn invalid() {
        assert_eq!(num("-"), None);
        assert_eq!(num("1.2.3"), None);
    }

    #[test]
    fn integer_view() {
        assert_eq!(Number::Real(12.0).as_integer(), Some(12));
        assert_eq!(Number::Real(12.5).as_integer(), None);
    }
}
