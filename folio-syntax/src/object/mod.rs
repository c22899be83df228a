//! PDF objects.

pub mod dict;
pub mod name;
pub mod number;
pub mod rect;
pub mod stream;
pub mod string;

pub use dict::Dict;
pub use name::Name;
pub use number::Number;
pub use rect::Rect;
pub use stream::Stream;

use std::fmt::{Display, Formatter};

/// The identifier of an indirect object, consisting of an object number and a
/// generation number.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ObjectId {
    /// The object number.
    pub number: u32,
    /// The generation number.
    pub generation: u16,
}

impl ObjectId {
    /// Create a new object identifier.
    pub const fn new(number: u32, generation: u16) -> Self {
        Self { number, generation }
    }
}

impl Display for ObjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.number, self.generation)
    }
}

/// A PDF object.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// The null object.
    Null,
    /// A boolean.
    Boolean(bool),
    /// An integer or real number.
    Number(Number),
    /// A string.
    String(string::String),
    /// A name.
    Name(Name),
    /// An array of objects.
    Array(Vec<Object>),
    /// A dictionary.
    Dict(Dict),
    /// A stream. Can only appear as an indirect object.
    Stream(Stream),
    /// A reference to an indirect object.
    ///
    /// The referent is never stored inline, it must be resolved through the document
    /// the object belongs to.
    Reference(ObjectId),
}

impl Object {
    /// Whether the object is `null`.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the value of a boolean.
    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the value of a number, integer or real.
    #[inline]
    pub fn as_number(&self) -> Option<Number> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the value as an integer. Reals are only accepted if they have no
    /// fractional part.
    #[inline]
    pub fn as_i64(&self) -> Option<i64> {
        self.as_number().and_then(|n| n.as_integer())
    }

    /// Returns the value of any number as a float.
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        self.as_number().map(|n| n.as_f64())
    }

    /// Returns the object as a name.
    #[inline]
    pub fn as_name(&self) -> Option<&Name> {
        match self {
            Self::Name(n) => Some(n),
            _ => None,
        }
    }

    /// Returns the object as a string.
    #[inline]
    pub fn as_string(&self) -> Option<&string::String> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the items of an array.
    #[inline]
    pub fn as_array(&self) -> Option<&[Object]> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Returns the dictionary of the object. For streams, this is the stream dictionary.
    #[inline]
    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Self::Dict(d) => Some(d),
            Self::Stream(s) => Some(s.dict()),
            _ => None,
        }
    }

    /// Returns the object as a stream.
    #[inline]
    pub fn as_stream(&self) -> Option<&Stream> {
        match self {
            Self::Stream(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the target of a reference, without resolving it.
    #[inline]
    pub fn as_reference(&self) -> Option<ObjectId> {
        match self {
            Self::Reference(r) => Some(*r),
            _ => None,
        }
    }

    /// A short name of the object kind, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Name(_) => "name",
            Self::Array(_) => "array",
            Self::Dict(_) => "dictionary",
            Self::Stream(_) => "stream",
            Self::Reference(_) => "reference",
        }
    }

    /// Call `f` for every reference contained in the object, including references
    /// nested in arrays, dictionaries and stream dictionaries.
    pub fn for_each_reference(&self, f: &mut impl FnMut(ObjectId)) {
        match self {
            Self::Reference(r) => f(*r),
            Self::Array(items) => items.iter().for_each(|i| i.for_each_reference(f)),
            Self::Dict(dict) => dict.values().for_each(|v| v.for_each_reference(f)),
            Self::Stream(stream) => stream
                .dict()
                .values()
                .for_each(|v| v.for_each_reference(f)),
            _ => {}
        }
    }
}

impl From<bool> for Object {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for Object {
    fn from(value: i64) -> Self {
        Self::Number(Number::Integer(value))
    }
}

impl From<f64> for Object {
    fn from(value: f64) -> Self {
        Self::Number(Number::Real(value))
    }
}

impl From<Name> for Object {
    fn from(value: Name) -> Self {
        Self::Name(value)
    }
}

impl From<Dict> for Object {
    fn from(value: Dict) -> Self {
        Self::Dict(value)
    }
}

impl From<Vec<Object>> for Object {
    fn from(value: Vec<Object>) -> Self {
        Self::Array(value)
    }
}

impl From<ObjectId> for Object {
    fn from(value: ObjectId) -> Self {
        Self::Reference(value)
    }
}

#[cfg(test)]
mod tests {
    use crate::object::{Dict, Name, Object, ObjectId};

    #[test]
    fn nested_references() {
        let mut inner = Dict::new();
        inner.insert(Name::new(b"Font"), Object::Reference(ObjectId::new(9, 0)));

        let obj = Object::Array(vec![
            Object::Reference(ObjectId::new(4, 0)),
            Object::Dict(inner),
            Object::from(3_i64),
        ]);

        let mut found = vec![];
        obj.for_each_reference(&mut |r| found.push(r));

        assert_eq!(found, vec![ObjectId::new(4, 0), ObjectId::new(9, 0)]);
    }

    #[test]
    fn accessors() {
        assert_eq!(Object::from(4.0).as_i64(), Some(4));
        assert_eq!(Object::from(4.5).as_i64(), None);
        assert!(Object::Null.as_dict().is_none());
        assert_eq!(Object::from(ObjectId::new(1, 2)).kind(), "reference");
    }
}
