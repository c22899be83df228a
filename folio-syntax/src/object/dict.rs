//! Dictionaries.

use crate::object::{Name, Object, ObjectId, Rect};
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};

/// A dictionary, which is a key-value map, keys being names, and values being any PDF
/// object or object reference.
///
/// None of the accessors resolve references: a value stored as a reference is returned
/// as `None` by the typed getters, use [`Dict::get`] and resolve it through the document
/// instead.
#[derive(Clone, Default, PartialEq)]
pub struct Dict(BTreeMap<Name, Object>);

impl Dict {
    /// Create a new empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of entries in the dictionary.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Return whether the dictionary is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Insert an entry, replacing an existing entry with the same key.
    pub fn insert(&mut self, key: Name, value: Object) -> Option<Object> {
        self.0.insert(key, value)
    }

    /// Remove an entry.
    pub fn remove(&mut self, key: &[u8]) -> Option<Object> {
        self.0.remove(key)
    }

    /// Checks whether the dictionary contains an entry with a specific key.
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.0.contains_key(key)
    }

    /// Returns the raw entry of a key.
    pub fn get(&self, key: &[u8]) -> Option<&Object> {
        self.0.get(key)
    }

    /// Returns the entry of a key if it is a name.
    pub fn get_name(&self, key: &[u8]) -> Option<&Name> {
        self.get(key)?.as_name()
    }

    /// Returns the entry of a key if it is an integer.
    pub fn get_i64(&self, key: &[u8]) -> Option<i64> {
        self.get(key)?.as_i64()
    }

    /// Returns the entry of a key if it is an array.
    pub fn get_array(&self, key: &[u8]) -> Option<&[Object]> {
        self.get(key)?.as_array()
    }

    /// Returns the entry of a key if it is a direct dictionary.
    pub fn get_dict(&self, key: &[u8]) -> Option<&Dict> {
        match self.get(key)? {
            Object::Dict(d) => Some(d),
            _ => None,
        }
    }

    /// Returns the entry of a key if it is a reference.
    pub fn get_ref(&self, key: &[u8]) -> Option<ObjectId> {
        self.get(key)?.as_reference()
    }

    /// Returns the entry of a key if it is a rectangle.
    pub fn get_rect(&self, key: &[u8]) -> Option<Rect> {
        Rect::from_object(self.get(key)?)
    }

    /// Whether the `/Type` entry of the dictionary is the given name.
    pub fn has_type(&self, ty: &[u8]) -> bool {
        self.get_name(keys::TYPE).is_some_and(|n| n == ty)
    }

    /// An iterator over all entries in the dictionary, sorted by key.
    pub fn iter(&self) -> impl Iterator<Item = (&Name, &Object)> {
        self.0.iter()
    }

    /// An iterator over all values in the dictionary, sorted by key.
    pub fn values(&self) -> impl Iterator<Item = &Object> {
        self.0.values()
    }
}

impl Debug for Dict {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.0.iter()).finish()
    }
}

impl FromIterator<(Name, Object)> for Dict {
    fn from_iter<T: IntoIterator<Item = (Name, Object)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The dictionary keys and name values this crate knows about.
#[allow(missing_docs)]
pub mod keys {
    macro_rules! key {
        ($i:ident, $e:expr) => {
            pub const $i: &[u8] = $e;
        };
    }

    key!(ANNOTS, b"Annots");
    key!(B, b"B");
    key!(BITS_PER_COMPONENT, b"BitsPerComponent");
    key!(CATALOG, b"Catalog");
    key!(COLORS, b"Colors");
    key!(COLUMNS, b"Columns");
    key!(CONTENTS, b"Contents");
    key!(COUNT, b"Count");
    key!(CROP_BOX, b"CropBox");
    key!(DECODE_PARMS, b"DecodeParms");
    key!(ENCRYPT, b"Encrypt");
    key!(EXTENDS, b"Extends");
    key!(FILTER, b"Filter");
    key!(FIRST, b"First");
    key!(FLATE_DECODE, b"FlateDecode");
    key!(FLATE_DECODE_ABBREVIATION, b"Fl");
    key!(ID, b"ID");
    key!(INDEX, b"Index");
    key!(INFO, b"Info");
    key!(KIDS, b"Kids");
    key!(LENGTH, b"Length");
    key!(MEDIA_BOX, b"MediaBox");
    key!(N, b"N");
    key!(OBJ_STM, b"ObjStm");
    key!(PAGE, b"Page");
    key!(PAGES, b"Pages");
    key!(PARENT, b"Parent");
    key!(PREDICTOR, b"Predictor");
    key!(PREV, b"Prev");
    key!(RESOURCES, b"Resources");
    key!(ROOT, b"Root");
    key!(ROTATE, b"Rotate");
    key!(SIZE, b"Size");
    key!(STRUCT_PARENTS, b"StructParents");
    key!(TYPE, b"Type");
    key!(VERSION, b"Version");
    key!(W, b"W");
    key!(XREF, b"XRef");
    key!(XREF_STM, b"XRefStm");
}
