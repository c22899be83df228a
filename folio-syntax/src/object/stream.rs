//! Streams.

use crate::error::Result;
use crate::filter::decode;
use crate::object::dict::keys::{DECODE_PARMS, FILTER};
use crate::object::{Dict, Object};
use std::borrow::Cow;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// A stream of arbitrary data.
#[derive(Clone, PartialEq)]
pub struct Stream {
    dict: Dict,
    data: Arc<[u8]>,
}

impl Stream {
    /// Create a new stream from its dictionary and raw (still encoded) data.
    pub fn new(dict: Dict, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            dict,
            data: data.into(),
        }
    }

    /// Create a stream with the same data but a different dictionary.
    pub fn with_dict(&self, dict: Dict) -> Self {
        Self {
            dict,
            data: self.data.clone(),
        }
    }

    /// Return the dictionary of the stream.
    pub fn dict(&self) -> &Dict {
        &self.dict
    }

    /// Return the raw data of the stream, with all filters still applied.
    pub fn raw_data(&self) -> &[u8] {
        &self.data
    }

    /// Return the decoded data of the stream.
    ///
    /// Note that the result of this method will not be cached, so calling it multiple
    /// times is expensive.
    pub fn decoded(&self) -> Result<Cow<'_, [u8]>> {
        match self.dict.get(FILTER) {
            Some(Object::Name(filter)) => {
                let params = self.dict.get_dict(DECODE_PARMS);

                Ok(Cow::Owned(decode(&self.data, filter, params)?))
            }
            Some(Object::Array(filters)) => {
                let params = self.dict.get_array(DECODE_PARMS).unwrap_or_default();
                let mut current = Cow::Borrowed(&*self.data);

                for (i, filter) in filters.iter().enumerate() {
                    let Some(filter) = filter.as_name() else {
                        continue;
                    };
                    let params = params.get(i).and_then(|p| match p {
                        Object::Dict(d) => Some(d),
                        _ => None,
                    });

                    current = Cow::Owned(decode(&current, filter, params)?);
                }

                Ok(current)
            }
            _ => Ok(Cow::Borrowed(&self.data)),
        }
    }
}

impl Debug for Stream {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Stream (dict: {:?}, len: {:?})", self.dict, self.data.len())
    }
}

#[cfg(test)]
mod tests {
    use crate::object::dict::keys::FILTER;
    use crate::object::{Dict, Name, Object, Stream};
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use std::io::Write;

    #[test]
    fn unfiltered() {
        let stream = Stream::new(Dict::new(), b"abc".to_vec());

        assert_eq!(stream.decoded().unwrap().as_ref(), b"abc");
    }

    #[test]
    fn flate_array() {
        let mut e = ZlibEncoder::new(Vec::new(), Compression::default());
        e.write_all(b"BT /F1 12 Tf ET").unwrap();

        let mut dict = Dict::new();
        dict.insert(
            Name::new(FILTER),
            Object::Array(vec![Object::Name(Name::new(b"FlateDecode"))]),
        );
        let stream = Stream::new(dict, e.finish().unwrap());

        assert_eq!(stream.decoded().unwrap().as_ref(), b"BT /F1 12 Tf ET");
    }
}
