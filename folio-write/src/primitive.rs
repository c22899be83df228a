use folio_syntax::object::dict::keys::LENGTH;
use folio_syntax::object::{Dict, Number, Object, ObjectId, Stream};
use pdf_writer::{Chunk, Obj, Primitive, Ref};
use std::ops::DerefMut;

/// Convert an object identifier of an extracted document into a `pdf-writer` reference.
pub(crate) fn to_ref(id: ObjectId) -> Ref {
    // Extracted documents are numbered sequentially from 1, so this never truncates in
    // practice.
    Ref::new(i32::try_from(id.number).unwrap_or(i32::MAX))
}

pub(crate) trait WriteDirect {
    fn write_direct(&self, obj: Obj<'_>);
}

/// Writes numbers without narrowing them to the 32-bit types of `pdf-writer`.
struct Exact(Number);

impl Primitive for Exact {
    fn write(self, buf: &mut Vec<u8>) {
        match self.0 {
            Number::Integer(i) => buf.extend(i.to_string().as_bytes()),
            Number::Real(r) if r.is_finite() => {
                // `Display` for `f64` never uses an exponent and prints the shortest
                // representation that reads back to the same value.
                let text = r.to_string();
                buf.extend(text.as_bytes());

                if !text.contains('.') {
                    buf.extend(b".0");
                }
            }
            Number::Real(_) => buf.push(b'0'),
        }
    }
}

impl WriteDirect for Number {
    fn write_direct(&self, obj: Obj<'_>) {
        obj.primitive(Exact(*self));
    }
}

impl WriteDirect for [Object] {
    fn write_direct(&self, obj: Obj<'_>) {
        let mut arr = obj.array();

        for item in self {
            item.write_direct(arr.push());
        }
    }
}

fn write_dict(dict: &Dict, pdf_dict: &mut pdf_writer::Dict<'_>, is_stream: bool) {
    for (name, val) in dict.iter() {
        // `pdf-writer` writes the length of streams itself.
        if is_stream && &**name == LENGTH {
            continue;
        }

        val.write_direct(pdf_dict.insert(pdf_writer::Name(name)));
    }
}

impl WriteDirect for Dict {
    fn write_direct(&self, obj: Obj<'_>) {
        let mut dict = obj.dict();

        write_dict(self, &mut dict, false);
    }
}

impl WriteDirect for Object {
    fn write_direct(&self, obj: Obj<'_>) {
        match self {
            Self::Null => obj.primitive(pdf_writer::Null),
            Self::Boolean(b) => obj.primitive(*b),
            Self::Number(n) => n.write_direct(obj),
            Self::String(s) => obj.primitive(pdf_writer::Str(s.get())),
            Self::Name(n) => obj.primitive(pdf_writer::Name(n)),
            Self::Array(a) => a.write_direct(obj),
            Self::Dict(d) => d.write_direct(obj),
            Self::Reference(r) => obj.primitive(to_ref(*r)),
            Self::Stream(s) => {
                // Streams can only be written as indirect objects, keep at least the
                // dictionary.
                log::warn!("found a direct stream object, writing its dictionary only");
                s.dict().write_direct(obj);
            }
        }
    }
}

pub(crate) trait WriteIndirect {
    fn write_indirect(&self, chunk: &mut Chunk, id: Ref);
}

impl WriteIndirect for Stream {
    fn write_indirect(&self, chunk: &mut Chunk, id: Ref) {
        let mut stream = chunk.stream(id, self.raw_data());
        write_dict(self.dict(), stream.deref_mut(), true);
    }
}

impl WriteIndirect for Object {
    fn write_indirect(&self, chunk: &mut Chunk, id: Ref) {
        match self {
            Self::Stream(s) => s.write_indirect(chunk, id),
            other => other.write_direct(chunk.indirect(id)),
        }
    }
}
