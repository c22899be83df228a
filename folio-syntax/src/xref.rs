//! Reading the cross-reference data of a PDF file.

use crate::error::{Error, Result};
use crate::lexer::{Lexer, Token};
use crate::object::dict::keys::{
    DECODE_PARMS, FILTER, INDEX, LENGTH, PREV, SIZE, TYPE, W, XREF_STM,
};
use crate::object::{Dict, Object, ObjectId};
use crate::parser::Parser;
use log::{debug, warn};
use rustc_hash::{FxHashMap, FxHashSet};

/// The length of a single entry in a classic xref table, including its EOL marker.
pub const XREF_ENTRY_LEN: usize = 20;

/// How far from the end of the file `startxref` is searched for.
const STARTXREF_SEARCH_WINDOW: usize = 64 * 1024;

/// An entry of the cross-reference table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// The object number is not in use.
    Free {
        /// The generation number the object would get when reused.
        generation: u16,
    },
    /// An object stored at a byte offset in the file.
    InUse {
        /// The byte offset of the object.
        offset: usize,
        /// The generation number of the object.
        generation: u16,
    },
    /// An object stored inside of an object stream.
    Compressed {
        /// The object number of the object stream. Its generation is always 0.
        stream: u32,
        /// The index of the object inside of the stream.
        index: u32,
    },
}

impl XRefEntry {
    /// The generation number of the object the entry points to.
    pub fn generation(&self) -> u16 {
        match *self {
            Self::Free { generation } | Self::InUse { generation, .. } => generation,
            Self::Compressed { .. } => 0,
        }
    }
}

/// One xref section, that is a classic table or an xref stream, together with its
/// trailer dictionary.
#[derive(Debug)]
struct Section {
    offset: usize,
    entries: Vec<(u32, XRefEntry)>,
    trailer: Dict,
}

/// The merged cross-reference table of a file.
#[derive(Debug, Clone, Default)]
pub struct XRef {
    entries: FxHashMap<u32, XRefEntry>,
    trailer: Dict,
}

impl XRef {
    /// Locate and read all cross-reference sections of the file.
    ///
    /// Sections reachable through `/Prev` are merged so that newer sections override
    /// older ones. The trailer takes each key from the newest section that defines it.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let start = find_startxref(data)?;

        let first = read_section(data, start, true)?;
        let mut visited = FxHashSet::default();
        visited.insert(first.offset);

        // Newest first.
        let mut sections = vec![first];

        while let Some(prev) = sections.last().and_then(|s| s.trailer.get(PREV)) {
            let Some(prev) = prev.as_i64().and_then(|p| usize::try_from(p).ok()) else {
                warn!("ignoring invalid /Prev entry");
                break;
            };

            if !visited.insert(prev) {
                warn!("xref sections form a loop at offset {prev}, stopping");
                break;
            }

            if prev >= data.len() {
                return Err(Error::corrupt_xref(prev, "/Prev points outside of the file"));
            }

            sections.push(read_section(data, prev, false)?);
        }

        let mut xref = Self::default();

        for section in sections.into_iter().rev() {
            debug!(
                "merging xref section at {} with {} entries",
                section.offset,
                section.entries.len()
            );

            xref.entries.extend(section.entries);

            for (key, value) in section.trailer.iter() {
                xref.trailer.insert(key.clone(), value.clone());
            }
        }

        xref.trailer.remove(PREV);
        xref.trailer.remove(XREF_STM);

        for (&number, entry) in &xref.entries {
            if let XRefEntry::InUse { offset, generation } = *entry {
                if offset >= data.len() {
                    return Err(Error::CorruptCrossReference {
                        offset,
                        object: Some(ObjectId::new(number, generation)),
                        reason: "offset points outside of the file".to_string(),
                    });
                }
            }
        }

        Ok(xref)
    }

    /// Look up the entry of an object. Entries whose generation doesn't match are
    /// treated as absent.
    pub fn get(&self, id: ObjectId) -> Option<XRefEntry> {
        self.entries
            .get(&id.number)
            .copied()
            .filter(|e| e.generation() == id.generation)
    }

    /// Look up the entry for an object number, regardless of the generation.
    pub fn entry(&self, number: u32) -> Option<XRefEntry> {
        self.entries.get(&number).copied()
    }

    /// The merged trailer dictionary.
    pub fn trailer(&self) -> &Dict {
        &self.trailer
    }

    /// The number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// An iterator over all entries, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, XRefEntry)> + '_ {
        self.entries.iter().map(|(n, e)| (*n, *e))
    }
}

fn find_startxref(data: &[u8]) -> Result<usize> {
    let window_start = data.len().saturating_sub(STARTXREF_SEARCH_WINDOW);
    let pos = memchr::memmem::rfind(&data[window_start..], b"startxref")
        .map(|p| p + window_start)
        .ok_or(Error::MissingTrailer)?;

    let mut lexer = Lexer::new_at(data, pos + b"startxref".len());
    let offset = lexer.token_offset();

    match lexer.next_token() {
        Ok(Some(Token::Integer(n))) => match usize::try_from(n) {
            Ok(n) if n < data.len() => Ok(n),
            _ => Err(Error::corrupt_xref(
                offset,
                format!("startxref offset {n} is out of bounds"),
            )),
        },
        _ => Err(Error::corrupt_xref(offset, "startxref is not followed by an offset")),
    }
}

/// Read the section at `offset`. For the section `startxref` points to, the absence of
/// anything looking like a section is reported as a missing trailer.
fn read_section(data: &[u8], offset: usize, is_first: bool) -> Result<Section> {
    let mut lexer = Lexer::new_at(data, offset);
    let token_start = lexer.token_offset();

    match lexer.next_token() {
        Ok(Some(Token::Keyword(b"xref"))) => read_classic_section(data, lexer, offset),
        Ok(Some(Token::Integer(_))) => read_stream_section(data, token_start).map_err(|e| {
            corrupt_context(e, offset, "xref stream is invalid")
        }),
        _ if is_first => Err(Error::MissingTrailer),
        _ => Err(Error::corrupt_xref(offset, "no xref section at offset")),
    }
}

fn corrupt_context(err: Error, offset: usize, reason: &str) -> Error {
    match err {
        e @ (Error::CorruptCrossReference { .. } | Error::MissingTrailer) => e,
        e => Error::corrupt_xref(offset, format!("{reason}: {e}")),
    }
}

fn read_classic_section(data: &[u8], mut lexer: Lexer<'_>, offset: usize) -> Result<Section> {
    let mut entries = vec![];

    loop {
        let token_offset = lexer.token_offset();

        match lexer.next_token()? {
            Some(Token::Integer(first)) => {
                let count = match lexer.next_token()? {
                    Some(Token::Integer(count)) => count,
                    _ => {
                        return Err(Error::corrupt_xref(
                            token_offset,
                            "invalid subsection header",
                        ));
                    }
                };

                let (Ok(first), Ok(count)) = (u32::try_from(first), u32::try_from(count)) else {
                    return Err(Error::corrupt_xref(token_offset, "invalid subsection header"));
                };

                for number in first..first.saturating_add(count) {
                    entries.push((number, read_classic_entry(&mut lexer, number)?));
                }
            }
            Some(Token::Keyword(b"trailer")) => break,
            None => return Err(Error::MissingTrailer),
            Some(other) => {
                return Err(Error::corrupt_xref(
                    token_offset,
                    format!("expected xref subsection or trailer, found {other}"),
                ));
            }
        }
    }

    let trailer_offset = lexer.token_offset();
    let mut parser = Parser::new_at(data, trailer_offset);
    let trailer = match parser.parse_object() {
        Ok(Object::Dict(dict)) => dict,
        _ => return Err(Error::MissingTrailer),
    };

    let mut section = Section {
        offset,
        entries,
        trailer,
    };

    if let Some(stm) = section.trailer.get(XREF_STM).and_then(Object::as_i64) {
        merge_hybrid_stream(data, &mut section, stm)?;
    }

    Ok(section)
}

/// Add the entries of the xref stream referenced by `/XRefStm` of a classic trailer.
/// They take precedence over the classic entries of the same section.
fn merge_hybrid_stream(data: &[u8], section: &mut Section, stm: i64) -> Result<()> {
    let Some(stm) = usize::try_from(stm).ok().filter(|s| *s < data.len()) else {
        return Err(Error::corrupt_xref(
            section.offset,
            "/XRefStm points outside of the file",
        ));
    };

    // Only its entries are used, a `/Prev` of the stream is not followed.
    let stream = read_stream_section(data, stm)
        .map_err(|e| corrupt_context(e, stm, "invalid /XRefStm stream"))?;
    debug!(
        "hybrid file, adding {} entries from the xref stream at {stm}",
        stream.entries.len()
    );
    section.entries.extend(stream.entries);

    Ok(())
}

fn read_classic_entry(lexer: &mut Lexer<'_>, number: u32) -> Result<XRefEntry> {
    let offset = lexer.token_offset();
    let invalid = || Error::CorruptCrossReference {
        offset,
        object: None,
        reason: format!("invalid xref entry for object {number}"),
    };

    let (Some(Token::Integer(position)), Some(Token::Integer(generation))) =
        (lexer.next_token()?, lexer.next_token()?)
    else {
        return Err(invalid());
    };

    let generation = u16::try_from(generation).map_err(|_| invalid())?;

    match lexer.next_token()? {
        Some(Token::Keyword(b"n")) => Ok(XRefEntry::InUse {
            offset: usize::try_from(position).map_err(|_| invalid())?,
            generation,
        }),
        Some(Token::Keyword(b"f")) => Ok(XRefEntry::Free { generation }),
        _ => Err(invalid()),
    }
}

fn read_stream_section(data: &[u8], offset: usize) -> Result<Section> {
    let (_, object) = Parser::new_at(data, offset).parse_indirect_object(&())?;

    let Object::Stream(stream) = object else {
        return Err(Error::corrupt_xref(offset, "xref stream is not a stream"));
    };

    let dict = stream.dict();

    let widths = dict
        .get_array(W)
        .filter(|w| w.len() == 3)
        .and_then(|w| {
            let mut out = [0_usize; 3];

            for (o, w) in out.iter_mut().zip(w) {
                *o = usize::try_from(w.as_i64()?).ok().filter(|w| *w <= 8)?;
            }

            Some(out)
        })
        .ok_or_else(|| Error::corrupt_xref(offset, "invalid /W entry in xref stream"))?;

    let size = dict
        .get_i64(SIZE)
        .and_then(|s| u32::try_from(s).ok())
        .ok_or_else(|| Error::corrupt_xref(offset, "xref stream has no valid /Size"))?;

    let subsections = match dict.get_array(INDEX) {
        Some(index) => index
            .chunks_exact(2)
            .map(|pair| {
                let start = pair[0].as_i64().and_then(|s| u32::try_from(s).ok())?;
                let count = pair[1].as_i64().and_then(|s| u32::try_from(s).ok())?;

                Some((start, count))
            })
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| Error::corrupt_xref(offset, "invalid /Index entry in xref stream"))?,
        None => vec![(0, size)],
    };

    let decoded = stream.decoded()?;
    let entry_len = widths.iter().sum::<usize>();
    let mut rows = decoded.chunks_exact(entry_len.max(1));
    let mut entries = vec![];

    for (start, count) in subsections {
        for number in start..start.saturating_add(count) {
            let Some(row) = rows.next().filter(|_| entry_len > 0) else {
                return Err(Error::corrupt_xref(
                    offset,
                    format!("xref stream data ends before entry of object {number}"),
                ));
            };

            let (f1, rest) = row.split_at(widths[0]);
            let (f2, f3) = rest.split_at(widths[1]);

            // A missing type field defaults to type 1.
            let kind = if widths[0] == 0 { 1 } else { be_number(f1) };
            let (f2, f3) = (be_number(f2), be_number(f3));

            let entry = match kind {
                0 => XRefEntry::Free {
                    generation: u16::try_from(f3).unwrap_or(u16::MAX),
                },
                1 => XRefEntry::InUse {
                    offset: usize::try_from(f2).map_err(|_| {
                        Error::corrupt_xref(offset, "xref stream offset is too large")
                    })?,
                    generation: u16::try_from(f3).unwrap_or(0),
                },
                2 => XRefEntry::Compressed {
                    stream: u32::try_from(f2).map_err(|_| {
                        Error::corrupt_xref(offset, "object stream number is too large")
                    })?,
                    index: u32::try_from(f3).unwrap_or(u32::MAX),
                },
                other => {
                    // Unknown types are to be treated as references to the null object.
                    warn!("ignoring xref stream entry of unknown type {other} for object {number}");
                    continue;
                }
            };

            entries.push((number, entry));
        }
    }

    // The keys describing the stream itself don't belong into the trailer.
    let stream_keys = [TYPE, W, INDEX, FILTER, DECODE_PARMS, LENGTH];
    let trailer = dict
        .iter()
        .filter(|(k, _)| !stream_keys.contains(&&k[..]))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    Ok(Section {
        offset,
        entries,
        trailer,
    })
}

fn be_number(data: &[u8]) -> u64 {
    data.iter().fold(0, |acc, b| (acc << 8) | u64::from(*b))
}

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::object::ObjectId;
    use crate::object::dict::keys::{PREV, ROOT, SIZE};
    use crate::xref::{XRef, XRefEntry, be_number};

    /// Build a file consisting of objects followed by a classic xref table, with correct
    /// offsets. `extra_trailer` is appended inside of the trailer dictionary.
    fn classic_file(objects: &[&str], extra_trailer: &str) -> (Vec<u8>, Vec<usize>) {
        let mut out = b"%PDF-1.4\n".to_vec();
        let mut offsets = vec![];

        for (i, obj) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend(format!("{} 0 obj\n{obj}\nendobj\n", i + 1).as_bytes());
        }

        let xref_pos = out.len();
        out.extend(format!("xref\n0 {}\n0000000000 65535 f\r\n", objects.len() + 1).as_bytes());

        for o in &offsets {
            out.extend(format!("{o:010} 00000 n\r\n").as_bytes());
        }

        out.extend(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R {extra_trailer} >>\nstartxref\n{xref_pos}\n%%EOF\n",
                objects.len() + 1
            )
            .as_bytes(),
        );

        (out, offsets)
    }

    #[test]
    fn classic_table() {
        let (data, offsets) = classic_file(&["<< /Type /Catalog >>", "42"], "");
        let xref = XRef::parse(&data).unwrap();

        assert_eq!(
            xref.get(ObjectId::new(2, 0)),
            Some(XRefEntry::InUse {
                offset: offsets[1],
                generation: 0
            })
        );
        assert_eq!(xref.get(ObjectId::new(0, 65535)), Some(XRefEntry::Free { generation: 65535 }));
        assert_eq!(xref.get(ObjectId::new(2, 1)), None);
        assert_eq!(xref.trailer().get_ref(ROOT), Some(ObjectId::new(1, 0)));
        assert_eq!(xref.trailer().get_i64(SIZE), Some(3));
    }

    #[test]
    fn missing_startxref() {
        assert!(matches!(
            XRef::parse(b"%PDF-1.4\n1 0 obj 5 endobj\n"),
            Err(Error::MissingTrailer)
        ));
    }

    #[test]
    fn startxref_out_of_bounds() {
        assert!(matches!(
            XRef::parse(b"%PDF-1.4\nstartxref\n999999\n%%EOF"),
            Err(Error::CorruptCrossReference { .. })
        ));
    }

    #[test]
    fn startxref_to_garbage() {
        assert!(matches!(
            XRef::parse(b"%PDF-1.4\nstartxref\n0\n%%EOF"),
            Err(Error::MissingTrailer)
        ));
    }

    #[test]
    fn entry_outside_of_file() {
        let data = b"%PDF-1.4\nxref\n0 2\n0000000000 65535 f\r\n0000099999 00000 n\r\ntrailer\n<< /Size 2 >>\nstartxref\n9\n%%EOF";

        assert!(matches!(
            XRef::parse(data),
            Err(Error::CorruptCrossReference {
                offset: 99999,
                object: Some(ObjectId { number: 1, generation: 0 }),
                ..
            })
        ));
    }

    #[test]
    fn prev_chain_newest_wins() {
        let (mut data, offsets) = classic_file(&["<< /Type /Catalog >>", "1"], "/Info 9 0 R");
        // Find the offset of the first xref table to chain to it.
        let prev = memchr::memmem::rfind(&data, b"xref\n0").unwrap();

        let new_obj = data.len();
        data.extend(b"2 0 obj\n2\nendobj\n");
        let xref_pos = data.len();
        data.extend(
            format!(
                "xref\n2 1\n{new_obj:010} 00000 n\r\ntrailer\n<< /Size 3 /Root 1 0 R /Prev {prev} >>\nstartxref\n{xref_pos}\n%%EOF\n"
            )
            .as_bytes(),
        );

        let xref = XRef::parse(&data).unwrap();

        assert_eq!(
            xref.get(ObjectId::new(2, 0)),
            Some(XRefEntry::InUse {
                offset: new_obj,
                generation: 0
            })
        );
        assert_eq!(
            xref.get(ObjectId::new(1, 0)),
            Some(XRefEntry::InUse {
                offset: offsets[0],
                generation: 0
            })
        );
        // Keys only present in the older trailer are kept.
        assert_eq!(xref.trailer().get_ref(b"Info"), Some(ObjectId::new(9, 0)));
        assert!(xref.trailer().get(PREV).is_none());
    }

    #[test]
    fn prev_loop_terminates() {
        let (data, _) = classic_file(&["<< /Type /Catalog >>"], "");
        let xref_pos = memchr::memmem::rfind(&data, b"xref\n0").unwrap();
        let looped = String::from_utf8(data)
            .unwrap()
            .replace("/Root 1 0 R ", &format!("/Root 1 0 R /Prev {xref_pos}"));

        assert!(XRef::parse(looped.as_bytes()).is_ok());
    }

    #[test]
    fn big_endian_fields() {
        assert_eq!(be_number(&[]), 0);
        assert_eq!(be_number(&[0x01, 0x02]), 0x0102);
        assert_eq!(be_number(&[0, 0, 0, 0, 0, 0, 0x10, 0]), 0x1000);
    }
}
