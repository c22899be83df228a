//! Writing an extracted document as a PDF file.

use crate::extract::{CATALOG_ID, ExtractedDocument};
use crate::primitive::{WriteIndirect, to_ref};
use folio_syntax::object::ObjectId;
use pdf_writer::Chunk;
use std::io::Write;

/// Serialize the document into the bytes of a PDF file with a classic cross-reference
/// table.
///
/// Stream payloads are written exactly as they were read, no compression is applied.
pub fn write(doc: &ExtractedDocument) -> Vec<u8> {
    let mut out = Vec::new();
    let _ = write!(out, "%PDF-{}\n%", doc.version());
    // A comment with bytes above 127 marks the file as binary.
    out.extend_from_slice(&[0xc4, 0xc5, 0xd9, 0xe2, b'\n']);

    let mut offsets = Vec::with_capacity(doc.len());

    for (id, object) in doc.objects() {
        let mut chunk = Chunk::new();
        object.write_indirect(&mut chunk, to_ref(id));

        offsets.push((id, out.len()));
        out.extend_from_slice(chunk.as_bytes());
    }

    let size = offsets.last().map_or(0, |(id, _)| id.number) + 1;
    let xref_offset = out.len();

    write_xref_table(&mut out, size, &offsets);

    let _ = write!(
        out,
        "trailer\n<< /Size {size} /Root {CATALOG_ID} 0 R >>\nstartxref\n{xref_offset}\n%%EOF\n"
    );

    out
}

fn write_xref_table(out: &mut Vec<u8>, size: u32, offsets: &[(ObjectId, usize)]) {
    let _ = write!(out, "xref\n0 {size}\n");
    out.extend_from_slice(b"0000000000 65535 f\r\n");

    let mut entries = offsets.iter().peekable();

    for number in 1..size {
        match entries.next_if(|(id, _)| id.number == number) {
            Some((_, offset)) => {
                let _ = write!(out, "{offset:010} 00000 n\r\n");
            }
            // Extracted documents are numbered without gaps, but keep the table valid
            // regardless.
            None => out.extend_from_slice(b"0000000000 00000 f\r\n"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{PAGE_ID, extract};
    use folio_syntax::Document;
    use folio_syntax::object::dict::keys::CONTENTS;
    use folio_syntax::xref::{XREF_ENTRY_LEN, XRefEntry};

    fn source() -> Document {
        let objects: [&[u8]; 4] = [
            b"<< /Type /Catalog /Pages 2 0 R >>",
            b"<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 300 300] >>",
            b"<< /Type /Page /Parent 2 0 R /Contents 4 0 R /Rotate 180 >>",
            b"<< /Length 9 0 R >>\nstream\n0 0 m 1 1 l S\nendstream",
        ];

        let mut data = b"%PDF-1.5\n".to_vec();
        let mut offsets = vec![];

        for (i, body) in objects.iter().enumerate() {
            offsets.push(data.len());
            data.extend_from_slice(format!("{} 0 obj\n", i + 1).as_bytes());
            data.extend_from_slice(body);
            data.extend_from_slice(b"\nendobj\n");
        }

        let xref = data.len();
        data.extend_from_slice(b"xref\n0 5\n0000000000 65535 f\r\n");

        for offset in offsets {
            data.extend_from_slice(format!("{offset:010} 00000 n\r\n").as_bytes());
        }

        data.extend_from_slice(
            format!("trailer\n<< /Size 5 /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n").as_bytes(),
        );

        Document::new(data).unwrap()
    }

    #[test]
    fn header_keeps_version() {
        let bytes = write(&extract(&source(), 0).unwrap());

        assert!(bytes.starts_with(b"%PDF-1.5\n%"));
        assert!(bytes.ends_with(b"%%EOF\n"));
    }

    #[test]
    fn reparses() {
        let bytes = write(&extract(&source(), 0).unwrap());
        let doc = Document::new(bytes).unwrap();

        assert_eq!(doc.page_count().unwrap(), 1);

        let page = doc.resolve_page(0).unwrap();
        assert_eq!(page.id(), ObjectId::new(PAGE_ID, 0));
        assert_eq!(page.rotation(), 180);
        assert_eq!(page.media_box().width(), 300.0);

        let contents = doc.inherited(page, CONTENTS).unwrap().unwrap();
        assert_eq!(contents.as_stream().unwrap().raw_data(), b"0 0 m 1 1 l S");
    }

    #[test]
    fn xref_entries() {
        let extracted = extract(&source(), 0).unwrap();
        let bytes = write(&extracted);
        let start = rfind(&bytes, b"\nxref\n").unwrap() + 1;
        let trailer = rfind(&bytes, b"trailer\n").unwrap();
        let header_len = format!("xref\n0 {}\n", extracted.len() + 1).len();
        let table = &bytes[start + header_len..trailer];

        assert_eq!(table.len(), (extracted.len() + 1) * XREF_ENTRY_LEN);
        assert!(table.starts_with(b"0000000000 65535 f\r\n"));

        let doc = Document::new(bytes.clone()).unwrap();

        for (id, _) in extracted.objects() {
            let Some(XRefEntry::InUse { offset, .. }) = doc.xref().get(id) else {
                panic!("missing entry for {id}");
            };

            assert!(bytes[offset..].starts_with(format!("{} 0 obj", id.number).as_bytes()));
        }
    }

    fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).rposition(|w| w == needle)
    }
}
