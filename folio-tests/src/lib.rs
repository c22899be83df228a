//! Building PDF files for tests, with correct byte offsets.
//!
//! Objects are appended in the order they are added. Each call to one of the `xref`
//! methods closes a section covering the objects added since the previous one, which
//! makes it possible to build incremental updates.

use flate2::Compression;
use flate2::write::ZlibEncoder;
use std::collections::BTreeMap;
use std::io::Write;

/// Free, in use, or compressed.
#[derive(Debug, Clone, Copy)]
enum Entry {
    Free,
    InUse(usize),
    Compressed { stream: u32, index: u32 },
}

/// A builder for PDF files.
pub struct PdfBuilder {
    data: Vec<u8>,
    section: BTreeMap<u32, Entry>,
    last_xref: Option<usize>,
}

impl PdfBuilder {
    /// Start a new file with the given header version, like `1.7`.
    pub fn new(version: &str) -> Self {
        let mut data = format!("%PDF-{version}\n").into_bytes();
        data.extend_from_slice(&[b'%', 0xe2, 0xe3, 0xcf, 0xd3, b'\n']);

        Self {
            data,
            section: BTreeMap::new(),
            last_xref: None,
        }
    }

    /// The current length of the file.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether nothing has been written yet. Never true, the header is always there.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Add an indirect object with the given body.
    pub fn object(&mut self, number: u32, body: &str) -> &mut Self {
        self.raw_object(number, body.as_bytes())
    }

    /// Add an indirect object with the given raw body.
    pub fn raw_object(&mut self, number: u32, body: &[u8]) -> &mut Self {
        self.section.insert(number, Entry::InUse(self.data.len()));

        self.data.extend_from_slice(format!("{number} 0 obj\n").as_bytes());
        self.data.extend_from_slice(body);
        self.data.extend_from_slice(b"\nendobj\n");

        self
    }

    /// Add a stream object. `dict` holds the dictionary entries without the length,
    /// which is computed from `data`.
    pub fn stream(&mut self, number: u32, dict: &str, data: &[u8]) -> &mut Self {
        let length = format!("/Length {}", data.len());
        self.stream_with_length(number, &format!("{dict} {length}"), data)
    }

    /// Add a stream object whose dictionary is written exactly as given, including
    /// an arbitrary or missing `/Length`.
    pub fn stream_with_length(&mut self, number: u32, dict: &str, data: &[u8]) -> &mut Self {
        let mut body = format!("<< {dict} >>\nstream\n").into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(b"\nendstream");

        self.raw_object(number, &body)
    }

    /// Add a flate compressed object stream with the given objects, and record them
    /// as compressed entries of the current section.
    pub fn object_stream(&mut self, number: u32, objects: &[(u32, &str)]) -> &mut Self {
        let mut header = String::new();
        let mut body = String::new();

        for (index, (obj_number, obj)) in objects.iter().enumerate() {
            header.push_str(&format!("{obj_number} {} ", body.len()));
            body.push_str(obj);
            body.push('\n');

            self.section.insert(
                *obj_number,
                Entry::Compressed {
                    stream: number,
                    index: index as u32,
                },
            );
        }

        let first = header.len();
        let data = deflate(format!("{header}{body}").as_bytes());

        self.stream(
            number,
            &format!(
                "/Type /ObjStm /N {} /First {first} /Filter /FlateDecode",
                objects.len()
            ),
            &data,
        )
    }

    /// Mark an object as deleted in the current section.
    pub fn free(&mut self, number: u32) -> &mut Self {
        self.section.insert(number, Entry::Free);
        self
    }

    /// Close the current section with a classic cross-reference table. `trailer` holds
    /// the trailer entries, `/Prev` is added automatically.
    pub fn classic_xref(&mut self, trailer: &str) -> &mut Self {
        let offset = self.data.len();
        let entries = self.take_section();

        self.data.extend_from_slice(b"xref\n");

        for run in runs(&entries) {
            self.data
                .extend_from_slice(format!("{} {}\n", run[0].0, run.len()).as_bytes());

            for (number, entry) in run {
                let line = match entry {
                    Entry::InUse(offset) => format!("{offset:010} 00000 n\r\n"),
                    Entry::Free if *number == 0 => "0000000000 65535 f\r\n".to_string(),
                    Entry::Free => "0000000000 00001 f\r\n".to_string(),
                    Entry::Compressed { .. } => {
                        panic!("classic tables can't hold compressed objects")
                    }
                };

                self.data.extend_from_slice(line.as_bytes());
            }
        }

        let trailer = self.with_prev(trailer);
        self.data
            .extend_from_slice(format!("trailer\n<< {trailer} >>\n").as_bytes());
        self.finish_section(offset)
    }

    /// Write the current section as a cross-reference stream object with the given
    /// number, without pointing `startxref` to it. Returns the offset of the stream,
    /// for use with `/XRefStm` in a hybrid file.
    pub fn xref_stream_object(&mut self, number: u32, trailer: &str) -> usize {
        let offset = self.data.len();
        self.section.insert(number, Entry::InUse(offset));
        let entries = self.take_section();

        // Predictor 12 (PNG up) with 7 columns, as written by most producers.
        let mut rows = vec![];
        let mut prev = [0_u8; 7];
        let mut index = vec![];

        for run in runs(&entries) {
            index.push(format!("{} {}", run[0].0, run.len()));

            for (number, entry) in run {
                let row = match entry {
                    Entry::Free if *number == 0 => [0, 0, 0, 0, 0, 0xff, 0xff],
                    Entry::Free => [0, 0, 0, 0, 0, 0, 1],
                    Entry::InUse(offset) => {
                        let o = (*offset as u32).to_be_bytes();
                        [1, o[0], o[1], o[2], o[3], 0, 0]
                    }
                    Entry::Compressed { stream, index: i } => {
                        let s = stream.to_be_bytes();
                        let i = (*i as u16).to_be_bytes();
                        [2, s[0], s[1], s[2], s[3], i[0], i[1]]
                    }
                };

                rows.push(2);
                rows.extend(row.iter().zip(prev).map(|(c, p)| c.wrapping_sub(p)));
                prev = row;
            }
        }

        let trailer = self.with_prev(trailer);
        let dict = format!(
            "/Type /XRef /W [1 4 2] /Index [{}] /Filter /FlateDecode \
             /DecodeParms << /Predictor 12 /Columns 7 >> {trailer}",
            index.join(" ")
        );
        self.stream(number, &dict, &deflate(&rows));

        offset
    }

    /// Close the current section with a cross-reference stream.
    pub fn xref_stream(&mut self, number: u32, trailer: &str) -> &mut Self {
        let offset = self.xref_stream_object(number, trailer);
        self.finish_section(offset)
    }

    /// Append raw bytes.
    pub fn raw(&mut self, data: &[u8]) -> &mut Self {
        self.data.extend_from_slice(data);
        self
    }

    /// The bytes of the file.
    pub fn finish(&self) -> Vec<u8> {
        self.data.clone()
    }

    fn take_section(&mut self) -> Vec<(u32, Entry)> {
        if self.last_xref.is_none() {
            self.section.entry(0).or_insert(Entry::Free);
        }

        std::mem::take(&mut self.section).into_iter().collect()
    }

    fn with_prev(&self, trailer: &str) -> String {
        match self.last_xref {
            Some(prev) => format!("{trailer} /Prev {prev}"),
            None => trailer.to_string(),
        }
    }

    fn finish_section(&mut self, xref_offset: usize) -> &mut Self {
        self.data
            .extend_from_slice(format!("startxref\n{xref_offset}\n%%EOF\n").as_bytes());
        self.last_xref = Some(xref_offset);

        self
    }
}

fn runs(entries: &[(u32, Entry)]) -> Vec<&[(u32, Entry)]> {
    let mut runs = vec![];
    let mut start = 0;

    for i in 1..=entries.len() {
        if i == entries.len() || entries[i].0 != entries[i - 1].0 + 1 {
            runs.push(&entries[start..i]);
            start = i;
        }
    }

    runs
}

/// Compress data with zlib.
pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut e = ZlibEncoder::new(Vec::new(), Compression::default());
    e.write_all(data).unwrap();
    e.finish().unwrap()
}

/// A document with `n` pages, each with its own content stream drawing the page
/// number, below a single page tree node defining the media box.
pub fn simple_document(n: usize) -> Vec<u8> {
    let mut builder = PdfBuilder::new("1.7");
    let kids = (0..n)
        .map(|i| format!("{} 0 R", 3 + 2 * i))
        .collect::<Vec<_>>()
        .join(" ");

    builder
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(
            2,
            &format!("<< /Type /Pages /Kids [{kids}] /Count {n} /MediaBox [0 0 595 842] >>"),
        );

    for i in 0..n {
        let page = 3 + 2 * i as u32;
        builder
            .object(
                page,
                &format!("<< /Type /Page /Parent 2 0 R /Contents {} 0 R >>", page + 1),
            )
            .stream(page + 1, "", content(i).as_bytes());
    }

    builder
        .classic_xref(&format!("/Size {} /Root 1 0 R", 3 + 2 * n))
        .finish()
}

/// The content stream of page `index` of [`simple_document`].
pub fn content(index: usize) -> String {
    format!("BT /F1 12 Tf 72 720 Td (Page {}) Tj ET", index + 1)
}
