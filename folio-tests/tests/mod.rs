use folio_syntax::Document;
use folio_syntax::object::{Object, ObjectId};
use folio_syntax::xref::XRefEntry;
use std::path::Path;

mod write;

pub(crate) fn open(data: Vec<u8>) -> Document {
    Document::new(data).unwrap()
}

/// Assert that every reference of every object in the document points to an object
/// that exists in the document.
pub(crate) fn check_references(doc: &Document) {
    for (number, entry) in doc.xref().iter() {
        if !matches!(entry, XRefEntry::InUse { .. }) {
            continue;
        }

        let obj = doc.resolve(ObjectId::new(number, entry.generation())).unwrap();
        let mut refs = vec![];
        obj.for_each_reference(&mut |r| refs.push(r));

        for r in refs {
            assert!(
                !matches!(*doc.resolve(r).unwrap(), Object::Null),
                "object {number} references missing object {r}"
            );
        }
    }
}

/// Open a written page file, checking that it is a valid single-page document.
pub(crate) fn open_page(path: &Path) -> Document {
    let doc = Document::open(path).unwrap();

    assert_eq!(doc.page_count().unwrap(), 1, "{} has more than one page", path.display());
    check_references(&doc);

    doc
}

/// The raw payload of the content stream of the first page.
pub(crate) fn content_of_first_page(doc: &Document) -> Vec<u8> {
    let page = doc.resolve_page(0).unwrap();
    let contents = doc.inherited(page, b"Contents").unwrap().unwrap();

    contents.as_stream().unwrap().raw_data().to_vec()
}
