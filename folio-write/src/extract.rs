//! Extracting a single page together with everything it depends on.

use folio_syntax::document::INHERITABLE_ATTRIBUTES;
use folio_syntax::object::dict::keys::{
    B, CATALOG, CONTENTS, COUNT, KIDS, LENGTH, PAGE, PAGES, PARENT, STRUCT_PARENTS, TYPE,
};
use folio_syntax::object::{Dict, Name, Object, ObjectId, Stream};
use folio_syntax::xref::XRefEntry;
use folio_syntax::{Document, Error, PageNode, PdfVersion, Result};
use log::{debug, warn};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;

/// The object number of the catalog in an extracted document.
pub const CATALOG_ID: u32 = 1;
/// The object number of the page tree root in an extracted document.
pub const PAGES_ID: u32 = 2;
/// The object number of the page in an extracted document.
pub const PAGE_ID: u32 = 3;

const FIRST_FREE_ID: u32 = 4;

/// Page entries that point into structures of the whole source document.
const DROPPED_PAGE_KEYS: [&[u8]; 3] = [PARENT, B, STRUCT_PARENTS];

const fn id(number: u32) -> ObjectId {
    ObjectId::new(number, 0)
}

/// A self-contained document with a single page, ready to be serialized.
///
/// Objects are numbered sequentially starting at 1, all with generation 0. Every
/// reference contained in one of the objects points to another object of the document.
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    objects: BTreeMap<u32, Object>,
    version: PdfVersion,
}

impl ExtractedDocument {
    /// The PDF version of the source document.
    pub fn version(&self) -> PdfVersion {
        self.version
    }

    /// The number of objects, without the free head of the cross-reference table.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the document has no objects. Never true for an extracted page.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Return the object with the given number.
    pub fn get(&self, number: u32) -> Option<&Object> {
        self.objects.get(&number)
    }

    /// The page dictionary.
    pub fn page(&self) -> Option<&Dict> {
        self.get(PAGE_ID).and_then(Object::as_dict)
    }

    /// All objects in ascending order of their number.
    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &Object)> {
        self.objects.iter().map(|(n, o)| (id(*n), o))
    }
}

/// Extract the page with the given zero-based index into its own document.
pub fn extract(doc: &Document, page_index: usize) -> Result<ExtractedDocument> {
    if doc.is_encrypted() {
        return Err(Error::UnsupportedFeature("encrypted documents".to_string()));
    }

    let page = doc.resolve_page(page_index)?;
    let mut page_tree = FxHashSet::default();

    for node in doc.pages()? {
        page_tree.insert(node.id());
        page_tree.extend(node.ancestors().iter().copied());
    }

    let mut ctx = ExtractionContext::new(doc, page.id(), page_tree);

    let page_dict = ctx.page_dict(page)?;
    ctx.objects.insert(PAGE_ID, Object::Dict(page_dict));
    ctx.write_dependencies()?;

    ctx.objects.insert(
        PAGES_ID,
        Object::Dict(Dict::from_iter([
            (Name::new(TYPE), Object::from(Name::new(PAGES))),
            (Name::new(KIDS), Object::from(vec![Object::from(id(PAGE_ID))])),
            (Name::new(COUNT), Object::from(1_i64)),
        ])),
    );
    ctx.objects.insert(
        CATALOG_ID,
        Object::Dict(Dict::from_iter([
            (Name::new(TYPE), Object::from(Name::new(CATALOG))),
            (Name::new(PAGES), Object::from(id(PAGES_ID))),
        ])),
    );

    debug!(
        "extracted page {} with {} objects",
        page_index + 1,
        ctx.objects.len()
    );

    Ok(ExtractedDocument {
        objects: ctx.objects,
        version: doc.version(),
    })
}

struct ExtractionContext<'a> {
    doc: &'a Document,
    page: ObjectId,
    page_tree: FxHashSet<ObjectId>,
    objects: BTreeMap<u32, Object>,
    ref_map: FxHashMap<ObjectId, u32>,
    to_visit: Vec<ObjectId>,
    next_id: u32,
}

impl<'a> ExtractionContext<'a> {
    fn new(doc: &'a Document, page: ObjectId, page_tree: FxHashSet<ObjectId>) -> Self {
        Self {
            doc,
            page,
            page_tree,
            objects: BTreeMap::new(),
            ref_map: FxHashMap::default(),
            to_visit: vec![],
            next_id: FIRST_FREE_ID,
        }
    }

    fn new_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;

        id
    }

    /// Return the number of the copy of the source object, queueing it for copying on
    /// first sight.
    fn map_ref(&mut self, source: ObjectId) -> u32 {
        if let Some(number) = self.ref_map.get(&source) {
            return *number;
        }

        let number = self.new_id();
        self.ref_map.insert(source, number);
        self.to_visit.push(source);

        number
    }

    fn remap(&mut self, obj: &Object) -> Object {
        match obj {
            Object::Reference(source) => self.remap_reference(*source),
            Object::Array(items) => Object::Array(items.iter().map(|i| self.remap(i)).collect()),
            Object::Dict(dict) => Object::Dict(self.remap_dict(dict, &[])),
            Object::Stream(stream) => Object::Stream(self.remap_stream(stream)),
            other => other.clone(),
        }
    }

    fn remap_reference(&mut self, source: ObjectId) -> Object {
        if source == self.page {
            return Object::from(id(PAGE_ID));
        }

        // Other pages and the nodes above them must not be dragged into the output,
        // for example through link destinations or the `/P` entries of annotations.
        if self.page_tree.contains(&source) {
            debug!("replacing reference to page tree node {source} with null");

            return Object::Null;
        }

        match self.doc.xref().get(source) {
            Some(XRefEntry::InUse { .. } | XRefEntry::Compressed { .. }) => {
                Object::from(id(self.map_ref(source)))
            }
            _ => {
                warn!("reference to missing object {source}, replacing it with null");

                Object::Null
            }
        }
    }

    fn remap_dict(&mut self, dict: &Dict, skip: &[&[u8]]) -> Dict {
        dict.iter()
            .filter(|(k, _)| !skip.contains(&&k[..]))
            .map(|(k, v)| (k.clone(), self.remap(v)))
            .collect()
    }

    fn remap_stream(&mut self, stream: &Stream) -> Stream {
        // The length is recomputed when writing, and an indirect length would otherwise
        // be copied as a separate object.
        let dict = self.remap_dict(stream.dict(), &[LENGTH]);

        stream.with_dict(dict)
    }

    fn page_dict(&mut self, page: &PageNode) -> Result<Dict> {
        let mut dict = self.remap_dict(page.dict(), &DROPPED_PAGE_KEYS);

        for key in INHERITABLE_ATTRIBUTES {
            if page.is_inherited(key) {
                if let Some(value) = page.attribute(key) {
                    let value = self.remap(value);
                    dict.insert(Name::new(key), value);
                }
            }
        }

        dict.insert(Name::new(TYPE), Object::from(Name::new(PAGE)));
        dict.insert(Name::new(PARENT), Object::from(id(PAGES_ID)));

        let has_contents = match page.dict().get(CONTENTS) {
            Some(contents) => !self.doc.deref(contents)?.is_null(),
            None => false,
        };

        if !has_contents {
            debug!("page {} has no content stream, adding an empty one", page.id());

            let number = self.new_id();
            self.objects
                .insert(number, Object::Stream(Stream::new(Dict::new(), Vec::<u8>::new())));
            dict.insert(Name::new(CONTENTS), Object::from(id(number)));
        }

        Ok(dict)
    }

    fn write_dependencies(&mut self) -> Result<()> {
        while let Some(source) = self.to_visit.pop() {
            let Some(&number) = self.ref_map.get(&source) else {
                continue;
            };

            if self.objects.contains_key(&number) {
                continue;
            }

            let object = self.doc.resolve(source)?;
            let copy = self.remap(&object);
            self.objects.insert(number, copy);
        }

        Ok(())
    }
}
