//! The object graph of a PDF document.

use crate::error::{Error, Result};
use crate::object::dict::keys::{
    CROP_BOX, ENCRYPT, FIRST, KIDS, MEDIA_BOX, N, OBJ_STM, PAGE, PAGES, RESOURCES, ROOT, ROTATE,
    VERSION,
};
use crate::object::{Dict, Name, Object, ObjectId, Rect};
use crate::parser::{LengthResolver, Parser, parse_object_stream_header};
use crate::xref::{XRef, XRefEntry};
use log::{debug, warn};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// The maximum number of references followed when dereferencing an object.
pub const MAX_REFERENCE_HOPS: usize = 32;

/// The maximum depth of the page tree.
pub const MAX_PAGE_TREE_DEPTH: usize = 32;

/// The page attributes that are inherited from the ancestors in the page tree.
pub const INHERITABLE_ATTRIBUTES: [&[u8]; 4] = [RESOURCES, MEDIA_BOX, CROP_BOX, ROTATE];

/// The version of a PDF file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PdfVersion {
    /// The major version.
    pub major: u8,
    /// The minor version.
    pub minor: u8,
}

impl PdfVersion {
    /// Create a new version.
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Read a version like `1.7`.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        match data {
            [major @ b'0'..=b'9', b'.', minor @ b'0'..=b'9', ..] => {
                Some(Self::new(major - b'0', minor - b'0'))
            }
            _ => None,
        }
    }

    /// Read the version from the `%PDF-x.y` header, which may be preceded by garbage.
    fn from_header(data: &[u8]) -> Option<Self> {
        let window = &data[..data.len().min(1024)];
        let pos = memchr::memmem::find(window, b"%PDF-")?;

        Self::from_bytes(&window[pos + 5..])
    }
}

impl Default for PdfVersion {
    fn default() -> Self {
        Self::new(1, 4)
    }
}

impl Display for PdfVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// A leaf of the page tree.
#[derive(Debug, Clone)]
pub struct PageNode {
    id: ObjectId,
    dict: Dict,
    ancestors: Vec<ObjectId>,
    inherited: Dict,
    media_box: Rect,
    crop_box: Rect,
    rotation: u16,
    resources: Dict,
}

impl PageNode {
    /// The object identifier of the page dictionary.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// The page dictionary, as stored in the file.
    pub fn dict(&self) -> &Dict {
        &self.dict
    }

    /// The intermediate page tree nodes above the page, nearest first.
    pub fn ancestors(&self) -> &[ObjectId] {
        &self.ancestors
    }

    /// Return the unresolved value of an entry of the page.
    ///
    /// For inheritable attributes, the nearest ancestor defining the entry is consulted
    /// if the page itself doesn't have it.
    pub fn attribute(&self, key: &[u8]) -> Option<&Object> {
        self.dict.get(key).or_else(|| self.inherited.get(key))
    }

    /// Whether the attribute is only defined by an ancestor and not by the page itself.
    pub fn is_inherited(&self, key: &[u8]) -> bool {
        !self.dict.contains_key(key) && self.inherited.contains_key(key)
    }

    /// The media box of the page, US Letter if it isn't defined.
    pub fn media_box(&self) -> Rect {
        self.media_box
    }

    /// The crop box of the page, defaulting to the media box.
    pub fn crop_box(&self) -> Rect {
        self.crop_box
    }

    /// The rotation of the page in degrees, one of 0, 90, 180 or 270.
    pub fn rotation(&self) -> u16 {
        self.rotation
    }

    /// The resource dictionary of the page.
    pub fn resources(&self) -> &Dict {
        &self.resources
    }
}

/// Inheritable attributes collected while walking down the page tree.
#[derive(Debug, Clone, Default)]
struct PagesContext {
    inherited: Dict,
}

impl PagesContext {
    fn descend(&self, node: &Dict) -> Self {
        let mut ctx = self.clone();

        for key in INHERITABLE_ATTRIBUTES {
            if let Some(value) = node.get(key) {
                ctx.inherited.insert(Name::new(key), value.clone());
            }
        }

        ctx
    }
}

/// The decoded data of an object stream.
#[derive(Debug)]
struct ObjectStream {
    data: Vec<u8>,
    entries: Vec<(u32, usize)>,
}

impl ObjectStream {
    fn get(&self, index: u32, number: u32) -> Result<Object> {
        let offset = match self.entries.get(index as usize) {
            Some((n, offset)) if *n == number => *offset,
            _ => match self.entries.iter().find(|(n, _)| *n == number) {
                Some((_, offset)) => {
                    warn!("object {number} is not at index {index} of its object stream");
                    *offset
                }
                None => {
                    return Err(Error::CorruptCrossReference {
                        offset: 0,
                        object: Some(ObjectId::new(number, 0)),
                        reason: "object is missing from its object stream".to_string(),
                    });
                }
            },
        };

        Parser::new_at(&self.data, offset).parse_object()
    }
}

/// A parsed PDF document.
///
/// Objects are parsed lazily and cached. The document can be shared between threads.
pub struct Document {
    data: Vec<u8>,
    xref: XRef,
    version: PdfVersion,
    objects: RwLock<FxHashMap<ObjectId, Arc<Object>>>,
    object_streams: RwLock<FxHashMap<u32, Arc<ObjectStream>>>,
    pages: OnceLock<Vec<PageNode>>,
}

impl Document {
    /// Read a document from its bytes.
    pub fn new(data: Vec<u8>) -> Result<Self> {
        let header_version = PdfVersion::from_header(&data);

        if header_version.is_none() {
            warn!("no PDF header found, assuming version {}", PdfVersion::default());
        }

        let xref = XRef::parse(&data)?;

        if !xref.trailer().contains_key(ROOT) {
            return Err(Error::corrupt_xref(0, "trailer has no /Root entry"));
        }

        debug!("read cross-reference table with {} entries", xref.len());

        let mut doc = Self {
            data,
            xref,
            version: header_version.unwrap_or_default(),
            objects: RwLock::new(FxHashMap::default()),
            object_streams: RwLock::new(FxHashMap::default()),
            pages: OnceLock::new(),
        };

        // The catalog can override the header version with a newer one.
        let catalog_version = doc.catalog().ok().and_then(|c| {
            c.as_dict()
                .and_then(|d| d.get_name(VERSION))
                .and_then(|v| PdfVersion::from_bytes(v))
        });

        if let Some(v) = catalog_version.filter(|v| *v > doc.version) {
            doc.version = v;
        }

        Ok(doc)
    }

    /// Read a document from a file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| Error::io(path, e))?;

        Self::new(data)
    }

    /// The raw bytes of the file.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The cross-reference table.
    pub fn xref(&self) -> &XRef {
        &self.xref
    }

    /// The merged trailer dictionary.
    pub fn trailer(&self) -> &Dict {
        self.xref.trailer()
    }

    /// The PDF version of the document.
    pub fn version(&self) -> PdfVersion {
        self.version
    }

    /// Whether the document is encrypted.
    pub fn is_encrypted(&self) -> bool {
        self.trailer().contains_key(ENCRYPT)
    }

    /// Return the object with the given identifier.
    ///
    /// Objects without an entry in the cross-reference table, or with a free entry,
    /// resolve to the null object.
    pub fn resolve(&self, id: ObjectId) -> Result<Arc<Object>> {
        if let Some(obj) = read(&self.objects).get(&id) {
            return Ok(obj.clone());
        }

        let obj = Arc::new(self.load(id)?);

        Ok(write(&self.objects).entry(id).or_insert(obj).clone())
    }

    /// Follow a chain of references until a direct object is reached.
    ///
    /// Non-reference objects are returned as they are.
    pub fn deref(&self, obj: &Object) -> Result<Arc<Object>> {
        let Object::Reference(mut id) = *obj else {
            return Ok(Arc::new(obj.clone()));
        };

        let mut seen = SmallVec::<[ObjectId; 4]>::new();

        loop {
            if seen.contains(&id) || seen.len() >= MAX_REFERENCE_HOPS {
                return Err(Error::ReferenceCycle { object: id });
            }

            seen.push(id);
            let resolved = self.resolve(id)?;

            match resolved.as_reference() {
                Some(next) => id = next,
                None => return Ok(resolved),
            }
        }
    }

    /// The document catalog.
    pub fn catalog(&self) -> Result<Arc<Object>> {
        let root = self
            .trailer()
            .get(ROOT)
            .ok_or_else(|| Error::corrupt_xref(0, "trailer has no /Root entry"))?;
        let catalog = self.deref(root)?;

        if catalog.as_dict().is_none() {
            return Err(Error::malformed(
                self.offset_of(root),
                format!("document catalog is a {}", catalog.kind()),
            ));
        }

        Ok(catalog)
    }

    /// All pages of the document, in order.
    pub fn pages(&self) -> Result<&[PageNode]> {
        if let Some(pages) = self.pages.get() {
            return Ok(pages.as_slice());
        }

        let pages = self.collect_pages()?;

        Ok(self.pages.get_or_init(|| pages).as_slice())
    }

    /// The number of pages of the document.
    pub fn page_count(&self) -> Result<usize> {
        Ok(self.pages()?.len())
    }

    /// Return the page with the given zero-based index.
    pub fn resolve_page(&self, index: usize) -> Result<&PageNode> {
        let pages = self.pages()?;

        pages.get(index).ok_or(Error::PageIndexOutOfRange {
            index,
            count: pages.len(),
        })
    }

    /// Return the resolved value of an attribute of the page, taking inheritance from
    /// the page tree into account.
    pub fn inherited(&self, page: &PageNode, key: &[u8]) -> Result<Option<Arc<Object>>> {
        page.attribute(key).map(|obj| self.deref(obj)).transpose()
    }

    fn load(&self, id: ObjectId) -> Result<Object> {
        match self.xref.get(id) {
            None | Some(XRefEntry::Free { .. }) => {
                debug!("object {id} is missing or free, using null");

                Ok(Object::Null)
            }
            Some(XRefEntry::InUse { offset, .. }) => {
                let (found, obj) = Parser::new_at(&self.data, offset).parse_indirect_object(self)?;

                if found != id {
                    return Err(Error::CorruptCrossReference {
                        offset,
                        object: Some(id),
                        reason: format!("entry points to object {found} instead"),
                    });
                }

                Ok(obj)
            }
            Some(XRefEntry::Compressed { stream, index }) => {
                self.object_stream(stream)?.get(index, id.number)
            }
        }
    }

    fn object_stream(&self, number: u32) -> Result<Arc<ObjectStream>> {
        if let Some(stream) = read(&self.object_streams).get(&number) {
            return Ok(stream.clone());
        }

        let id = ObjectId::new(number, 0);
        let corrupt = |offset, reason: &str| Error::CorruptCrossReference {
            offset,
            object: Some(id),
            reason: reason.to_string(),
        };

        // Object streams can't be nested, which also rules out cycles here.
        let Some(XRefEntry::InUse { offset, .. }) = self.xref.get(id) else {
            return Err(corrupt(0, "object stream is not stored in the file body"));
        };

        let obj = self.load(id)?;

        let Some(stream) = obj.as_stream().filter(|s| s.dict().has_type(OBJ_STM)) else {
            return Err(corrupt(offset, "not an object stream"));
        };

        let dict = stream.dict();
        let (Some(n), Some(first)) = (
            dict.get_i64(N).and_then(|n| usize::try_from(n).ok()),
            dict.get_i64(FIRST).and_then(|f| usize::try_from(f).ok()),
        ) else {
            return Err(corrupt(offset, "object stream without valid /N or /First"));
        };

        let data = stream.decoded()?.into_owned();
        let entries = parse_object_stream_header(&data, n, first)?;
        debug!("decoded object stream {id} with {} objects", entries.len());

        let stream = Arc::new(ObjectStream { data, entries });

        Ok(write(&self.object_streams)
            .entry(number)
            .or_insert(stream)
            .clone())
    }

    fn offset_of(&self, obj: &Object) -> usize {
        match obj.as_reference().and_then(|id| self.xref.get(id)) {
            Some(XRefEntry::InUse { offset, .. }) => offset,
            _ => 0,
        }
    }

    fn collect_pages(&self) -> Result<Vec<PageNode>> {
        let catalog = self.catalog()?;
        let root = catalog
            .as_dict()
            .and_then(|c| c.get(PAGES))
            .and_then(Object::as_reference)
            .ok_or_else(|| {
                Error::malformed(
                    self.trailer().get(ROOT).map(|r| self.offset_of(r)).unwrap_or(0),
                    "document catalog has no page tree",
                )
            })?;

        let mut pages = vec![];
        let mut visited = FxHashSet::default();

        self.walk_page_tree(
            root,
            &mut vec![],
            &PagesContext::default(),
            &mut visited,
            &mut pages,
        )?;
        debug!("found {} pages", pages.len());

        Ok(pages)
    }

    fn walk_page_tree(
        &self,
        id: ObjectId,
        ancestors: &mut Vec<ObjectId>,
        ctx: &PagesContext,
        visited: &mut FxHashSet<ObjectId>,
        pages: &mut Vec<PageNode>,
    ) -> Result<()> {
        if ancestors.contains(&id) || ancestors.len() >= MAX_PAGE_TREE_DEPTH {
            return Err(Error::ReferenceCycle { object: id });
        }

        if !visited.insert(id) {
            warn!("page tree node {id} is listed more than once, skipping the repetition");
            return Ok(());
        }

        let node = self.deref(&Object::Reference(id))?;

        let Some(dict) = node.as_dict() else {
            warn!("page tree node {id} is a {}, skipping it", node.kind());
            return Ok(());
        };

        // Be lenient with nodes that don't have a type.
        let is_intermediate =
            dict.has_type(PAGES) || (!dict.has_type(PAGE) && dict.contains_key(KIDS));

        if !is_intermediate {
            pages.push(self.page_node(id, dict, ancestors, ctx)?);

            return Ok(());
        }

        let ctx = ctx.descend(dict);
        let kids = match dict.get(KIDS) {
            Some(kids) => self.deref(kids)?,
            None => {
                warn!("page tree node {id} has no kids");
                return Ok(());
            }
        };

        ancestors.push(id);

        for kid in kids.as_array().unwrap_or_default() {
            match kid {
                Object::Reference(kid) => {
                    self.walk_page_tree(*kid, ancestors, &ctx, visited, pages)?;
                }
                other => warn!("skipping page tree entry that is a direct {}", other.kind()),
            }
        }

        ancestors.pop();

        Ok(())
    }

    fn page_node(
        &self,
        id: ObjectId,
        dict: &Dict,
        ancestors: &[ObjectId],
        ctx: &PagesContext,
    ) -> Result<PageNode> {
        let resolved = |key: &[u8]| -> Result<Option<Arc<Object>>> {
            dict.get(key)
                .or_else(|| ctx.inherited.get(key))
                .map(|obj| self.deref(obj))
                .transpose()
        };

        let media_box = resolved(MEDIA_BOX)?
            .and_then(|b| Rect::from_object(&b))
            .unwrap_or(Rect::LETTER);
        let crop_box = resolved(CROP_BOX)?
            .and_then(|b| Rect::from_object(&b))
            .unwrap_or(media_box);
        let rotation = match resolved(ROTATE)?.and_then(|r| r.as_i64()) {
            Some(r) if r % 90 == 0 => r.rem_euclid(360) as u16,
            Some(r) => {
                warn!("page {id} has invalid rotation {r}, ignoring it");
                0
            }
            None => 0,
        };
        let resources = resolved(RESOURCES)?
            .and_then(|r| r.as_dict().cloned())
            .unwrap_or_default();

        Ok(PageNode {
            id,
            dict: dict.clone(),
            ancestors: ancestors.iter().rev().copied().collect(),
            inherited: ctx.inherited.clone(),
            media_box,
            crop_box,
            rotation,
            resources,
        })
    }
}

impl LengthResolver for Document {
    fn resolve_length(&self, id: ObjectId) -> Option<i64> {
        if let Some(obj) = read(&self.objects).get(&id) {
            return obj.as_i64();
        }

        // This must not resolve objects through `Document::resolve`, since that could
        // end up parsing the very stream whose length is requested.
        match self.xref.get(id)? {
            XRefEntry::InUse { offset, .. } => Parser::new_at(&self.data, offset)
                .parse_indirect_object(&())
                .ok()
                .and_then(|(_, obj)| obj.as_i64()),
            XRefEntry::Compressed { stream, index } => {
                let stream = read(&self.object_streams).get(&stream).cloned()?;

                stream.get(index, id.number).ok()?.as_i64()
            }
            XRefEntry::Free { .. } => None,
        }
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
