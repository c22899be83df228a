/*!
Turning single pages of a PDF document into standalone documents.

[`extract`] copies a page and the transitive closure of the objects it references
into an [`ExtractedDocument`] with fresh, sequential object numbers, and [`write`]
serializes it.

```no_run
use folio_syntax::Document;

let doc = Document::open("input.pdf").unwrap();
let page = folio_write::extract(&doc, 0).unwrap();
std::fs::write("first_page.pdf", folio_write::write(&page)).unwrap();
```
*/

#![forbid(unsafe_code)]

pub mod extract;
mod primitive;
pub mod serialize;

pub use extract::{ExtractedDocument, extract};
pub use serialize::write;
