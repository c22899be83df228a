/*!
A low-level crate for reading the object graph of PDF files.

This crate provides the building blocks for reading PDF files: a lexer and parser for the
object syntax, the cross-reference machinery (including xref streams, object streams and
incremental updates) and [`Document`], which lazily resolves objects and exposes the page
tree.

Encrypted documents can be opened, but the strings and streams inside of them are not
decrypted.

# Example
```no_run
use folio_syntax::Document;

let doc = Document::open("document.pdf").unwrap();

for page in doc.pages().unwrap() {
    let media_box = page.media_box();
    println!("{} x {}", media_box.width(), media_box.height());
}
```
*/

#![forbid(unsafe_code)]

pub mod document;
pub mod error;
pub mod filter;
pub mod lexer;
pub mod object;
pub mod parser;
pub(crate) mod reader;
pub(crate) mod trivia;
pub mod xref;

pub use document::{Document, PageNode, PdfVersion};
pub use error::{Error, Result};
pub use object::ObjectId;
