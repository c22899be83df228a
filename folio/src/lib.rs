/*!
Split PDF files into standalone single-page documents.

Each page of the input is written to `Page_<n>.pdf` in an output directory, together
with every object it depends on (fonts, images, annotations and so on), and nothing
else. Pages are processed in parallel.

```no_run
use folio::{SplitOptions, split_file};

let report = split_file("report.pdf", &SplitOptions::default()).unwrap();
println!("wrote {} pages to {}", report.written(), report.output_dir.display());
```

The lower layers are available as [`folio_syntax`], for reading the object graph of a
document, and [`folio_write`], for extracting and serializing single pages.
*/

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod options;
mod split;

pub use folio_syntax;
pub use folio_syntax::{Document, Error, PageNode, PdfVersion, Result};
pub use folio_write;
pub use options::SplitOptions;
pub use split::{
    PageOutcome, SplitReport, default_output_dir, page_file_name, split_document, split_file,
};
