use crate::SplitOptions;
use folio_syntax::{Document, Error, Result};
use log::{debug, info, warn};
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tempfile::NamedTempFile;

/// What happened to a single page of a split.
#[derive(Debug)]
pub enum PageOutcome {
    /// The page was written to the given file.
    Written(PathBuf),
    /// The page could not be extracted or written.
    Failed(Error),
    /// The page was not attempted because the split was cancelled.
    Cancelled,
}

impl PageOutcome {
    /// The path of the written file, if the page was written.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Written(path) => Some(path),
            _ => None,
        }
    }

    /// Whether the page was written.
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written(_))
    }
}

/// The result of splitting a document.
#[derive(Debug)]
pub struct SplitReport {
    /// The directory the pages were written to.
    pub output_dir: PathBuf,
    /// The outcome for each page, in page order.
    pub pages: Vec<PageOutcome>,
}

impl SplitReport {
    /// Whether every page was written.
    pub fn is_complete(&self) -> bool {
        self.pages.iter().all(PageOutcome::is_written)
    }

    /// The number of pages that were written.
    pub fn written(&self) -> usize {
        self.pages.iter().filter(|p| p.is_written()).count()
    }

    /// The failed pages, as zero-based index and error.
    pub fn failures(&self) -> impl Iterator<Item = (usize, &Error)> {
        self.pages.iter().enumerate().filter_map(|(i, p)| match p {
            PageOutcome::Failed(e) => Some((i, e)),
            _ => None,
        })
    }
}

/// The name of the file page `index` (zero-based) is written to.
pub fn page_file_name(index: usize) -> String {
    format!("Page_{}.pdf", index + 1)
}

/// The directory the pages of `path` are written to by default: a sibling of the file
/// named after its stem.
pub fn default_output_dir(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_else(|| "document".into());

    path.with_file_name(format!("{stem}_pages"))
}

/// Split the PDF file at `path` into one file per page.
///
/// Problems with the document as a whole (an unreadable file, a broken cross-reference
/// table or page tree, encryption) are returned as an error before the output directory
/// is created. Failures of single pages are reported in the [`SplitReport`] instead.
///
/// If a page fails for a reason other than I/O, or the input file disappears while
/// splitting, no further pages are started and the remaining ones are reported as
/// [`PageOutcome::Cancelled`]. Pages that were written before that point are kept.
pub fn split_file(path: impl AsRef<Path>, options: &SplitOptions) -> Result<SplitReport> {
    let path = path.as_ref();
    let doc = Document::open(path)?;
    let output_dir = options
        .output_dir
        .clone()
        .unwrap_or_else(|| default_output_dir(path));

    info!("splitting {} into {}", path.display(), output_dir.display());

    run(&doc, Some(path), &output_dir, options)
}

/// Split an already opened document, writing the pages to `output_dir`.
///
/// Behaves like [`split_file`], except that `options.output_dir` is ignored.
pub fn split_document(
    doc: &Document,
    output_dir: impl AsRef<Path>,
    options: &SplitOptions,
) -> Result<SplitReport> {
    run(doc, None, output_dir.as_ref(), options)
}

fn run(
    doc: &Document,
    source: Option<&Path>,
    output_dir: &Path,
    options: &SplitOptions,
) -> Result<SplitReport> {
    if doc.is_encrypted() {
        return Err(Error::UnsupportedFeature("encrypted documents".to_string()));
    }

    let count = doc.page_count()?;
    fs::create_dir_all(output_dir).map_err(|e| Error::io(output_dir, e))?;

    let cancelled = AtomicBool::new(false);
    let job = |index| split_page(doc, index, source, output_dir, options, &cancelled);

    let pages: Vec<PageOutcome> = match options.worker_count() {
        1 => (0..count).map(job).collect(),
        workers => match ThreadPoolBuilder::new().num_threads(workers).build() {
            Ok(pool) => {
                debug!("splitting {count} pages with {workers} workers");

                pool.install(|| (0..count).into_par_iter().map(job).collect())
            }
            Err(e) => {
                warn!("failed to start worker threads ({e}), splitting sequentially");

                (0..count).map(job).collect()
            }
        },
    };

    Ok(SplitReport {
        output_dir: output_dir.to_path_buf(),
        pages,
    })
}

fn split_page(
    doc: &Document,
    index: usize,
    source: Option<&Path>,
    output_dir: &Path,
    options: &SplitOptions,
    cancelled: &AtomicBool,
) -> PageOutcome {
    if cancelled.load(Ordering::Acquire) {
        return PageOutcome::Cancelled;
    }

    if let Some(source) = source.filter(|s| !s.exists()) {
        warn!("{} disappeared, cancelling", source.display());
        cancelled.store(true, Ordering::Release);

        return PageOutcome::Failed(Error::io(
            source,
            io::Error::new(io::ErrorKind::NotFound, "input file disappeared"),
        ));
    }

    match write_page(doc, index, output_dir, options) {
        Ok(path) => {
            debug!("wrote page {} to {}", index + 1, path.display());

            PageOutcome::Written(path)
        }
        Err(e) => {
            warn!("failed to split page {}: {e}", index + 1);

            if !e.is_io() {
                cancelled.store(true, Ordering::Release);
            }

            PageOutcome::Failed(e)
        }
    }
}

fn write_page(
    doc: &Document,
    index: usize,
    output_dir: &Path,
    options: &SplitOptions,
) -> Result<PathBuf> {
    let path = output_dir.join(page_file_name(index));

    if !options.overwrite && path.exists() {
        return Err(Error::io(
            &path,
            io::Error::new(io::ErrorKind::AlreadyExists, "page file already exists"),
        ));
    }

    let extracted = folio_write::extract(doc, index)?;
    let bytes = folio_write::write(&extracted);

    // The temporary file is removed again if anything below fails, so no partially
    // written page is ever visible under its final name.
    let mut file = NamedTempFile::new_in(output_dir).map_err(|e| Error::io(output_dir, e))?;
    file.write_all(&bytes)
        .and_then(|_| file.as_file().sync_all())
        .map_err(|e| Error::io(file.path(), e))?;

    let persisted = if options.overwrite {
        file.persist(&path)
    } else {
        file.persist_noclobber(&path)
    };
    persisted.map_err(|e| Error::io(&path, e.error))?;

    Ok(path)
}
