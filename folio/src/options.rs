use std::num::NonZeroUsize;
use std::path::PathBuf;

/// Options for splitting a document.
#[derive(Debug, Clone)]
pub struct SplitOptions {
    /// The directory the pages are written to.
    ///
    /// Defaults to a sibling of the input file named `<file stem>_pages`.
    pub output_dir: Option<PathBuf>,

    /// The number of pages processed in parallel. `None` uses one worker per available
    /// core, `Some(1)` processes the pages on the calling thread.
    pub workers: Option<usize>,

    /// Whether existing page files are replaced. If not, writing a page whose file
    /// already exists fails for that page.
    pub overwrite: bool,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            output_dir: None,
            workers: None,
            overwrite: true,
        }
    }
}

impl SplitOptions {
    /// Create new split options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the output directory.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Set the number of workers.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Process all pages on the calling thread.
    pub fn sequential(self) -> Self {
        self.with_workers(1)
    }

    /// Set whether existing page files are replaced.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub(crate) fn worker_count(&self) -> usize {
        match self.workers {
            Some(n) if n > 0 => n,
            _ => std::thread::available_parallelism().map_or(1, NonZeroUsize::get),
        }
    }
}
