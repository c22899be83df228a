//! The error type shared by all folio crates.

use crate::object::ObjectId;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for folio operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading or splitting a PDF file.
#[derive(Error, Debug)]
pub enum Error {
    /// The byte stream does not follow the PDF syntax, for example an unterminated
    /// string, array or dictionary.
    #[error("malformed syntax at byte {offset}: {reason}")]
    MalformedSyntax {
        /// The byte offset at which the problem was detected.
        offset: usize,
        /// What was wrong.
        reason: String,
    },

    /// The tokens are valid, but do not form the expected structure.
    #[error("unexpected token at byte {offset}: expected {expected}, found {found}")]
    UnexpectedToken {
        /// The byte offset of the offending token.
        offset: usize,
        /// What the parser expected.
        expected: &'static str,
        /// What it found instead.
        found: String,
    },

    /// No `startxref` marker or no trailer could be found.
    #[error("no trailer found")]
    MissingTrailer,

    /// The cross-reference data is unusable.
    #[error("corrupt cross-reference data at byte {offset}{}: {reason}", object_note(.object))]
    CorruptCrossReference {
        /// The byte offset of the section or the offending entry.
        offset: usize,
        /// The object whose entry is broken, if known.
        object: Option<ObjectId>,
        /// What was wrong.
        reason: String,
    },

    /// A chain of references or the page tree loops back onto itself.
    #[error("reference cycle detected at object {object}")]
    ReferenceCycle {
        /// The object at which the cycle was detected.
        object: ObjectId,
    },

    /// A page index past the end of the document was requested.
    #[error("page index {index} is out of range (document has {count} pages)")]
    PageIndexOutOfRange {
        /// The requested zero-based index.
        index: usize,
        /// The number of pages in the document.
        count: usize,
    },

    /// The document uses a feature that is not supported, like encryption.
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// Reading or writing a file failed.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        /// The path of the file or directory.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
}

fn object_note(object: &Option<ObjectId>) -> String {
    object
        .map(|id| format!(" (object {id})"))
        .unwrap_or_default()
}

impl Error {
    pub(crate) fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        Self::MalformedSyntax {
            offset,
            reason: reason.into(),
        }
    }

    pub(crate) fn unexpected(offset: usize, expected: &'static str, found: impl Into<String>) -> Self {
        Self::UnexpectedToken {
            offset,
            expected,
            found: found.into(),
        }
    }

    pub(crate) fn corrupt_xref(offset: usize, reason: impl Into<String>) -> Self {
        Self::CorruptCrossReference {
            offset,
            object: None,
            reason: reason.into(),
        }
    }

    /// Create an I/O error for the given path.
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Returns `true` for I/O failures.
    ///
    /// These are local to a single file and do not say anything about the validity of
    /// the source document.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_with_context() {
        let err = Error::CorruptCrossReference {
            offset: 1200,
            object: Some(ObjectId::new(7, 0)),
            reason: "offset points outside of the file".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "corrupt cross-reference data at byte 1200 (object 7 0): offset points outside of the file"
        );

        let err = Error::corrupt_xref(5, "bad");
        assert_eq!(err.to_string(), "corrupt cross-reference data at byte 5: bad");

        let err = Error::PageIndexOutOfRange { index: 4, count: 3 };
        assert_eq!(
            err.to_string(),
            "page index 4 is out of range (document has 3 pages)"
        );
    }

    #[test]
    fn io_classification() {
        let err = Error::io("out/Page_1.pdf", io::Error::new(io::ErrorKind::Other, "disk full"));

        assert!(err.is_io());
        assert!(!Error::MissingTrailer.is_io());
        assert_eq!(err.to_string(), "I/O error on out/Page_1.pdf: disk full");
    }
}
