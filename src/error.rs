//! Error types for the sheetscan library.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for sheetscan operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while analyzing a workbook package.
///
/// Archive- and manifest-level variants abort the whole analysis. The
/// worksheet-level variants (`BrokenStringReference`, `WorksheetUnreadable`)
/// are raised inside a single sheet scan and are downgraded by the analyzer
/// into warnings or sentinel summaries.
#[derive(Error, Debug)]
pub enum Error {
    /// The input path does not exist.
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The input is not a readable ZIP container.
    #[error("Invalid archive: {0}")]
    InvalidArchive(String),

    /// A named entry is not present in the archive.
    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    /// The workbook manifest part is absent from the package.
    #[error("Missing workbook manifest: {0}")]
    MissingManifestEntry(String),

    /// An XML part could not be parsed, or lacks a required attribute.
    #[error("Malformed XML in {part}: {message}")]
    MalformedXml {
        /// Archive entry the error was found in
        part: String,
        /// Parser message
        message: String,
    },

    /// The manifest root namespace is not a recognized SpreadsheetML version.
    #[error("Unsupported schema namespace: {0}")]
    UnsupportedSchema(String),

    /// A cell references a shared string past the end of the table.
    #[error("Cell {cell} references shared string {index}, but the table has {len} entries")]
    BrokenStringReference {
        /// Cell coordinate in A1 form
        cell: String,
        /// Referenced index
        index: usize,
        /// Length of the shared string table
        len: usize,
    },

    /// One worksheet part is missing or corrupt.
    #[error("Worksheet '{sheet}' is unreadable: {reason}")]
    WorksheetUnreadable {
        /// Sheet name from the manifest
        sheet: String,
        /// What went wrong
        reason: String,
    },

    /// The caller cancelled the analysis or its deadline passed.
    #[error("Analysis cancelled")]
    Cancelled,

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error while serializing a report.
    #[error("Serialization error: {0}")]
    Serialize(String),
}

/// Fieldless classification of [`Error`], one per taxonomy entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidArchive,
    EntryNotFound,
    MissingManifestEntry,
    MalformedXml,
    UnsupportedSchema,
    BrokenStringReference,
    WorksheetUnreadable,
    Cancelled,
    Io,
    Serialize,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::InvalidArchive(_) => ErrorKind::InvalidArchive,
            Error::EntryNotFound(_) => ErrorKind::EntryNotFound,
            Error::MissingManifestEntry(_) => ErrorKind::MissingManifestEntry,
            Error::MalformedXml { .. } => ErrorKind::MalformedXml,
            Error::UnsupportedSchema(_) => ErrorKind::UnsupportedSchema,
            Error::BrokenStringReference { .. } => ErrorKind::BrokenStringReference,
            Error::WorksheetUnreadable { .. } => ErrorKind::WorksheetUnreadable,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Io(_) => ErrorKind::Io,
            Error::Serialize(_) => ErrorKind::Serialize,
        }
    }

    /// Whether this error aborts a whole analysis rather than one sheet.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self.kind(),
            ErrorKind::BrokenStringReference | ErrorKind::WorksheetUnreadable
        )
    }

    pub(crate) fn malformed(part: &str, message: impl ToString) -> Self {
        Error::MalformedXml {
            part: part.to_string(),
            message: message.to_string(),
        }
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => Error::Io(e),
            zip::result::ZipError::FileNotFound => {
                Error::EntryNotFound("requested entry".to_string())
            }
            other => Error::InvalidArchive(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialize(err.to_string())
    }
}
