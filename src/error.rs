//! Error types for the PDF structure library

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for parsing and writing operations.
///
/// Every syntax variant records the byte offset at which the problem was
/// detected. None of them are retried internally.
#[derive(Error, Debug)]
pub enum PDFError {
    /// The file could not be opened for reading or writing
    #[error("Unable to open {path}: {source}")]
    UnableToOpenFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// End of input reached in the middle of a construct
    #[error("Unexpected end of file at offset {offset}")]
    TruncatedFile { offset: u64 },

    /// Missing or malformed `%PDF-M.m` header
    #[error("Invalid PDF header at offset {offset}: {message}")]
    InvalidHeader { offset: u64, message: String },

    /// Unparseable top-level line
    #[error("Invalid line at offset {offset}")]
    InvalidLine { offset: u64 },

    /// Dictionary key that is a structural delimiter
    #[error("Invalid dictionary at offset {offset}: {message}")]
    InvalidDictionary { offset: u64, message: String },

    /// Name that does not start with `/`
    #[error("Invalid name {name:?} at offset {offset}")]
    InvalidName { offset: u64, name: String },

    /// Keyword that looks like a boolean but is not one
    #[error("Invalid boolean {token:?} at offset {offset}")]
    InvalidBoolean { offset: u64, token: String },

    /// Numeric token that cannot be converted
    #[error("Invalid number {token:?} at offset {offset}")]
    InvalidNumber { offset: u64, token: String },

    /// Stream without resolvable length or data
    #[error("Invalid stream at offset {offset}: {message}")]
    InvalidStream { offset: u64, message: String },

    /// Token that starts no known construct
    #[error("Invalid token {token:?} at offset {offset}")]
    InvalidToken { offset: u64, token: String },

    /// Malformed `id gen obj` header or body
    #[error("Invalid object at offset {offset}: {message}")]
    InvalidObject { offset: u64, message: String },

    /// Malformed trailer, `startxref` or `%%EOF`
    #[error("Invalid trailer at offset {offset}: {message}")]
    InvalidTrailer { offset: u64, message: String },

    /// Hexadecimal string with an odd digit count or a non-hex digit
    #[error("Invalid hexa string at offset {offset}")]
    InvalidHexastring { offset: u64 },

    /// Syntax this library deliberately does not handle
    #[error("Not implemented at offset {offset}: {feature}")]
    NotImplemented { offset: u64, feature: String },

    /// Read or write failure on an already opened file
    #[error("IO error at offset {offset}: {source}")]
    IoError {
        offset: u64,
        #[source]
        source: io::Error,
    },
}

/// Result type for parsing and writing operations
pub type PDFResult<T> = Result<T, PDFError>;

/// Kind of a [`PDFError`], without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnableToOpenFile,
    TruncatedFile,
    InvalidHeader,
    InvalidLine,
    InvalidDictionary,
    InvalidName,
    InvalidBoolean,
    InvalidNumber,
    InvalidStream,
    InvalidToken,
    InvalidObject,
    InvalidTrailer,
    InvalidHexastring,
    NotImplemented,
    IoError,
}

impl ErrorKind {
    /// Stable numeric code, usable as a process exit status.
    /// Code 5 (footer errors) is retired and never produced.
    pub fn code(self) -> i32 {
        match self {
            ErrorKind::UnableToOpenFile => 1,
            ErrorKind::TruncatedFile => 2,
            ErrorKind::InvalidHeader => 3,
            ErrorKind::InvalidLine => 4,
            ErrorKind::InvalidDictionary => 6,
            ErrorKind::InvalidName => 7,
            ErrorKind::InvalidBoolean => 8,
            ErrorKind::InvalidNumber => 9,
            ErrorKind::InvalidStream => 10,
            ErrorKind::InvalidToken => 11,
            ErrorKind::InvalidObject => 12,
            ErrorKind::InvalidTrailer => 13,
            ErrorKind::InvalidHexastring => 14,
            ErrorKind::NotImplemented => 15,
            ErrorKind::IoError => 16,
        }
    }
}

impl PDFError {
    /// Create an IO error raised at `offset`
    pub fn io(offset: u64, source: io::Error) -> Self {
        Self::IoError { offset, source }
    }

    /// Create an invalid object error
    pub fn invalid_object(offset: u64, msg: impl Into<String>) -> Self {
        Self::InvalidObject {
            offset,
            message: msg.into(),
        }
    }

    /// Create an invalid trailer error
    pub fn invalid_trailer(offset: u64, msg: impl Into<String>) -> Self {
        Self::InvalidTrailer {
            offset,
            message: msg.into(),
        }
    }

    /// Create an invalid stream error
    pub fn invalid_stream(offset: u64, msg: impl Into<String>) -> Self {
        Self::InvalidStream {
            offset,
            message: msg.into(),
        }
    }

    /// Create an invalid number error from the offending token
    pub fn invalid_number(offset: u64, token: &[u8]) -> Self {
        Self::InvalidNumber {
            offset,
            token: String::from_utf8_lossy(token).into_owned(),
        }
    }

    /// Kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnableToOpenFile { .. } => ErrorKind::UnableToOpenFile,
            Self::TruncatedFile { .. } => ErrorKind::TruncatedFile,
            Self::InvalidHeader { .. } => ErrorKind::InvalidHeader,
            Self::InvalidLine { .. } => ErrorKind::InvalidLine,
            Self::InvalidDictionary { .. } => ErrorKind::InvalidDictionary,
            Self::InvalidName { .. } => ErrorKind::InvalidName,
            Self::InvalidBoolean { .. } => ErrorKind::InvalidBoolean,
            Self::InvalidNumber { .. } => ErrorKind::InvalidNumber,
            Self::InvalidStream { .. } => ErrorKind::InvalidStream,
            Self::InvalidToken { .. } => ErrorKind::InvalidToken,
            Self::InvalidObject { .. } => ErrorKind::InvalidObject,
            Self::InvalidTrailer { .. } => ErrorKind::InvalidTrailer,
            Self::InvalidHexastring { .. } => ErrorKind::InvalidHexastring,
            Self::NotImplemented { .. } => ErrorKind::NotImplemented,
            Self::IoError { .. } => ErrorKind::IoError,
        }
    }

    /// Byte offset at which the error was detected, if it has one
    pub fn offset(&self) -> Option<u64> {
        match self {
            Self::UnableToOpenFile { .. } => None,
            Self::TruncatedFile { offset }
            | Self::InvalidHeader { offset, .. }
            | Self::InvalidLine { offset }
            | Self::InvalidDictionary { offset, .. }
            | Self::InvalidName { offset, .. }
            | Self::InvalidBoolean { offset, .. }
            | Self::InvalidNumber { offset, .. }
            | Self::InvalidStream { offset, .. }
            | Self::InvalidToken { offset, .. }
            | Self::InvalidObject { offset, .. }
            | Self::InvalidTrailer { offset, .. }
            | Self::InvalidHexastring { offset }
            | Self::NotImplemented { offset, .. }
            | Self::IoError { offset, .. } => Some(*offset),
        }
    }

    /// Check if error comes from malformed PDF syntax
    pub fn is_syntax_error(&self) -> bool {
        !self.is_io_error()
    }

    /// Check if error comes from the file system
    pub fn is_io_error(&self) -> bool {
        matches!(self, Self::UnableToOpenFile { .. } | Self::IoError { .. })
    }
}
