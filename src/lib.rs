//! PDF Skeleton Library for Rust
//!
//! Low-level access to the physical structure of PDF files: indirect objects,
//! cross-reference tables, trailers and stream payloads. Documents can be
//! parsed, edited at the object level and written back either as a full
//! rewrite or as an incremental update appended to the original bytes.
//!
//! Stream filters, encryption and object streams are not interpreted; stream
//! payloads are exposed as raw bytes.

mod error;
pub mod pdf;

use std::fmt;
use std::path::Path;

pub use error::{ErrorKind, PDFError, PDFResult};
pub use pdf::{DataType, Dictionary, Object, ObjectId, PDFParser, Stream, XRefTable, XRefValue};

/// Outcome of a [`rewrite`] call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteSummary {
    /// Header version of the input
    pub version: (u8, u8),
    /// Number of objects written or carried over
    pub objects: usize,
    /// Cross-reference entries found in the input
    pub xref_entries: usize,
    /// Whether the output was an incremental update
    pub update: bool,
}

impl fmt::Display for RewriteSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PDF {}.{}: {} objects, {} xref entries ({})",
            self.version.0,
            self.version.1,
            self.objects,
            self.xref_entries,
            if self.update { "incremental update" } else { "full rewrite" }
        )
    }
}

/// Parse `input` and write it to `output`
pub fn rewrite<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    update: bool,
) -> PDFResult<RewriteSummary> {
    let mut parser = PDFParser::new();
    parser.parse(input)?;
    parser.write(output, update)?;

    Ok(RewriteSummary {
        version: parser.version(),
        objects: parser.objects().len(),
        xref_entries: parser.xref_table().len(),
        update,
    })
}
