//! PDF stream object implementation

use std::cell::OnceCell;
use std::rc::Rc;

use log::trace;

use crate::error::{PDFError, PDFResult};
use super::source::SharedSource;
use super::{DataType, Dictionary};

/// PDF stream payload.
///
/// A parsed stream only records its byte range; the bytes are read through
/// the shared source on first access. The stream dictionary lives in the
/// owning object, so anything that changes the payload takes that
/// dictionary by reference to keep `/Length` in sync.
#[derive(Clone)]
pub struct Stream {
    start_offset: u64,
    end_offset: u64,
    source: Option<SharedSource>,
    data: OnceCell<Vec<u8>>,
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("start_offset", &self.start_offset)
            .field("end_offset", &self.end_offset)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl PartialEq for Stream {
    fn eq(&self, other: &Self) -> bool {
        match (self.data.get(), other.data.get()) {
            (Some(a), Some(b)) => a == b,
            (None, None) => {
                self.start_offset == other.start_offset
                    && self.end_offset == other.end_offset
                    && match (&self.source, &other.source) {
                        (Some(a), Some(b)) => Rc::ptr_eq(a, b),
                        (None, None) => true,
                        _ => false,
                    }
            }
            _ => false,
        }
    }
}

/// `/Length` is written as a PDF integer
fn length_value(length: usize, offset: u64) -> PDFResult<DataType> {
    i32::try_from(length)
        .map(DataType::integer)
        .map_err(|_| PDFError::NotImplemented {
            offset,
            feature: format!("Stream payload of {} bytes", length),
        })
}

impl Stream {
    /// Stream over `[start_offset, end_offset)` of `source`, loaded lazily
    pub fn from_source(source: SharedSource, start_offset: u64, end_offset: u64) -> Self {
        Self {
            start_offset,
            end_offset,
            source: Some(source),
            data: OnceCell::new(),
        }
    }

    /// Stream holding its payload in memory
    pub fn from_data(data: Vec<u8>) -> Self {
        let end_offset = data.len() as u64;
        Self {
            start_offset: 0,
            end_offset,
            source: None,
            data: OnceCell::from(data),
        }
    }

    /// Offset of the first payload byte in the source file
    pub fn start_offset(&self) -> u64 {
        self.start_offset
    }

    /// Offset just past the last payload byte in the source file
    pub fn end_offset(&self) -> u64 {
        self.end_offset
    }

    /// Whether the payload is already in memory
    pub fn is_loaded(&self) -> bool {
        self.data.get().is_some()
    }

    /// Payload length, without forcing a load
    pub fn data_length(&self) -> usize {
        match self.data.get() {
            Some(data) => data.len(),
            None => (self.end_offset - self.start_offset) as usize,
        }
    }

    /// Get stream payload, reading it from the source on first access
    pub fn data(&self) -> PDFResult<&[u8]> {
        if let Some(data) = self.data.get() {
            return Ok(data);
        }

        let source = self.source.as_ref().ok_or_else(|| {
            PDFError::invalid_stream(
                self.start_offset,
                "Accessing data, but no reader supplied",
            )
        })?;

        trace!(
            "Loading stream data [{}, {})",
            self.start_offset,
            self.end_offset
        );
        let data = source
            .borrow_mut()
            .read_range(self.start_offset, self.end_offset)?;
        let expected = self.end_offset - self.start_offset;
        if data.len() as u64 != expected {
            return Err(PDFError::invalid_stream(
                self.start_offset,
                format!("Not enough data to read ({} of {})", data.len(), expected),
            ));
        }

        Ok(self.data.get_or_init(|| data))
    }

    /// Replace payload and reset `/Length` in the owning dictionary
    pub fn set_data(&mut self, data: Vec<u8>, dictionary: &mut Dictionary) -> PDFResult<()> {
        dictionary.reset("Length", length_value(data.len(), self.start_offset)?);
        self.data = OnceCell::from(data);
        Ok(())
    }

    /// Write stream to output
    pub fn write_to(&self, output: &mut Vec<u8>) -> PDFResult<()> {
        output.extend_from_slice(b"stream\n");
        output.extend_from_slice(self.data()?);
        output.extend_from_slice(b"\nendstream\n");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::source::Source;
    use pretty_assertions::assert_eq;
    use test_log::test;

    #[test]
    fn test_lazy_load() -> PDFResult<()> {
        let source = Source::from_bytes(b"xxHello Worldyy".to_vec()).into_shared();
        let stream = Stream::from_source(source, 2, 13);

        assert!(!stream.is_loaded());
        assert_eq!(stream.data_length(), 11);
        assert_eq!(stream.data()?, b"Hello World");
        assert!(stream.is_loaded());
        Ok(())
    }

    #[test]
    fn test_short_source() {
        let source = Source::from_bytes(b"abc".to_vec()).into_shared();
        let stream = Stream::from_source(source, 1, 10);
        assert!(matches!(stream.data(), Err(PDFError::InvalidStream { .. })));
    }

    #[test]
    fn test_stream_update() -> PDFResult<()> {
        let mut dict = Dictionary::new();
        dict.insert("Length", DataType::integer(13));
        dict.insert("Filter", DataType::name("FlateDecode"));

        let mut stream = Stream::from_data(b"Original data".to_vec());
        stream.set_data(b"Updated".to_vec(), &mut dict)?;

        assert_eq!(stream.data()?, b"Updated");
        assert_eq!(dict.get_integer("Length"), Some(7));
        Ok(())
    }

    #[test]
    fn test_length_beyond_pdf_integer() -> PDFResult<()> {
        assert_eq!(length_value(i32::MAX as usize, 0)?, DataType::integer(i32::MAX));

        let err = length_value(i32::MAX as usize + 1, 42).unwrap_err();
        assert!(matches!(err, PDFError::NotImplemented { offset: 42, .. }));
        Ok(())
    }

    #[test]
    fn test_write() -> PDFResult<()> {
        let stream = Stream::from_data(b"BT ET".to_vec());
        let mut out = Vec::new();
        stream.write_to(&mut out)?;
        assert_eq!(out, b"stream\nBT ET\nendstream\n".to_vec());
        Ok(())
    }

    #[test]
    fn test_clone_shares_source() -> PDFResult<()> {
        let source = Source::from_bytes(b"0123456789".to_vec()).into_shared();
        let stream = Stream::from_source(source, 3, 6);
        let copy = stream.clone();
        assert_eq!(copy.data()?, b"345");
        assert!(!stream.is_loaded());
        Ok(())
    }
}
