//! Shared, seekable byte source behind a parse

use std::cell::RefCell;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::rc::Rc;

use crate::error::{PDFError, PDFResult};

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Anything the parser can read from
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

/// Reference-counted handle kept by lazily loaded streams.
///
/// Each parse opens its own handle, so streams from an earlier parse keep
/// reading the file they were parsed from.
pub type SharedSource = Rc<RefCell<Source>>;

/// Buffered reader that tracks its absolute position
pub struct Source {
    reader: BufReader<Box<dyn ReadSeek>>,
    pos: u64,
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source").field("pos", &self.pos).finish()
    }
}

impl Source {
    /// Open a file on disk
    pub fn open(path: &Path) -> PDFResult<Self> {
        let file = File::open(path).map_err(|source| PDFError::UnableToOpenFile {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(Box::new(file)))
    }

    /// Wrap an in-memory document
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self::new(Box::new(Cursor::new(data)))
    }

    fn new(inner: Box<dyn ReadSeek>) -> Self {
        Self {
            reader: BufReader::with_capacity(READ_BUFFER_SIZE, inner),
            pos: 0,
        }
    }

    /// Wrap into the shared handle type
    pub fn into_shared(self) -> SharedSource {
        Rc::new(RefCell::new(self))
    }

    /// Current absolute position
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Read one byte, `None` at end of input
    pub fn read_byte(&mut self) -> PDFResult<Option<u8>> {
        let mut byte = [0u8];
        loop {
            match self.reader.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    self.pos += 1;
                    return Ok(Some(byte[0]));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(PDFError::io(self.pos, e)),
            }
        }
    }

    /// Fill as much of `buf` as possible, returning the byte count
    pub fn read_chunk(&mut self, buf: &mut [u8]) -> PDFResult<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(PDFError::io(self.pos, e)),
            }
        }
        self.pos += filled as u64;
        Ok(filled)
    }

    /// Move to an absolute position
    pub fn seek(&mut self, pos: u64) -> PDFResult<()> {
        let delta = pos as i64 - self.pos as i64;
        self.reader
            .seek_relative(delta)
            .map_err(|e| PDFError::io(self.pos, e))?;
        self.pos = pos;
        Ok(())
    }

    /// Step back by `count` bytes
    pub fn unread(&mut self, count: u64) -> PDFResult<()> {
        self.seek(self.pos.saturating_sub(count))
    }

    /// Read the byte range `[start, end)`; short reads are reported as such
    pub fn read_range(&mut self, start: u64, end: u64) -> PDFResult<Vec<u8>> {
        let mut data = vec![0u8; end.saturating_sub(start) as usize];
        self.seek(start)?;
        let read = self.read_chunk(&mut data)?;
        data.truncate(read);
        Ok(data)
    }

    /// Copy the whole source into `output`, leaving the position at its end
    pub fn copy_to<W: Write>(&mut self, output: &mut W) -> PDFResult<u64> {
        self.reader
            .seek(SeekFrom::Start(0))
            .map_err(|e| PDFError::io(self.pos, e))?;
        self.pos = 0;
        let copied = io::copy(&mut self.reader, output).map_err(|e| PDFError::io(0, e))?;
        self.pos = copied;
        Ok(copied)
    }
}
