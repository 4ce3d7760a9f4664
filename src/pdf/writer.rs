//! Full rewrite and incremental update output

use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use log::{debug, trace, warn};
use tempfile::NamedTempFile;

use crate::error::{PDFError, PDFResult};
use super::{DataType, Object, PDFParser};

/// Binary marker written on the second header line
const BINARY_MARKER: [u8; 4] = [0xe2, 0xe3, 0xcf, 0xd3];
const XREF_HEAD_ENTRY: &str = "0000000000 65535 f\r\n";

/// Output sink that knows how many bytes went through it
struct CountingWriter<W: Write> {
    inner: W,
    position: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W, position: u64) -> Self {
        Self { inner, position }
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn put(&mut self, bytes: &[u8]) -> PDFResult<()> {
        self.inner
            .write_all(bytes)
            .map_err(|e| PDFError::io(self.position, e))?;
        self.position += bytes.len() as u64;
        Ok(())
    }

    fn flush(&mut self) -> PDFResult<()> {
        self.inner.flush().map_err(|e| PDFError::io(self.position, e))
    }
}

/// Offsets are written as PDF integers
fn offset_value(offset: u64) -> PDFResult<DataType> {
    i32::try_from(offset)
        .map(DataType::integer)
        .map_err(|_| PDFError::NotImplemented {
            offset,
            feature: "Offsets beyond 2 GiB".to_string(),
        })
}

fn xref_entry(object: &Object, offset: u64, used: bool) -> String {
    format!(
        "{} 1\n{:010} {:05} {}\r\n",
        object.object_id(),
        offset,
        object.generation_number(),
        if used { 'n' } else { 'f' }
    )
}

/// `/Size` value: one past the highest object number
fn size_value(objects: &[Object]) -> PDFResult<DataType> {
    let Some(highest) = objects.iter().max_by_key(|o| o.object_id()) else {
        return Ok(DataType::integer(1));
    };
    i32::try_from(highest.object_id())
        .ok()
        .and_then(|id| id.checked_add(1))
        .map(DataType::integer)
        .ok_or_else(|| {
            PDFError::invalid_object(
                highest.offset(),
                format!("Object number {} too large for /Size", highest.object_id()),
            )
        })
}

/// Write `trailer`, `startxref` and `%%EOF`
fn write_trailer<W: Write>(
    out: &mut CountingWriter<W>,
    trailer: &Object,
    xref_position: u64,
) -> PDFResult<()> {
    let mut buffer = b"trailer\n".to_vec();
    trailer.dictionary().write_to(&mut buffer)?;
    buffer.extend_from_slice(format!("startxref\n{}\n%%EOF", xref_position).as_bytes());
    out.put(&buffer)
}

impl PDFParser {
    /// Write the document to `path`, as a full rewrite or as an incremental update
    pub fn write<P: AsRef<Path>>(&mut self, path: P, update: bool) -> PDFResult<()> {
        if update {
            self.write_update(path)
        } else {
            self.write_full(path)
        }
    }

    /// Rewrite every object into a new file.
    ///
    /// Output goes to a temporary file next to `path` that replaces it once
    /// complete.
    pub fn write_full<P: AsRef<Path>>(&mut self, path: P) -> PDFResult<()> {
        let path = path.as_ref();
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        debug!("Writing full PDF to {}", path.display());

        let unable_to_open = |source: io::Error| PDFError::UnableToOpenFile {
            path: path.to_path_buf(),
            source,
        };
        let mut temp = NamedTempFile::new_in(directory).map_err(unable_to_open)?;
        {
            let mut output = BufWriter::new(temp.as_file_mut());
            self.write_full_to(&mut output)?;
            output.flush().map_err(|e| PDFError::io(0, e))?;
        }
        temp.persist(path).map_err(|e| unable_to_open(e.error))?;
        Ok(())
    }

    /// Full rewrite into any sink
    pub fn write_full_to<W: Write>(&mut self, output: W) -> PDFResult<()> {
        let size = size_value(&self.objects)?;
        let mut out = CountingWriter::new(output, 0);

        out.put(format!("%PDF-{}.{}\r%", self.version_major, self.version_minor).as_bytes())?;
        out.put(&BINARY_MARKER)?;
        out.put(b"\r\n")?;

        let mut xref = format!("xref\n0 1\n{}", XREF_HEAD_ENTRY);
        let mut xref_stream_offset: Option<u64> = None;

        for object in self.objects.iter_mut() {
            let offset = out.position();

            if object.is_xref_stream() {
                // Keep the chain of xref streams pointing at the rewritten offsets
                if let Some(previous) = xref_stream_offset {
                    if object.has_key("Prev") {
                        object.dictionary_mut().reset("Prev", offset_value(previous)?);
                    }
                }
                xref_stream_offset = Some(offset);
            }

            trace!("Writing object {} at offset {}", object.id(), offset);
            out.put(&object.to_bytes()?)?;
            xref.push_str(&xref_entry(object, offset, object.used()));
        }

        let xref_position = out.position();
        out.put(xref.as_bytes())?;

        let trailer = self.trailer.dictionary_mut();
        trailer.remove("Prev");
        trailer.reset("Size", size);
        trailer.remove("XRefStm");
        if let Some(offset) = xref_stream_offset {
            trailer.insert("XRefStm", offset_value(offset)?);
        }

        write_trailer(&mut out, &self.trailer, xref_position)?;
        out.flush()?;

        debug!(
            "Wrote {} objects, {} bytes",
            self.objects.len(),
            out.position()
        );
        Ok(())
    }

    /// Append new and updated objects to `path`.
    ///
    /// A missing target starts as a copy of the parsed file. Nothing is
    /// appended when no object is new.
    pub fn write_update<P: AsRef<Path>>(&mut self, path: P) -> PDFResult<()> {
        let path = path.as_ref();
        debug!("Writing incremental update to {}", path.display());

        let unable_to_open = |source: io::Error| PDFError::UnableToOpenFile {
            path: path.to_path_buf(),
            source,
        };
        let exists = path.exists();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(unable_to_open)?;

        let base_offset = if exists {
            fs::metadata(path).map_err(unable_to_open)?.len()
        } else {
            match &self.source {
                Some(source) => source.borrow_mut().copy_to(&mut file)?,
                None => {
                    warn!("No parsed file to copy into {}", path.display());
                    0
                }
            }
        };

        let mut section = Vec::new();
        if self.write_update_to(&mut section, base_offset)? {
            file.write_all(&section)
                .map_err(|e| PDFError::io(base_offset, e))?;
            file.flush().map_err(|e| PDFError::io(base_offset, e))?;
        }
        Ok(())
    }

    /// Write the update section into `output`, which will land at
    /// `base_offset` of the final file. Returns false when there is nothing
    /// to write.
    pub fn write_update_to<W: Write>(&mut self, output: W, base_offset: u64) -> PDFResult<bool> {
        let new_objects = self.objects.iter().filter(|o| o.is_new()).count();
        if new_objects == 0 {
            debug!("No new object, nothing to append");
            return Ok(false);
        }

        let size = size_value(&self.objects)?;
        let mut out = CountingWriter::new(output, base_offset);
        out.put(b"\r")?;

        let mut xref = String::from("xref\n");
        for object in self.objects.iter().filter(|o| o.is_new()) {
            let offset = out.position();
            trace!("Writing object {} at offset {}", object.id(), offset);
            out.put(&object.to_bytes()?)?;
            xref.push_str(&xref_entry(object, offset, true));
        }

        let xref_position = out.position();
        out.put(xref.as_bytes())?;

        let previous_xref = self.xref_offset;
        let trailer = self.trailer.dictionary_mut();
        trailer.remove("Prev");
        if let Some(previous) = previous_xref {
            trailer.insert("Prev", offset_value(previous)?);
        }
        trailer.reset("Size", size);

        write_trailer(&mut out, &self.trailer, xref_position)?;
        out.flush()?;

        debug!("Appended {} objects", new_objects);
        Ok(true)
    }
}
