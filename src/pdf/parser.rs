//! PDF document parser implementation

use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use log::{debug, trace, warn};
use memchr::memmem;

use crate::error::{PDFError, PDFResult};
use super::source::{SharedSource, Source};
use super::tokenizer::Tokenizer;
use super::{DataType, Dictionary, Object, ObjectId, Stream, XRefTable, XRefValue};

const PDF_MAGIC: &[u8] = b"%PDF-";
const PDF_EOF_MARKER: &[u8] = b"%%EOF";
const ENDSTREAM_MARKER: &[u8] = b"endstream";
/// Chunk size used when searching for `endstream`
const SCAN_CHUNK_SIZE: usize = 4 * 1024;
/// Bytes kept between chunks so a marker split across two reads is still found
const SCAN_OVERLAP: usize = 16;
/// Trailer keys inherited from an xref stream object when missing
const REPAIRED_TRAILER_KEYS: [&str; 4] = ["Root", "Info", "Encrypt", "ID"];

/// PDF document parser.
///
/// Holds the parsed objects, the cross-reference table and the trailer.
/// Objects can be looked up, changed, added or removed and the result is
/// written back with [`PDFParser::write`].
#[derive(Debug)]
pub struct PDFParser {
    pub(crate) version_major: u8,
    pub(crate) version_minor: u8,
    pub(crate) objects: Vec<Object>,
    pub(crate) trailer: Object,
    pub(crate) xref_object: Option<ObjectId>,
    pub(crate) xref_table: XRefTable,
    pub(crate) xref_offset: Option<u64>,
    pub(crate) source: Option<SharedSource>,
}

impl Default for PDFParser {
    fn default() -> Self {
        Self::new()
    }
}

impl PDFParser {
    /// Create new parser instance writing PDF 1.6 headers until a file is parsed
    pub fn new() -> Self {
        Self::with_version(1, 6)
    }

    /// Create new parser with the header version used for new files
    pub fn with_version(version_major: u8, version_minor: u8) -> Self {
        Self {
            version_major,
            version_minor,
            objects: Vec::new(),
            trailer: Object::parsed(0, 0, 0),
            xref_object: None,
            xref_table: XRefTable::new(),
            xref_offset: None,
            source: None,
        }
    }

    /// Parse a file
    pub fn parse<P: AsRef<Path>>(&mut self, path: P) -> PDFResult<()> {
        let path = path.as_ref();
        debug!("Parsing {}", path.display());
        let source = Source::open(path)?;
        self.parse_source(source)
    }

    /// Parse an in-memory document
    pub fn parse_bytes(&mut self, data: Vec<u8>) -> PDFResult<()> {
        debug!("Parsing {} bytes from memory", data.len());
        self.parse_source(Source::from_bytes(data))
    }

    fn parse_source(&mut self, source: Source) -> PDFResult<()> {
        self.objects.clear();
        self.trailer = Object::parsed(0, 0, 0);
        self.xref_object = None;
        self.xref_table.clear();
        self.xref_offset = None;

        let handle = source.into_shared();
        self.source = Some(Rc::clone(&handle));
        {
            let mut guard = handle.borrow_mut();
            let mut reader = Reader {
                tokenizer: Tokenizer::new(&mut guard),
                handle: Rc::clone(&handle),
                parser: self,
            };
            reader.parse_header()?;
            reader.parse_body()?;
        }

        self.link_xref_table();
        self.repair_trailer();

        debug!(
            "Parsed PDF {}.{}: {} objects, {} xref entries",
            self.version_major,
            self.version_minor,
            self.objects.len(),
            self.xref_table.len()
        );
        Ok(())
    }

    /// Synchronize xref table with parsed objects
    fn link_xref_table(&mut self) {
        let mut index: HashMap<ObjectId, usize> = HashMap::new();
        for (i, object) in self.objects.iter().enumerate() {
            index.entry(object.id()).or_insert(i);
        }

        for entry in self.xref_table.entries_mut() {
            match index.get(&entry.id()) {
                Some(&i) => {
                    let object = &mut self.objects[i];
                    entry.set_object(Some(object.id()));
                    object.set_used(entry.used());
                }
                None => entry.set_object(None),
            }
        }
    }

    /// Fill mandatory trailer values from the last xref stream object
    fn repair_trailer(&mut self) {
        let Some(xref_id) = self.xref_object else {
            return;
        };
        let Some(xref_object) = self.objects.iter().find(|o| o.id() == xref_id) else {
            return;
        };

        for key in REPAIRED_TRAILER_KEYS {
            if self.trailer.has_key(key) {
                continue;
            }
            if let Some(value) = xref_object.get(key) {
                trace!("Repairing trailer /{} from object {}", key, xref_id);
                self.trailer.insert(key, value.clone());
            }
        }
    }

    /// Header version as (major, minor)
    pub fn version(&self) -> (u8, u8) {
        (self.version_major, self.version_minor)
    }

    /// Get parsed or added objects, in file order
    pub fn objects(&self) -> &[Object] {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut [Object] {
        &mut self.objects
    }

    /// Add an object
    pub fn add_object(&mut self, object: Object) {
        self.objects.push(object);
    }

    /// Remove an object from the list and from the xref table
    pub fn remove_object(&mut self, id: ObjectId) -> Option<Object> {
        let position = self.objects.iter().position(|o| o.id() == id)?;
        self.xref_table.remove(id);
        if self.xref_object == Some(id) {
            self.xref_object = None;
        }
        Some(self.objects.remove(position))
    }

    /// Return a specific object
    pub fn get_object(&self, object_id: u32, generation_number: u16) -> Option<&Object> {
        let id = ObjectId::new(object_id, generation_number);
        self.objects.iter().find(|o| o.id() == id)
    }

    pub fn get_object_mut(&mut self, object_id: u32, generation_number: u16) -> Option<&mut Object> {
        let id = ObjectId::new(object_id, generation_number);
        self.objects.iter_mut().find(|o| o.id() == id)
    }

    /// Next free object number, one past the highest in use
    pub fn next_object_id(&self) -> PDFResult<u32> {
        let Some(highest) = self.objects.iter().max_by_key(|o| o.object_id()) else {
            return Ok(1);
        };
        highest
            .object_id()
            .checked_add(1)
            .ok_or_else(|| PDFError::invalid_object(highest.offset(), "No object number left"))
    }

    /// Return trailer object
    pub fn trailer(&self) -> &Object {
        &self.trailer
    }

    pub fn trailer_mut(&mut self) -> &mut Object {
        &mut self.trailer
    }

    /// Return the xref table as read during the last parse.
    /// It is not used for write operations
    pub fn xref_table(&self) -> &XRefTable {
        &self.xref_table
    }

    /// Last object seen with `/Type /XRef`
    pub fn xref_object(&self) -> Option<&Object> {
        let id = self.xref_object?;
        self.objects.iter().find(|o| o.id() == id)
    }

    /// Offset of the last cross-reference section, `/Prev` of the next update
    pub fn xref_offset(&self) -> Option<u64> {
        self.xref_offset
    }
}

/// One pass over a source, filling the parser
struct Reader<'a> {
    tokenizer: Tokenizer<'a>,
    handle: SharedSource,
    parser: &'a mut PDFParser,
}

fn starts_with_nonzero_digit(token: &[u8]) -> bool {
    matches!(token.first(), Some(b'1'..=b'9'))
}

fn is_structural(token: &[u8]) -> bool {
    matches!(token, b"<<" | b">>" | b"[" | b"]" | b"(" | b")" | b"<" | b">")
}

fn lossy(token: &[u8]) -> String {
    String::from_utf8_lossy(token).into_owned()
}

impl<'a> Reader<'a> {
    fn offset(&self) -> u64 {
        self.tokenizer.token_offset()
    }

    fn parse_header(&mut self) -> PDFResult<()> {
        trace!("Parsing header");
        let invalid = |offset: u64, message: &str| PDFError::InvalidHeader {
            offset,
            message: message.to_string(),
        };

        // Leading empty lines are tolerated
        let mut magic = Vec::with_capacity(PDF_MAGIC.len());
        while magic.len() < PDF_MAGIC.len() {
            match self.tokenizer.read_raw_byte()? {
                Some(b'\r' | b'\n') if magic.is_empty() => continue,
                Some(c) => magic.push(c),
                None => break,
            }
        }
        if magic != PDF_MAGIC {
            return Err(invalid(0, "Invalid PDF header"));
        }

        let mut version = [0u8; 3];
        for byte in version.iter_mut() {
            *byte = self.tokenizer.read_raw_byte()?.unwrap_or(0);
        }
        let pos = self.tokenizer.position();
        if !version[0].is_ascii_digit() {
            return Err(invalid(pos, "Invalid PDF major version"));
        }
        if version[1] != b'.' {
            return Err(invalid(pos, "Invalid PDF header"));
        }
        if !version[2].is_ascii_digit() {
            return Err(invalid(pos, "Invalid PDF minor version"));
        }
        self.parser.version_major = version[0] - b'0';
        self.parser.version_minor = version[2] - b'0';

        self.tokenizer.finish_line()
    }

    fn parse_body(&mut self) -> PDFResult<()> {
        let mut second_line = true;

        loop {
            let token = self.tokenizer.next_token(false, false)?;
            if token.is_empty() {
                break;
            }

            if token == b"xref" {
                self.parse_xref()?;
            } else if starts_with_nonzero_digit(&token) {
                self.parse_object(&token)?;
            } else if token == b"startxref" {
                // Can have startxref without trailer (not end of document)
                self.parse_start_xref()?;
            } else if second_line {
                // The second line may be uncommented binary or encoding noise
                warn!("Skipping invalid line at offset {}", self.offset());
                self.tokenizer.finish_line()?;
            } else {
                return Err(PDFError::InvalidLine {
                    offset: self.offset(),
                });
            }
            second_line = false;
        }
        Ok(())
    }

    fn parse_object(&mut self, token: &[u8]) -> PDFResult<()> {
        let offset = self.offset();
        let object_id = std::str::from_utf8(token)
            .ok()
            .and_then(|t| t.parse::<u32>().ok())
            .ok_or_else(|| PDFError::invalid_object(offset, "Invalid object number"))?;

        let token = self.tokenizer.expect_token()?;
        let generation_number = std::str::from_utf8(&token)
            .ok()
            .and_then(|t| t.parse::<u16>().ok())
            .ok_or_else(|| PDFError::invalid_object(self.offset(), "Invalid generation number"))?;

        let token = self.tokenizer.expect_token()?;
        if token != b"obj" {
            return Err(PDFError::invalid_object(self.offset(), "Missing obj keyword"));
        }

        trace!("New object {} {} at offset {}", object_id, generation_number, offset);
        let mut object = Object::parsed(object_id, generation_number, offset);

        loop {
            let token = self.tokenizer.expect_token()?;
            if token == b"endobj" {
                break;
            }

            if token == b"<<" {
                let dict = self.parse_dictionary(object.dictionary())?;
                object.dictionary_mut().extend(dict);
            } else if starts_with_nonzero_digit(&token) {
                match self.token_to_number(&token, None)? {
                    DataType::Integer { value, .. } if value > 0 => {
                        object.set_indirect_offset(value as u64);
                    }
                    _ => {
                        return Err(PDFError::invalid_object(
                            self.offset(),
                            "Invalid indirect offset",
                        ))
                    }
                }
            } else {
                let value = self.parse_type(&token, object.dictionary())?;
                object.data_mut().push(value);
            }
        }

        // Keep a reference to last xref object
        if object.is_xref_stream() {
            self.parser.xref_object = Some(object.id());
        }
        self.parser.objects.push(object);
        Ok(())
    }

    fn parse_xref(&mut self) -> PDFResult<bool> {
        trace!("Parsing xref at offset {}", self.offset());
        self.parser.xref_offset = Some(self.offset());
        let mut current_id: u32 = 0;

        loop {
            let first = self.tokenizer.expect_token()?;
            if first == b"trailer" {
                break;
            }
            let first_offset = self.offset();
            let second = self.tokenizer.expect_token()?;

            // Entry line, ie: 0000000016 00000 n
            if first.len() == 10 {
                let kind = self.tokenizer.expect_token()?;
                let offset = parse_unsigned::<u64>(&first)
                    .ok_or_else(|| PDFError::invalid_number(first_offset, &first))?;
                let generation = parse_unsigned::<u16>(&second)
                    .ok_or_else(|| PDFError::invalid_number(first_offset, &second))?;
                self.parser.xref_table.push(XRefValue::new(
                    current_id,
                    offset,
                    generation,
                    kind == b"n",
                ));
                current_id += 1;
            } else {
                // Subsection header, ie: 0 6121
                current_id = parse_unsigned::<u32>(&first)
                    .ok_or_else(|| PDFError::invalid_number(first_offset, &first))?;
            }
        }

        self.parse_trailer()
    }

    fn parse_trailer(&mut self) -> PDFResult<bool> {
        let token = self.tokenizer.expect_token()?;
        if token != b"<<" {
            return Err(PDFError::invalid_trailer(self.offset(), "Missing trailer dictionary"));
        }
        let dict = self.parse_dictionary(&Dictionary::new())?;
        self.parser.trailer.dictionary_mut().extend(dict);

        let token = self.tokenizer.next_token(false, false)?;
        // Trailer without startxref
        if token != b"startxref" {
            debug!("Trailer without startxref at offset {}", self.offset());
            if !token.is_empty() {
                self.tokenizer.seek(self.offset())?;
            }
            return Ok(false);
        }

        self.parse_start_xref()?;
        Ok(true)
    }

    fn parse_start_xref(&mut self) -> PDFResult<()> {
        let offset_token = self.tokenizer.expect_token()?;
        let offset_position = self.offset();

        let marker = self.tokenizer.next_token(false, true)?;
        if !marker.starts_with(PDF_EOF_MARKER) {
            return Err(PDFError::invalid_trailer(self.offset(), "Missing %%EOF"));
        }
        // %%EOF directly followed by the next object, ie: %%EOF1 0 obj
        if marker.len() > PDF_EOF_MARKER.len() {
            let resume = self.offset() + PDF_EOF_MARKER.len() as u64;
            self.tokenizer.seek(resume)?;
        }

        // No xref table present
        if self.parser.xref_offset.is_none() {
            match self.token_to_number(&offset_token, None) {
                Ok(DataType::Integer { value, .. }) if value >= 0 => {
                    self.parser.xref_offset = Some(value as u64);
                }
                _ => {
                    return Err(PDFError::invalid_trailer(
                        offset_position,
                        "Invalid startxref offset",
                    ))
                }
            }
        }
        Ok(())
    }

    fn parse_type(&mut self, token: &[u8], context: &Dictionary) -> PDFResult<DataType> {
        let first = match token.first() {
            Some(&c) => c,
            None => {
                return Err(PDFError::InvalidToken {
                    offset: self.offset(),
                    token: String::new(),
                })
            }
        };

        match token {
            b"<<" => return Ok(DataType::Dictionary(self.parse_dictionary(context)?)),
            b"[" => return self.parse_array(context),
            b"(" => return self.parse_string(),
            b"<" => return self.parse_hexa_string(),
            b"stream" => return self.parse_stream(context),
            b"true" => return Ok(DataType::Boolean(true)),
            b"false" => return Ok(DataType::Boolean(false)),
            b"null" => return Ok(DataType::Null),
            _ => {}
        }

        match first {
            b'1'..=b'9' => self.parse_number_or_reference(token),
            b'/' => Ok(DataType::Name(self.parse_name(token)?)),
            b'+' | b'-' => self.token_to_number(&token[1..], Some(first)),
            b'0' | b'.' => self.token_to_number(token, None),
            b'{' | b'}' => Err(PDFError::NotImplemented {
                offset: self.offset(),
                feature: "PostScript calculator syntax".to_string(),
            }),
            _ if token.starts_with(b"true") || token.starts_with(b"false") => {
                Err(PDFError::InvalidBoolean {
                    offset: self.offset(),
                    token: lossy(token),
                })
            }
            _ => Err(PDFError::InvalidToken {
                offset: self.offset(),
                token: lossy(token),
            }),
        }
    }

    fn token_to_number(&self, token: &[u8], sign: Option<u8>) -> PDFResult<DataType> {
        let offset = self.offset();
        let text =
            std::str::from_utf8(token).map_err(|_| PDFError::invalid_number(offset, token))?;
        let negative = sign == Some(b'-');
        let force_sign = sign.is_some();

        if text.contains('.') {
            let text = if text.starts_with('.') {
                format!("0{}", text)
            } else {
                text.to_string()
            };
            let value: f32 = text
                .parse()
                .map_err(|_| PDFError::invalid_number(offset, token))?;
            let value = if negative { -value } else { value };
            return Ok(DataType::Real { value, force_sign });
        }

        if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PDFError::invalid_number(offset, token));
        }
        let value: i32 = if negative {
            format!("-{}", text).parse()
        } else {
            text.parse()
        }
        .map_err(|_| PDFError::invalid_number(offset, token))?;
        Ok(DataType::Integer { value, force_sign })
    }

    /// `id gen R` or a plain number. The two tokens after the first integer
    /// are read speculatively and given back when they do not form a reference.
    fn parse_number_or_reference(&mut self, token: &[u8]) -> PDFResult<DataType> {
        let number = self.token_to_number(token, None)?;
        let DataType::Integer { value: object_id, .. } = number else {
            return Ok(number);
        };

        let resume = self.tokenizer.position();
        let generation = self.tokenizer.expect_token()?;
        let keyword = self.tokenizer.expect_token()?;

        match parse_unsigned::<u16>(&generation) {
            Some(generation) if keyword == b"R" && object_id > 0 => {
                Ok(DataType::reference(object_id as u32, generation))
            }
            _ => {
                self.tokenizer.seek(resume)?;
                Ok(number)
            }
        }
    }

    fn parse_name(&self, token: &[u8]) -> PDFResult<String> {
        if token.first() != Some(&b'/') {
            return Err(PDFError::InvalidName {
                offset: self.offset(),
                name: lossy(token),
            });
        }
        Ok(lossy(token))
    }

    fn parse_dictionary(&mut self, context: &Dictionary) -> PDFResult<Dictionary> {
        let mut dict = Dictionary::new();

        loop {
            let token = self.tokenizer.expect_token()?;
            if token == b">>" {
                break;
            }

            if is_structural(&token) {
                return Err(PDFError::InvalidDictionary {
                    offset: self.offset(),
                    message: format!("Unexpected {} in key position", lossy(&token)),
                });
            }
            let key = self.parse_name(&token)?;
            let key = key[1..].to_string();

            let token = self.tokenizer.expect_token()?;
            if token == b">>" {
                dict.insert_null(key);
                break;
            }

            let value = self.parse_type(&token, context)?;
            dict.insert(key, value);
        }

        Ok(dict)
    }

    fn parse_array(&mut self, context: &Dictionary) -> PDFResult<DataType> {
        let mut items = Vec::new();

        loop {
            let token = self.tokenizer.expect_token()?;
            if token == b"]" {
                break;
            }
            items.push(self.parse_type(&token, context)?);
        }

        Ok(DataType::Array(items))
    }

    fn parse_string(&mut self) -> PDFResult<DataType> {
        let mut res = Vec::new();
        let mut escaped = false;
        // Parentheses in parentheses
        let mut depth = 1;

        loop {
            let c = self.tokenizer.read_raw_byte()?.ok_or(PDFError::TruncatedFile {
                offset: self.tokenizer.position(),
            })?;

            if c == b'(' && !escaped {
                depth += 1;
            } else if c == b')' && !escaped {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }

            // Handle \\
            escaped = if c == b'\\' && escaped {
                false
            } else {
                c == b'\\'
            };

            res.push(c);
        }

        Ok(DataType::String(res))
    }

    fn parse_hexa_string(&mut self) -> PDFResult<DataType> {
        let offset = self.offset();
        let mut res = Vec::new();

        loop {
            let c = self.tokenizer.read_raw_byte()?.ok_or(PDFError::TruncatedFile {
                offset: self.tokenizer.position(),
            })?;
            if c == b'>' {
                break;
            }
            res.push(c);
        }

        let digits = res.iter().filter(|c| !c.is_ascii_whitespace()).count();
        if digits % 2 != 0 {
            return Err(PDFError::InvalidHexastring { offset });
        }

        Ok(DataType::HexaString(lossy(&res)))
    }

    fn parse_stream(&mut self, context: &Dictionary) -> PDFResult<DataType> {
        let token_offset = self.offset();

        // Remove \n after \r if there is one
        if self.tokenizer.last_char() == b'\r' {
            if let Some(c) = self.tokenizer.read_raw_byte()? {
                if c != b'\n' {
                    self.tokenizer.unread(1)?;
                }
            }
        }

        let start = self.tokenizer.position();

        if !context.has_key("Length") {
            return Err(PDFError::invalid_stream(token_offset, "No Length property"));
        }

        if let Some(DataType::Integer { value, .. }) = context.get("Length") {
            if *value >= 0 {
                let end = start + *value as u64;
                self.tokenizer.seek(end)?;
                let token = self.tokenizer.next_token(false, false)?;
                if token == ENDSTREAM_MARKER {
                    return Ok(DataType::Stream(Stream::from_source(
                        Rc::clone(&self.handle),
                        start,
                        end,
                    )));
                }
            }
            warn!(
                "Stream at offset {} does not end at its /Length, scanning for endstream",
                start
            );
            self.tokenizer.seek(start)?;
        }

        let end = self.scan_for_endstream(start)?;
        Ok(DataType::Stream(Stream::from_source(
            Rc::clone(&self.handle),
            start,
            end,
        )))
    }

    /// Find `endstream` from `start`, returning the payload end without the
    /// line break before the marker. Leaves the position after the marker.
    fn scan_for_endstream(&mut self, start: u64) -> PDFResult<u64> {
        let finder = memmem::Finder::new(ENDSTREAM_MARKER);
        let mut window: Vec<u8> = Vec::with_capacity(SCAN_CHUNK_SIZE + SCAN_OVERLAP);
        let mut window_start = start;
        let mut chunk = vec![0u8; SCAN_CHUNK_SIZE];

        loop {
            let read = self.tokenizer.read_raw_chunk(&mut chunk)?;
            if read == 0 {
                return Err(PDFError::TruncatedFile {
                    offset: self.tokenizer.position(),
                });
            }
            window.extend_from_slice(&chunk[..read]);

            if let Some(index) = finder.find(&window) {
                let marker = window_start + index as u64;
                let byte_at = |pos: u64| window[(pos - window_start) as usize];

                // Drop one trailing LF, then one trailing CR
                let mut end = marker;
                if end > start && byte_at(end - 1) == b'\n' {
                    end -= 1;
                }
                if end > start && byte_at(end - 1) == b'\r' {
                    end -= 1;
                }

                self.tokenizer.seek(marker + ENDSTREAM_MARKER.len() as u64)?;
                return Ok(end);
            }

            if window.len() > SCAN_OVERLAP {
                let dropped = window.len() - SCAN_OVERLAP;
                window.drain(..dropped);
                window_start += dropped as u64;
            }
        }
    }
}

fn parse_unsigned<T: std::str::FromStr>(token: &[u8]) -> Option<T> {
    if token.is_empty() || !token.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(token).ok()?.parse().ok()
}
