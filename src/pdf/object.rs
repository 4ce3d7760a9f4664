//! PDF value types and indirect objects

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{PDFError, PDFResult};
use super::{Dictionary, Stream};

/// Identity of an indirect object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    /// Object number
    pub id: u32,
    /// Generation number
    pub generation: u16,
}

impl ObjectId {
    pub fn new(id: u32, generation: u16) -> Self {
        Self { id, generation }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.id, self.generation)
    }
}

/// PDF value types
#[derive(Debug, Clone, PartialEq)]
pub enum DataType {
    /// Boolean value
    Boolean(bool),
    /// Integer; `force_sign` keeps an explicit `+` on output
    Integer { value: i32, force_sign: bool },
    /// Real; `force_sign` keeps an explicit `+` on output
    Real { value: f32, force_sign: bool },
    /// Name, stored with its leading `/`
    Name(String),
    /// Literal string, raw bytes between the parentheses (escapes kept)
    String(Vec<u8>),
    /// Hexadecimal string, digits between the angle brackets
    HexaString(String),
    /// Indirect reference
    Reference(ObjectId),
    /// Array object
    Array(Vec<DataType>),
    /// Dictionary object
    Dictionary(Dictionary),
    /// Stream payload
    Stream(Stream),
    /// Null object
    Null,
}

impl DataType {
    pub fn integer(value: i32) -> Self {
        Self::Integer {
            value,
            force_sign: false,
        }
    }

    /// Integer written with an explicit sign
    pub fn signed_integer(value: i32) -> Self {
        Self::Integer {
            value,
            force_sign: true,
        }
    }

    pub fn real(value: f32) -> Self {
        Self::Real {
            value,
            force_sign: false,
        }
    }

    /// Name from its text, with or without the leading `/`
    pub fn name(name: &str) -> Self {
        if name.starts_with('/') {
            Self::Name(name.to_string())
        } else {
            Self::Name(format!("/{}", name))
        }
    }

    /// Literal string from already escaped bytes
    pub fn string(raw: Vec<u8>) -> Self {
        Self::String(raw)
    }

    /// Literal string from plain bytes, escaping what needs it
    pub fn text_string(text: &[u8]) -> Self {
        Self::String(escape_string(text))
    }

    pub fn hexa_string(digits: impl Into<String>) -> Self {
        Self::HexaString(digits.into())
    }

    pub fn reference(id: u32, generation: u16) -> Self {
        Self::Reference(ObjectId::new(id, generation))
    }

    /// Get the type name for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "Boolean",
            Self::Integer { .. } => "Integer",
            Self::Real { .. } => "Real",
            Self::Name(_) => "Name",
            Self::String(_) => "String",
            Self::HexaString(_) => "HexaString",
            Self::Reference(_) => "Reference",
            Self::Array(_) => "Array",
            Self::Dictionary(_) => "Dictionary",
            Self::Stream(_) => "Stream",
            Self::Null => "Null",
        }
    }

    /// Literal string content with escape sequences resolved
    pub fn unescaped_string(&self) -> Option<Vec<u8>> {
        match self {
            Self::String(raw) => Some(unescape_string(raw)),
            _ => None,
        }
    }

    /// Hexadecimal string content as bytes. Whitespace between digits is ignored.
    ///
    /// Values do not record where they were parsed, so a decoding error
    /// reports offset 0.
    pub fn decode_hexa_string(&self) -> PDFResult<Option<Vec<u8>>> {
        match self {
            Self::HexaString(digits) => {
                let digits: String = digits.chars().filter(|c| !c.is_whitespace()).collect();
                hex::decode(digits)
                    .map(Some)
                    .map_err(|_| PDFError::InvalidHexastring { offset: 0 })
            }
            _ => Ok(None),
        }
    }

    /// Numbers and references already start with a space when written
    fn has_leading_space(&self) -> bool {
        matches!(
            self,
            Self::Integer { .. } | Self::Real { .. } | Self::Reference(_)
        )
    }

    /// Write value to output in canonical form
    pub fn write_to(&self, output: &mut Vec<u8>) -> PDFResult<()> {
        match self {
            Self::Boolean(b) => {
                output.extend_from_slice(if *b { b" true" } else { b" false" });
            }
            Self::Integer { value, force_sign } => {
                output.push(b' ');
                if *force_sign && *value >= 0 {
                    output.push(b'+');
                }
                output.extend_from_slice(value.to_string().as_bytes());
            }
            Self::Real { value, force_sign } => {
                output.push(b' ');
                if *force_sign && !value.is_sign_negative() {
                    output.push(b'+');
                }
                output.extend_from_slice(value.to_string().as_bytes());
            }
            Self::Name(name) => output.extend_from_slice(name.as_bytes()),
            Self::String(raw) => {
                output.push(b'(');
                // `\\` is a complete escape and does not protect what follows
                let mut escaped = false;
                for &b in raw {
                    if (b == b'(' || b == b')') && !escaped {
                        output.push(b'\\');
                    }
                    output.push(b);
                    escaped = b == b'\\' && !escaped;
                }
                output.push(b')');
            }
            Self::HexaString(digits) => {
                output.push(b'<');
                output.extend_from_slice(digits.as_bytes());
                output.push(b'>');
            }
            Self::Reference(id) => {
                output.extend_from_slice(format!(" {} {} R", id.id, id.generation).as_bytes());
            }
            Self::Array(items) => {
                output.push(b'[');
                for (i, item) in items.iter().enumerate() {
                    if item.has_leading_space() {
                        let start = output.len();
                        item.write_to(output)?;
                        if i == 0 {
                            output.remove(start);
                        }
                    } else {
                        if i > 0 {
                            output.push(b' ');
                        }
                        item.write_to(output)?;
                    }
                }
                if items.is_empty() {
                    output.push(b' ');
                }
                output.push(b']');
            }
            Self::Dictionary(dict) => dict.write_to(output)?,
            Self::Stream(stream) => stream.write_to(output)?,
            Self::Null => output.extend_from_slice(b" null"),
        }
        Ok(())
    }

    /// Serialize to a fresh buffer
    pub fn to_bytes(&self) -> PDFResult<Vec<u8>> {
        let mut output = Vec::new();
        self.write_to(&mut output)?;
        Ok(output)
    }
}

/// Escape backslashes, parentheses and line breaks for a literal string
pub fn escape_string(text: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for &b in text {
        match b {
            b'\\' | b'(' | b')' => {
                out.push(b'\\');
                out.push(b);
            }
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            _ => out.push(b),
        }
    }
    out
}

/// Resolve the escape sequences of a literal string
pub fn unescape_string(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let b = raw[i];
        i += 1;
        if b != b'\\' || i >= raw.len() {
            out.push(b);
            continue;
        }

        let escaped = raw[i];
        i += 1;
        match escaped {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0c),
            b'0'..=b'7' => {
                let mut value = u32::from(escaped - b'0');
                let mut digits = 1;
                while digits < 3 && i < raw.len() && (b'0'..=b'7').contains(&raw[i]) {
                    value = value * 8 + u32::from(raw[i] - b'0');
                    i += 1;
                    digits += 1;
                }
                out.push((value & 0xff) as u8);
            }
            // Line continuation
            b'\r' => {
                if raw.get(i) == Some(&b'\n') {
                    i += 1;
                }
            }
            b'\n' => {}
            other => out.push(other),
        }
    }
    out
}

/// One indirect PDF object (`id gen obj ... endobj`).
///
/// Objects compare equal when their object and generation numbers match,
/// whatever their content.
#[derive(Debug)]
pub struct Object {
    object_id: u32,
    generation_number: u16,
    offset: u64,
    is_new: bool,
    indirect_offset: u64,
    used: bool,
    dictionary: Dictionary,
    data: Vec<DataType>,
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.object_id == other.object_id && self.generation_number == other.generation_number
    }
}

impl Eq for Object {}

impl Hash for Object {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl Object {
    /// Create a new object, to be written by the next update
    pub fn new(object_id: u32, generation_number: u16) -> Self {
        let mut object = Self::parsed(object_id, generation_number, 0);
        object.is_new = true;
        object
    }

    /// Create an object read from the file at `offset`
    pub fn parsed(object_id: u32, generation_number: u16, offset: u64) -> Self {
        Self {
            object_id,
            generation_number,
            offset,
            is_new: false,
            indirect_offset: 0,
            used: true,
            dictionary: Dictionary::new(),
            data: Vec::new(),
        }
    }

    /// Deep copy. The copy is always marked as new
    pub fn clone_object(&self) -> Self {
        Self {
            object_id: self.object_id,
            generation_number: self.generation_number,
            offset: self.offset,
            is_new: true,
            indirect_offset: self.indirect_offset,
            used: self.used,
            dictionary: self.dictionary.clone(),
            data: self.data.clone(),
        }
    }

    pub fn id(&self) -> ObjectId {
        ObjectId::new(self.object_id, self.generation_number)
    }

    pub fn object_id(&self) -> u32 {
        self.object_id
    }

    pub fn generation_number(&self) -> u16 {
        self.generation_number
    }

    /// Offset of the object in the file it was parsed from
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Whether the object was created or updated since parsing
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// Mark object as updated
    pub fn update(&mut self) {
        self.is_new = true;
    }

    /// Status from the xref table: used (`n`) or free (`f`)
    pub fn used(&self) -> bool {
        self.used
    }

    pub fn set_used(&mut self, used: bool) {
        self.used = used;
    }

    /// Make the object an indirect-offset placeholder, or a regular one with 0
    pub fn set_indirect_offset(&mut self, offset: u64) {
        self.indirect_offset = offset;
    }

    pub fn indirect_offset(&self) -> u64 {
        self.indirect_offset
    }

    pub fn is_indirect(&self) -> bool {
        self.indirect_offset != 0
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    pub fn dictionary_mut(&mut self) -> &mut Dictionary {
        &mut self.dictionary
    }

    /// Top-level values not wrapped in `<< >>`
    pub fn data(&self) -> &[DataType] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Vec<DataType> {
        &mut self.data
    }

    /// Get dictionary value
    pub fn get(&self, key: &str) -> Option<&DataType> {
        self.dictionary.get(key)
    }

    /// Check for key in object's dictionary
    pub fn has_key(&self, key: &str) -> bool {
        self.dictionary.has_key(key)
    }

    /// Set dictionary value
    pub fn insert(&mut self, key: impl Into<String>, value: DataType) -> Option<DataType> {
        self.dictionary.insert(key, value)
    }

    /// Remove a key in object's dictionary. No error if the key doesn't exist
    pub fn delete_key(&mut self, key: &str) -> Option<DataType> {
        self.dictionary.remove(key)
    }

    /// Whether the dictionary says `/Type /XRef`
    pub fn is_xref_stream(&self) -> bool {
        matches!(self.dictionary.get("Type"), Some(DataType::Name(name)) if name == "/XRef")
    }

    /// First stream among the top-level values
    pub fn stream(&self) -> Option<&Stream> {
        self.data.iter().find_map(|item| match item {
            DataType::Stream(stream) => Some(stream),
            _ => None,
        })
    }

    /// Replace the stream payload and its `/Length`
    pub fn set_stream_data(&mut self, data: Vec<u8>) -> PDFResult<()> {
        let Self {
            data: items,
            dictionary,
            offset,
            ..
        } = self;
        let stream = items
            .iter_mut()
            .find_map(|item| match item {
                DataType::Stream(stream) => Some(stream),
                _ => None,
            })
            .ok_or_else(|| PDFError::invalid_stream(*offset, "Object has no stream"))?;
        stream.set_data(data, dictionary)
    }

    /// Write object to output
    pub fn write_to(&self, output: &mut Vec<u8>) -> PDFResult<()> {
        output.extend_from_slice(
            format!("{} {} obj\n", self.object_id, self.generation_number).as_bytes(),
        );

        if self.is_indirect() {
            output.extend_from_slice(format!("   {}\n", self.indirect_offset).as_bytes());
        } else {
            let mut need_line_return = false;

            if !self.dictionary.is_empty() {
                self.dictionary.write_to(output)?;
            } else if self.data.is_empty() {
                output.extend_from_slice(b"<<>>\n");
            } else {
                need_line_return = true;
            }

            for item in &self.data {
                let start = output.len();
                item.write_to(output)?;
                if output.len() > start && matches!(output.last(), Some(b'\n' | b'\r')) {
                    need_line_return = false;
                }
            }

            if need_line_return {
                output.push(b'\n');
            }
        }

        output.extend_from_slice(b"endobj\n");
        Ok(())
    }

    /// Serialize to a fresh buffer
    pub fn to_bytes(&self) -> PDFResult<Vec<u8>> {
        let mut output = Vec::new();
        self.write_to(&mut output)?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn text(value: &DataType) -> String {
        String::from_utf8(value.to_bytes().unwrap()).unwrap()
    }

    #[rstest]
    #[case(DataType::signed_integer(5), " +5")]
    #[case(DataType::signed_integer(-5), " -5")]
    #[case(DataType::integer(42), " 42")]
    #[case(DataType::integer(-7), " -7")]
    #[case(DataType::real(1.0), " 1")]
    #[case(DataType::real(0.5), " 0.5")]
    #[case(DataType::Real { value: 2.25, force_sign: true }, " +2.25")]
    #[case(DataType::Real { value: -0.5, force_sign: true }, " -0.5")]
    #[case(DataType::Boolean(true), " true")]
    #[case(DataType::name("Type"), "/Type")]
    #[case(DataType::reference(3, 0), " 3 0 R")]
    #[case(DataType::hexa_string("4142"), "<4142>")]
    #[case(DataType::Null, " null")]
    fn test_scalar_serialization(#[case] value: DataType, #[case] expected: &str) {
        assert_eq!(text(&value), expected);
    }

    #[test]
    fn test_array_serialization() {
        let array = DataType::Array(vec![
            DataType::integer(1),
            DataType::integer(2),
            DataType::string(b"a".to_vec()),
        ]);
        assert_eq!(text(&array), "[1 2 (a)]");

        let array = DataType::Array(vec![
            DataType::name("Fit"),
            DataType::reference(4, 0),
            DataType::real(0.5),
        ]);
        assert_eq!(text(&array), "[/Fit 4 0 R 0.5]");

        assert_eq!(text(&DataType::Array(Vec::new())), "[ ]");
    }

    #[test]
    fn test_string_parentheses_escaped() {
        assert_eq!(text(&DataType::string(b"a(b)c".to_vec())), "(a\\(b\\)c)");
        // Already escaped parentheses are left alone
        assert_eq!(text(&DataType::string(b"a\\(b".to_vec())), "(a\\(b)");
        // An escaped backslash leaves the next parenthesis unescaped
        assert_eq!(text(&DataType::string(b"x\\\\(y)".to_vec())), "(x\\\\\\(y\\))");
        assert_eq!(text(&DataType::string(b"\\\\\\)".to_vec())), "(\\\\\\))");
    }

    #[test]
    fn test_string_escape_round_trip() {
        let plain = b"line (one)\nback\\slash";
        let value = DataType::text_string(plain);
        assert_eq!(value.unescaped_string(), Some(plain.to_vec()));
    }

    #[rstest]
    #[case(b"\\101\\102", b"AB")]
    #[case(b"tab\\there", b"tab\there")]
    #[case(b"split\\\nline", b"splitline")]
    #[case(b"\\q", b"q")]
    fn test_unescape(#[case] raw: &[u8], #[case] expected: &[u8]) {
        assert_eq!(unescape_string(raw), expected.to_vec());
    }

    #[test]
    fn test_hexa_string_decode() -> PDFResult<()> {
        let value = DataType::hexa_string("48 65 6C6C 6F");
        assert_eq!(value.decode_hexa_string()?, Some(b"Hello".to_vec()));

        let odd = DataType::hexa_string("ABC");
        let err = odd.decode_hexa_string().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidHexastring);
        assert_eq!(err.offset(), Some(0));

        let bad_digit = DataType::hexa_string("4G");
        assert!(matches!(
            bad_digit.decode_hexa_string(),
            Err(PDFError::InvalidHexastring { offset: 0 })
        ));

        assert_eq!(DataType::name("Hex").decode_hexa_string()?, None);
        Ok(())
    }

    #[test]
    fn test_object_identity() {
        let mut a = Object::parsed(4, 0, 100);
        a.insert("Type", DataType::name("Page"));
        let b = Object::new(4, 0);
        let c = Object::new(4, 1);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_clone_marks_new() {
        let mut original = Object::parsed(7, 0, 10);
        original.insert("Count", DataType::integer(3));

        let copy = original.clone_object();
        assert!(!original.is_new());
        assert!(copy.is_new());
        assert_eq!(copy.dictionary(), original.dictionary());
        assert_eq!(copy.offset(), 10);
    }

    #[test]
    fn test_object_serialization() -> PDFResult<()> {
        let mut object = Object::parsed(1, 0, 0);
        object.insert("Type", DataType::name("Catalog"));
        object.insert("Pages", DataType::reference(2, 0));
        assert_eq!(
            object.to_bytes()?,
            b"1 0 obj\n<</Type/Catalog/Pages 2 0 R>>\nendobj\n".to_vec()
        );

        let empty = Object::parsed(2, 0, 0);
        assert_eq!(empty.to_bytes()?, b"2 0 obj\n<<>>\nendobj\n".to_vec());

        let mut bare = Object::parsed(3, 0, 0);
        bare.data_mut().push(DataType::integer(12));
        assert_eq!(bare.to_bytes()?, b"3 0 obj\n 12\nendobj\n".to_vec());

        let mut indirect = Object::parsed(5, 0, 0);
        indirect.set_indirect_offset(1234);
        assert!(indirect.is_indirect());
        assert_eq!(indirect.to_bytes()?, b"5 0 obj\n   1234\nendobj\n".to_vec());
        Ok(())
    }

    #[test]
    fn test_stream_object() -> PDFResult<()> {
        let mut object = Object::new(6, 0);
        object.insert("Length", DataType::integer(3));
        object.data_mut().push(DataType::Stream(Stream::from_data(b"abc".to_vec())));

        object.set_stream_data(b"hello".to_vec())?;
        assert_eq!(object.dictionary().get_integer("Length"), Some(5));
        assert_eq!(
            object.to_bytes()?,
            b"6 0 obj\n<</Length 5>>\nstream\nhello\nendstream\nendobj\n".to_vec()
        );

        let mut plain = Object::new(7, 0);
        assert!(matches!(
            plain.set_stream_data(Vec::new()),
            Err(PDFError::InvalidStream { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_xref_type_detection() {
        let mut object = Object::parsed(9, 0, 0);
        assert!(!object.is_xref_stream());
        object.insert("Type", DataType::name("XRef"));
        assert!(object.is_xref_stream());
    }
}
