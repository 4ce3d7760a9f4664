//! PDF physical structure: tokens, objects, cross-reference data and the
//! parser/writer pair built on them

mod dict;
mod object;
mod parser;
mod source;
mod stream;
mod tokenizer;
mod writer;
mod xref;

pub use dict::Dictionary;
pub use object::{escape_string, unescape_string, DataType, Object, ObjectId};
pub use parser::PDFParser;
pub use source::{ReadSeek, SharedSource, Source};
pub use stream::Stream;
pub use tokenizer::Tokenizer;
pub use xref::{XRefTable, XRefValue};
