//! PDF lexical tokenizer

use log::trace;

use crate::error::{PDFError, PDFResult};
use super::source::Source;

/// Bytes that end a token in progress
const DELIMITERS: &[u8] = b" \t<>[]()/\0";
/// Bytes that end a token only when preceded by a space
const WHITESPACE_PREV_DELIMITERS: &[u8] = b"+-";
/// Bytes that form a one-byte token on their own
const START_DELIMITERS: &[u8] = b"<>[]()";

fn is_line_end(c: u8) -> bool {
    c == b'\n' || c == b'\r'
}

/// Reads one PDF token per call and remembers where it began
pub struct Tokenizer<'a> {
    source: &'a mut Source,
    last_char: u8,
    token_offset: u64,
}

impl<'a> Tokenizer<'a> {
    /// Create tokenizer at the current source position
    pub fn new(source: &'a mut Source) -> Self {
        Self {
            source,
            last_char: 0,
            token_offset: 0,
        }
    }

    /// Absolute offset of the first byte of the last token
    pub fn token_offset(&self) -> u64 {
        self.token_offset
    }

    /// Last byte consumed by [`Tokenizer::next_token`]
    pub fn last_char(&self) -> u8 {
        self.last_char
    }

    /// Current read position
    pub fn position(&self) -> u64 {
        self.source.position()
    }

    /// Move the read position
    pub fn seek(&mut self, pos: u64) -> PDFResult<()> {
        self.source.seek(pos)
    }

    /// Read one raw byte, bypassing token rules
    pub fn read_raw_byte(&mut self) -> PDFResult<Option<u8>> {
        self.source.read_byte()
    }

    /// Read raw bytes into `buf`
    pub fn read_raw_chunk(&mut self, buf: &mut [u8]) -> PDFResult<usize> {
        self.source.read_chunk(buf)
    }

    /// Give back the last `count` bytes
    pub fn unread(&mut self, count: u64) -> PDFResult<()> {
        self.source.unread(count)
    }

    fn truncated(&self) -> PDFError {
        PDFError::TruncatedFile {
            offset: self.source.position(),
        }
    }

    /// Consume the rest of the current line, along with a `\r\n` or `\n\r` pair
    pub fn finish_line(&mut self) -> PDFResult<()> {
        while let Some(c) = self.source.read_byte()? {
            if is_line_end(c) {
                break;
            }
        }
        if let Some(c) = self.source.read_byte()? {
            if !is_line_end(c) {
                self.source.unread(1)?;
            }
        }
        Ok(())
    }

    /// Read the next token.
    ///
    /// With `exception_on_eof` an end of input before the token is complete
    /// is a `TruncatedFile` error; without it the (possibly empty) token read
    /// so far is returned. `read_comment` returns a `%` comment verbatim
    /// instead of skipping it.
    pub fn next_token(&mut self, exception_on_eof: bool, read_comment: bool) -> PDFResult<Vec<u8>> {
        let mut res: Vec<u8> = Vec::new();
        let mut found = false;
        let mut c: u8 = 0;

        while !found {
            let prev_c = c;
            c = match self.source.read_byte()? {
                Some(c) => c,
                None => {
                    if exception_on_eof {
                        return Err(self.truncated());
                    }
                    break;
                }
            };
            self.last_char = c;

            if c == b'%' {
                if read_comment {
                    self.token_offset = self.source.position() - 1;
                    res.push(c);
                    loop {
                        match self.source.read_byte()? {
                            Some(b) if is_line_end(b) => {
                                self.last_char = b;
                                break;
                            }
                            Some(b) => res.push(b),
                            None if exception_on_eof => return Err(self.truncated()),
                            None => break,
                        }
                    }
                    break;
                }

                self.finish_line()?;
                if res.is_empty() {
                    continue;
                }
                break;
            }

            if matches!(c, b' ' | b'\t' | b'\n' | b'\r' | b'\0') && res.is_empty() {
                continue;
            }

            // A line end closes the token and is consumed with it
            if is_line_end(c) {
                break;
            }

            if !res.is_empty() {
                if DELIMITERS.contains(&c)
                    || (prev_c == b' ' && WHITESPACE_PREV_DELIMITERS.contains(&c))
                {
                    self.source.unread(1)?;
                    found = true;
                } else {
                    res.push(c);
                }
            } else {
                self.token_offset = self.source.position() - 1;
                found = START_DELIMITERS.contains(&c);
                res.push(c);
            }
        }

        // `<<` and `>>` come out as one token
        if res == b"<" || res == b">" {
            if let Some(next) = self.source.read_byte()? {
                if next == res[0] {
                    self.last_char = next;
                    res.push(next);
                } else {
                    self.source.unread(1)?;
                }
            }
        }

        trace!(
            "Token {:?} at offset {}",
            String::from_utf8_lossy(&res),
            self.token_offset
        );
        Ok(res)
    }

    /// Read the next token, failing on end of input
    pub fn expect_token(&mut self) -> PDFResult<Vec<u8>> {
        self.next_token(true, false)
    }
}
