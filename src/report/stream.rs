//! Seekable reader of decimal tokens

use crate::error::BsaResult;
use std::io::{self, BufRead, Seek, SeekFrom};

/// Decimal token reader with an explicit cursor.
///
/// Mirrors formatted numeric extraction: leading whitespace is skipped and the
/// longest decimal prefix is taken. Once a read hits end-of-data or a
/// non-numeric token the stream stays failed until the next [`seek_to`].
///
/// [`seek_to`]: NumericStream::seek_to
pub struct NumericStream<R> {
    reader: R,
    failed: bool,
}

impl<R: BufRead + Seek> NumericStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            failed: false,
        }
    }

    /// Reposition the cursor to an absolute byte offset and clear any failure
    pub fn seek_to(&mut self, offset: u64) -> BsaResult<()> {
        self.reader.seek(SeekFrom::Start(offset))?;
        self.failed = false;
        Ok(())
    }

    /// Whether the last read ran out of data or hit a non-numeric token
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Read the next decimal token.
    ///
    /// Returns `Ok(None)` at end-of-data or on a non-numeric token; only
    /// genuine I/O failures are errors.
    pub fn next_value(&mut self) -> BsaResult<Option<f64>> {
        if self.failed {
            return Ok(None);
        }

        while let Some(b) = self.peek()? {
            if !b.is_ascii_whitespace() {
                break;
            }
            self.bump();
        }

        let mut token = String::new();
        if let Some(sign @ (b'+' | b'-')) = self.peek()? {
            token.push(char::from(sign));
            self.bump();
        }

        let mut mantissa_digits = self.take_digits(&mut token)?;
        if self.peek()? == Some(b'.') {
            token.push('.');
            self.bump();
            mantissa_digits += self.take_digits(&mut token)?;
        }
        if mantissa_digits == 0 {
            return Ok(self.fail());
        }

        if let Some(e @ (b'e' | b'E')) = self.peek()? {
            token.push(char::from(e));
            self.bump();
            if let Some(sign @ (b'+' | b'-')) = self.peek()? {
                token.push(char::from(sign));
                self.bump();
            }
            if self.take_digits(&mut token)? == 0 {
                return Ok(self.fail());
            }
        }

        match token.parse::<f64>() {
            Ok(value) => Ok(Some(value)),
            Err(_) => Ok(self.fail()),
        }
    }

    fn fail(&mut self) -> Option<f64> {
        self.failed = true;
        None
    }

    fn peek(&mut self) -> io::Result<Option<u8>> {
        Ok(self.reader.fill_buf()?.first().copied())
    }

    fn bump(&mut self) {
        self.reader.consume(1);
    }

    fn take_digits(&mut self, token: &mut String) -> io::Result<usize> {
        let mut count = 0;
        while let Some(b) = self.peek()? {
            if !b.is_ascii_digit() {
                break;
            }
            token.push(char::from(b));
            self.bump();
            count += 1;
        }
        Ok(count)
    }
}
