//! Little/big-endian cursor over an owned byte buffer.

use crate::error::ParseError;
use crate::schema::{Endian, IntWidth};

pub(crate) struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Consumes exactly `n` bytes, or fails with the field that needed them.
    pub fn take(&mut self, n: usize, field: &str) -> Result<&'a [u8], ParseError> {
        if self.remaining() < n {
            return Err(ParseError::ShortBuffer {
                field: field.to_string(),
                needed: n,
                remaining: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_uint(
        &mut self,
        width: IntWidth,
        endian: Endian,
        field: &str,
    ) -> Result<u64, ParseError> {
        let bytes = self.take(width.bytes(), field)?;
        let mut out = 0u64;
        match endian {
            Endian::Little => {
                for (i, b) in bytes.iter().enumerate() {
                    out |= (*b as u64) << (8 * i);
                }
            }
            Endian::Big => {
                for b in bytes {
                    out = (out << 8) | *b as u64;
                }
            }
        }
        Ok(out)
    }

    pub fn read_int(
        &mut self,
        width: IntWidth,
        endian: Endian,
        field: &str,
    ) -> Result<i64, ParseError> {
        let raw = self.read_uint(width, endian, field)?;
        let bits = width.bits();
        if bits == 64 {
            return Ok(raw as i64);
        }
        // Sign-extend from the field's width.
        let sign = 1u64 << (bits - 1);
        if raw & sign != 0 {
            Ok((raw | !((1u64 << bits) - 1)) as i64)
        } else {
            Ok(raw as i64)
        }
    }

    pub fn read_f32(&mut self, endian: Endian, field: &str) -> Result<f32, ParseError> {
        let raw = self.read_uint(IntWidth::W32, endian, field)? as u32;
        Ok(f32::from_bits(raw))
    }

    pub fn read_f64(&mut self, endian: Endian, field: &str) -> Result<f64, ParseError> {
        let raw = self.read_uint(IntWidth::W64, endian, field)?;
        Ok(f64::from_bits(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_and_big() {
        let buf = [0x01, 0x02, 0x03, 0x04];
        let mut r = ByteReader::new(&buf);
        assert_eq!(
            r.read_uint(IntWidth::W16, Endian::Little, "t").unwrap(),
            0x0201
        );
        assert_eq!(
            r.read_uint(IntWidth::W16, Endian::Big, "t").unwrap(),
            0x0304
        );
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn sign_extends() {
        let buf = [0xFFu8, 0xFF];
        let mut r = ByteReader::new(&buf);
        assert_eq!(r.read_int(IntWidth::W16, Endian::Little, "t").unwrap(), -1);
    }

    #[test]
    fn short_buffer_reports_need() {
        let buf = [0u8; 2];
        let mut r = ByteReader::new(&buf);
        let err = r.read_uint(IntWidth::W32, Endian::Little, "count").unwrap_err();
        assert_eq!(
            err,
            ParseError::ShortBuffer {
                field: "count".into(),
                needed: 4,
                remaining: 2,
            }
        );
    }
}
