//! Byte-buffer writer mirroring `ByteReader`.

use crate::schema::{Endian, IntWidth};

pub(crate) struct ByteWriter {
    out: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self { out: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.out.len()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.out
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.out.extend_from_slice(bytes);
    }

    pub fn put_zeros(&mut self, n: usize) {
        self.out.resize(self.out.len() + n, 0);
    }

    pub fn put_uint(&mut self, value: u64, width: IntWidth, endian: Endian) {
        let n = width.bytes();
        match endian {
            Endian::Little => {
                for i in 0..n {
                    self.out.push((value >> (8 * i)) as u8);
                }
            }
            Endian::Big => {
                for i in (0..n).rev() {
                    self.out.push((value >> (8 * i)) as u8);
                }
            }
        }
    }

    pub fn put_int(&mut self, value: i64, width: IntWidth, endian: Endian) {
        // Two's complement truncation to the field width.
        let mask = if width.bits() == 64 {
            u64::MAX
        } else {
            (1u64 << width.bits()) - 1
        };
        self.put_uint(value as u64 & mask, width, endian);
    }

    pub fn put_f32(&mut self, value: f32, endian: Endian) {
        self.put_uint(value.to_bits() as u64, IntWidth::W32, endian);
    }

    pub fn put_f64(&mut self, value: f64, endian: Endian) {
        self.put_uint(value.to_bits(), IntWidth::W64, endian);
    }
}
