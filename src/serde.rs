//! Byte-level helpers for the snapshot format: LEB128 varints for counts and
//! capacities, little-endian doubles for values.

use std::io::ErrorKind;

use crate::error::Error;

/// Version byte leading every snapshot; bumped when the layout changes.
pub(crate) const ENCODING_VERSION: u8 = 0;

pub(crate) struct Input<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Input<'a> {
    pub fn new(buf: &'a [u8]) -> Input<'a> {
        Input { buf, pos: 0 }
    }

    pub fn read_byte(&mut self) -> Result<u8, Error> {
        if self.pos >= self.buf.len() {
            return Err(Error::IoError(ErrorKind::UnexpectedEof));
        }
        let value = self.buf[self.pos];
        self.pos += 1;
        Ok(value)
    }

    pub fn read_f64_le(&mut self) -> Result<f64, Error> {
        if self.pos + 8 > self.buf.len() {
            return Err(Error::IoError(ErrorKind::UnexpectedEof));
        }
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.buf[self.pos..self.pos + 8]);
        self.pos += 8;
        Ok(f64::from_le_bytes(bytes))
    }
}

pub(crate) fn encode_var_u64(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

pub(crate) fn decode_var_u64(input: &mut Input) -> Result<u64, Error> {
    let mut value: u64 = 0;
    let mut shift = 0;
    loop {
        let byte = input.read_byte()?;
        value |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
        if shift >= 64 {
            return Err(Error::InvalidArgument("varint overflows u64"));
        }
    }
}

pub(crate) fn encode_f64_le(out: &mut Vec<u8>, value: f64) {
    out.extend(f64::to_le_bytes(value));
}
