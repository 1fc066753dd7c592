//
//   This Source Code Form is subject to the terms of the Mozilla Public
//   License, v. 2.0. If a copy of the MPL was not distributed with this
//   file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
//! The write sink every serializer targets
//!
//! Serialization runs against the [`PacketSink`] trait so the same body
//! writer can either emit bytes into a caller buffer ([`BufWriter`]) or
//! merely count them ([`SizeSink`]). The packet size calculators are
//! the counting run of the exact code path the serializers execute.

use crate::error::EncodeError;

pub trait PacketSink {
    fn write_byte(&mut self, byte: u8) -> Result<(), EncodeError>;

    fn write_slice(&mut self, slice: &[u8]) -> Result<(), EncodeError>;

    /// Bytes accepted so far.
    fn written(&self) -> usize;

    #[inline]
    fn write_u16(&mut self, value: u16) -> Result<(), EncodeError> {
        self.write_slice(&value.to_be_bytes())
    }

    #[inline]
    fn write_u32(&mut self, value: u32) -> Result<(), EncodeError> {
        self.write_slice(&value.to_be_bytes())
    }
}

/// A forward-only cursor over a caller-provided buffer.
///
/// Capacity is checked before every write; on failure the buffer
/// contents up to the current cursor are left as already written, and
/// the cursor does not move.
#[derive(Debug)]
pub struct BufWriter<'a> {
    buffer: &'a mut [u8],
    position: usize,
}

impl<'a> BufWriter<'a> {
    pub fn new(buffer: &'a mut [u8]) -> BufWriter<'a> {
        BufWriter {
            buffer,
            position: 0,
        }
    }

    pub fn remaining_capacity(&self) -> usize {
        self.buffer.len() - self.position
    }
}

impl PacketSink for BufWriter<'_> {
    fn write_byte(&mut self, byte: u8) -> Result<(), EncodeError> {
        if self.position == self.buffer.len() {
            return Err(EncodeError::NoMemory {
                needed: self.position + 1,
                available: self.buffer.len(),
            });
        }
        self.buffer[self.position] = byte;
        self.position += 1;
        Ok(())
    }

    fn write_slice(&mut self, slice: &[u8]) -> Result<(), EncodeError> {
        let end = self.position + slice.len();
        if end > self.buffer.len() {
            return Err(EncodeError::NoMemory {
                needed: end,
                available: self.buffer.len(),
            });
        }
        self.buffer[self.position..end].copy_from_slice(slice);
        self.position = end;
        Ok(())
    }

    fn written(&self) -> usize {
        self.position
    }
}

/// A sink that discards bytes and only counts them.
#[derive(Debug, Default)]
pub struct SizeSink {
    count: usize,
}

impl SizeSink {
    pub fn new() -> SizeSink {
        SizeSink::default()
    }
}

impl PacketSink for SizeSink {
    fn write_byte(&mut self, _byte: u8) -> Result<(), EncodeError> {
        self.count += 1;
        Ok(())
    }

    fn write_slice(&mut self, slice: &[u8]) -> Result<(), EncodeError> {
        self.count += slice.len();
        Ok(())
    }

    fn written(&self) -> usize {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::BufWriter;
    use super::PacketSink;
    use super::SizeSink;
    use crate::error::EncodeError;

    #[test]
    fn buf_writer_writes_forward() {
        let mut buffer = [0u8; 4];
        let mut writer = BufWriter::new(&mut buffer);

        writer.write_byte(0xAB).unwrap();
        writer.write_u16(0x0102).unwrap();
        assert_eq!(writer.written(), 3);
        assert_eq!(writer.remaining_capacity(), 1);
        assert_eq!(buffer, [0xAB, 0x01, 0x02, 0x00]);
    }

    #[test]
    fn buf_writer_rejects_overflow_without_moving() {
        let mut buffer = [0u8; 2];
        let mut writer = BufWriter::new(&mut buffer);

        writer.write_byte(0x01).unwrap();
        assert_eq!(
            writer.write_slice(&[0x02, 0x03]),
            Err(EncodeError::NoMemory {
                needed: 3,
                available: 2,
            })
        );
        assert_eq!(writer.written(), 1);
        assert_eq!(buffer, [0x01, 0x00]);
    }

    #[test]
    fn size_sink_counts_like_buf_writer_writes() {
        let mut sink = SizeSink::new();
        sink.write_byte(0xFF).unwrap();
        sink.write_u32(42).unwrap();
        sink.write_slice(&[1, 2, 3]).unwrap();
        assert_eq!(sink.written(), 8);
    }
}
