//
//   This Source Code Form is subject to the terms of the Mozilla Public
//   License, v. 2.0. If a copy of the MPL was not distributed with this
//   file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
//! The MQTT binary data encoding
//!
//! Like a string, but without the UTF-8 requirement: a two byte
//! big-endian length prefix followed by raw bytes.

use winnow::Bytes;
use winnow::Parser;
use winnow::binary::length_take;
use winnow::combinator::trace;

use crate::ParseResult;
use crate::error::EncodeError;
use crate::write::PacketSink;

pub fn parse_binary_data<'i>(input: &mut &'i Bytes) -> ParseResult<&'i [u8]> {
    trace("mqtt_binary_data", |input: &mut &'i Bytes| {
        length_take(crate::integers::parse_u16).parse_next(input)
    })
    .parse_next(input)
}

#[inline]
pub fn binary_data_binary_size(data: &[u8]) -> usize {
    2 + data.len()
}

pub fn write_binary_data<W: PacketSink>(sink: &mut W, data: &[u8]) -> Result<(), EncodeError> {
    let len: u16 = data
        .len()
        .try_into()
        .map_err(|_| EncodeError::BadParameter("binary data longer than 65535 bytes"))?;

    sink.write_u16(len)?;
    sink.write_slice(data)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use winnow::Bytes;

    use super::parse_binary_data;
    use super::write_binary_data;
    use crate::test::collect_writes;

    #[test]
    fn check_binary_data() {
        let input = &[0x0, 0x2, 0x4, 0x2];

        assert_eq!(
            parse_binary_data(&mut Bytes::new(input)).unwrap(),
            &[0x4, 0x2]
        );
    }

    #[test]
    fn test_write_binary_data() {
        let data = &[0xFF, 0xAB, 0x42, 0x13, 0x37, 0x69];

        let bytes = collect_writes(|sink| write_binary_data(sink, data));
        let out = parse_binary_data(&mut Bytes::new(&bytes)).unwrap();

        assert_eq!(out, data);
    }
}
