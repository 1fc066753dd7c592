//
//   This Source Code Form is subject to the terms of the Mozilla Public
//   License, v. 2.0. If a copy of the MPL was not distributed with this
//   file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
//! The MQTT UTF-8 string encoding
//!
//! A string is a two byte big-endian length prefix followed by that many
//! bytes of UTF-8. Decoding validates the UTF-8; the length prefix caps
//! strings at 65535 bytes.

use winnow::Bytes;
use winnow::Parser;
use winnow::binary::length_take;
use winnow::combinator::trace;
use winnow::error::ErrMode;
use winnow::error::FromExternalError;

use crate::ParseResult;
use crate::error::EncodeError;
use crate::integers::parse_u16;
use crate::write::PacketSink;

pub fn parse_string<'i>(input: &mut &'i Bytes) -> ParseResult<&'i str> {
    trace("mqtt_string", |input: &mut &'i Bytes| {
        let maybe_str = length_take(parse_u16).parse_next(input)?;

        core::str::from_utf8(maybe_str).map_err(|e| ErrMode::from_external_error(input, e))
    })
    .parse_next(input)
}

/// Parse a key/value pair of UTF-8 strings (the User Property payload).
pub fn parse_string_pair<'i>(input: &mut &'i Bytes) -> ParseResult<(&'i str, &'i str)> {
    trace("mqtt_string_pair", |input: &mut &'i Bytes| {
        let key = parse_string(input)?;
        let value = parse_string(input)?;

        Ok((key, value))
    })
    .parse_next(input)
}

#[inline]
pub fn string_binary_size(s: &str) -> usize {
    2 + s.len()
}

#[inline]
pub fn string_pair_binary_size(key: &str, value: &str) -> usize {
    string_binary_size(key) + string_binary_size(value)
}

pub fn write_string<W: PacketSink>(sink: &mut W, s: &str) -> Result<(), EncodeError> {
    let len: u16 = s
        .len()
        .try_into()
        .map_err(|_| EncodeError::BadParameter("string longer than 65535 bytes"))?;

    sink.write_u16(len)?;
    sink.write_slice(s.as_bytes())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use winnow::Bytes;

    use super::parse_string;
    use super::parse_string_pair;
    use super::string_binary_size;
    use super::write_string;
    use crate::test::collect_writes;

    #[test]
    fn check_simple_string() {
        let input = [0x0, 0x5, 0x41, 0xF0, 0xAA, 0x9B, 0x94];

        assert_eq!(parse_string(&mut Bytes::new(&input)).unwrap(), "A𪛔");
    }

    #[test]
    fn check_invalid_utf8_rejected() {
        let input = [0x0, 0x2, 0xC3, 0x28];

        parse_string(&mut Bytes::new(&input)).unwrap_err();
    }

    #[test]
    fn check_truncated_string_rejected() {
        let input = [0x0, 0x5, b'a', b'b'];

        parse_string(&mut Bytes::new(&input)).unwrap_err();
    }

    #[test]
    fn test_write_string() {
        let s = "foo bar baz";

        let bytes = collect_writes(|sink| write_string(sink, s));
        assert_eq!(bytes.len(), string_binary_size(s));

        let out = parse_string(&mut Bytes::new(&bytes)).unwrap();
        assert_eq!(out, s);
    }

    #[test]
    fn check_string_pair() {
        let input = [0x0, 0x1, b'a', 0x0, 0x2, b'b', b'c'];

        assert_eq!(
            parse_string_pair(&mut Bytes::new(&input)).unwrap(),
            ("a", "bc")
        );
    }
}
