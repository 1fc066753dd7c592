//
//   This Source Code Form is subject to the terms of the Mozilla Public
//   License, v. 2.0. If a copy of the MPL was not distributed with this
//   file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
//! The MQTT integer encodings
//!
//! Fixed-width integers are big-endian. The Variable Byte Integer packs
//! 7 data bits per byte, least significant group first, with the top bit
//! as continuation flag; encodings are 1 to 4 bytes long and must be
//! minimal.

use winnow::Bytes;
use winnow::Parser;
use winnow::combinator::trace;
use winnow::error::ParserError;
use winnow::token::take_while;

use crate::ParseResult;
use crate::error::EncodeError;
use crate::write::PacketSink;

/// Largest value expressible as a Variable Byte Integer.
pub const VARIABLE_INTEGER_MAX: u32 = 268_435_455;

pub fn parse_u16(input: &mut &Bytes) -> ParseResult<u16> {
    trace(
        "mqtt_u16",
        winnow::binary::u16(winnow::binary::Endianness::Big),
    )
    .parse_next(input)
}

pub fn parse_u32(input: &mut &Bytes) -> ParseResult<u32> {
    trace(
        "mqtt_u32",
        winnow::binary::u32(winnow::binary::Endianness::Big),
    )
    .parse_next(input)
}

/// Parse a Variable Byte Integer.
///
/// Generic over the stream so the fixed-header reader can run it on
/// [`winnow::Partial`] input, where running out of bytes reports
/// `Incomplete` instead of failing the parse.
///
/// A continuation bit on the fourth byte and non-minimal encodings
/// (a zero final group that a shorter encoding would not need) are both
/// rejected.
pub fn parse_variable_u32<'a, I>(input: &mut I) -> ParseResult<u32>
where
    I: winnow::stream::StreamIsPartial + winnow::stream::Stream<Token = u8>,
    <I as winnow::stream::Stream>::Slice: IntoIterator<Item = &'a u8>,
{
    trace("mqtt_variable_u32", |input: &mut I| {
        let var_bytes = (
            take_while(0..=3, |b| b & 0b1000_0000 != 0),
            winnow::binary::u8.verify(|b: &u8| b & 0b1000_0000 == 0),
        );
        let bytes = var_bytes.take().parse_next(input)?;

        let mut output: u32 = 0;
        let mut length: u32 = 0;

        for (exp, val) in bytes.into_iter().enumerate() {
            output += (*val as u32 & 0b0111_1111) * 128u32.pow(exp as u32);
            length += 1;
        }

        if length != variable_u32_binary_size(output) {
            return Err(ParserError::from_input(input));
        }

        Ok(output)
    })
    .parse_next(input)
}

/// Minimal encoded size of `value` as a Variable Byte Integer.
///
/// `value` must not exceed [`VARIABLE_INTEGER_MAX`].
#[inline]
pub const fn variable_u32_binary_size(value: u32) -> u32 {
    match value {
        0..=127 => 1,
        128..=16_383 => 2,
        16_384..=2_097_151 => 3,
        2_097_152..=268_435_455 => 4,
        _oversized => unreachable!(),
    }
}

pub fn write_variable_u32<W: PacketSink>(sink: &mut W, value: u32) -> Result<(), EncodeError> {
    match value {
        0..=127 => {
            sink.write_byte(value as u8)?;
        }
        len @ 128..=16_383 => {
            sink.write_byte(((len % 128) | 0b1000_0000) as u8)?;
            sink.write_byte((len / 128) as u8)?;
        }
        len @ 16_384..=2_097_151 => {
            sink.write_byte(((len % 128) | 0b1000_0000) as u8)?;
            sink.write_byte((((len / 128) % 128) | 0b1000_0000) as u8)?;
            sink.write_byte((len / (128 * 128)) as u8)?;
        }
        len @ 2_097_152..=268_435_455 => {
            sink.write_byte(((len % 128) | 0b1000_0000) as u8)?;
            sink.write_byte((((len / 128) % 128) | 0b1000_0000) as u8)?;
            sink.write_byte((((len / (128 * 128)) % 128) | 0b1000_0000) as u8)?;
            sink.write_byte((len / (128 * 128 * 128)) as u8)?;
        }
        _oversized => {
            return Err(EncodeError::BadParameter(
                "value exceeds the Variable Byte Integer maximum",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use core::num::NonZeroUsize;

    use pretty_assertions::assert_eq;
    use winnow::Bytes;
    use winnow::Partial;
    use winnow::error::ErrMode;

    use super::VARIABLE_INTEGER_MAX;
    use super::parse_u16;
    use super::parse_u32;
    use super::parse_variable_u32;
    use super::variable_u32_binary_size;
    use super::write_variable_u32;
    use crate::error::EncodeError;
    use crate::test::collect_writes;

    #[test]
    fn check_integer_parsing() {
        let input = 15u16.to_be_bytes();
        assert_eq!(parse_u16(&mut Bytes::new(&input)).unwrap(), 15);

        let input = 42u32.to_be_bytes();
        assert_eq!(parse_u32(&mut Bytes::new(&input)).unwrap(), 42);
    }

    #[test]
    fn check_variable_integer_boundaries() {
        let cases: &[(&[u8], u32)] = &[
            (&[0x00], 0),
            (&[0x7F], 127),
            (&[0x80, 0x01], 128),
            (&[0xFF, 0x7F], 16_383),
            (&[0x80, 0x80, 0x01], 16_384),
            (&[0xFF, 0xFF, 0x7F], 2_097_151),
            (&[0x80, 0x80, 0x80, 0x01], 2_097_152),
            (&[0xFF, 0xFF, 0xFF, 0x7F], 268_435_455),
        ];

        for (input, expected) in cases {
            assert_eq!(
                parse_variable_u32(&mut Bytes::new(input)).unwrap(),
                *expected
            );
        }

        let input = [0xFF, 0xFF, 0xFF, 0x8F];
        parse_variable_u32(&mut Bytes::new(&input)).unwrap_err();
    }

    #[test]
    fn check_non_minimal_encoding_rejected() {
        // 0 encoded over two bytes
        let input = [0x80, 0x00];
        parse_variable_u32(&mut Bytes::new(&input)).unwrap_err();

        // 127 padded with an empty continuation group
        let input = [0xFF, 0x00];
        parse_variable_u32(&mut Bytes::new(&input)).unwrap_err();
    }

    #[test]
    fn check_incomplete_parsing() {
        let input = [0xFF];
        assert_eq!(
            parse_variable_u32(&mut Partial::new(Bytes::new(&input))).unwrap_err(),
            ErrMode::Incomplete(winnow::error::Needed::Size(NonZeroUsize::new(1).unwrap()))
        );

        let input = [0xFF, 0xFF, 0xFF];
        assert_eq!(
            parse_variable_u32(&mut Partial::new(Bytes::new(&input))).unwrap_err(),
            ErrMode::Incomplete(winnow::error::Needed::Size(NonZeroUsize::new(1).unwrap()))
        );

        let input = [0xFF, 0xFF, 0xFF, 0xFF];
        assert!(matches!(
            parse_variable_u32(&mut Partial::new(Bytes::new(&input))).unwrap_err(),
            ErrMode::Backtrack(_)
        ));
    }

    #[test]
    fn check_known_encodings() {
        let bytes = collect_writes(|sink| write_variable_u32(sink, 16_384));
        assert_eq!(bytes, &[0x80, 0x80, 0x01]);

        let bytes = collect_writes(|sink| write_variable_u32(sink, 0));
        assert_eq!(bytes, &[0x00]);
    }

    #[test]
    fn check_oversized_value_refused() {
        let mut buffer = [0u8; 8];
        let mut writer = crate::write::BufWriter::new(&mut buffer);
        let result = write_variable_u32(&mut writer, VARIABLE_INTEGER_MAX + 1);
        assert!(matches!(result, Err(EncodeError::BadParameter(_))));
    }

    #[test]
    fn check_roundtrip_and_minimality() {
        // step by some prime number
        for i in (0..268_435_455u32).step_by(65_537) {
            let bytes = collect_writes(|sink| write_variable_u32(sink, i));
            assert_eq!(bytes.len() as u32, variable_u32_binary_size(i));

            let out = parse_variable_u32(&mut Bytes::new(&bytes)).unwrap();
            assert_eq!(out, i);
        }
    }
}
