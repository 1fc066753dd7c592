//
//   This Source Code Form is subject to the terms of the Mozilla Public
//   License, v. 2.0. If a copy of the MPL was not distributed with this
//   file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
//! Per-packet size calculation, serialization and deserialization
//!
//! Each outgoing packet type follows the same protocol: ask the
//! `*_packet_size` function for the remaining length and total size,
//! then hand the same inputs plus the remaining length to the
//! `serialize_*` function. Both run the identical body-writing code
//! (the size pass against a counting sink), so a buffer of the computed
//! size is always sufficient and always exactly filled.

use core::marker::PhantomData;
use core::num::NonZeroU16;

use winnow::Bytes;

use crate::error::DecodeError;
use crate::error::EncodeError;
use crate::integers::VARIABLE_INTEGER_MAX;
use crate::integers::variable_u32_binary_size;
use crate::integers::write_variable_u32;
use crate::properties::PropertyBuilder;
use crate::write::BufWriter;
use crate::write::PacketSink;
use crate::write::SizeSink;

pub mod ack;
pub mod connack;
pub mod connect;
pub mod disconnect;
pub mod ping;
pub mod publish;
pub mod suback;
pub mod subscribe;
pub mod unsuback;
pub mod unsubscribe;

pub use self::ack::AckInfo;
pub use self::connect::ConnectInfo;
pub use self::connect::WillInfo;
pub use self::disconnect::DisconnectInfo;
pub use self::publish::IncomingPublish;
pub use self::publish::PublishInfo;
pub use self::suback::SubackInfo;
pub use self::subscribe::Subscription;
pub use self::unsuback::UnsubackInfo;

/// The two sizes a serializer needs: MQTT's Remaining Length and the
/// size of the whole packet including the fixed header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketSize {
    pub remaining_length: usize,
    pub packet_size: usize,
}

/// Validate a computed remaining length against the protocol ceiling
/// and the negotiated maximum packet size, and derive the total size.
pub(crate) fn finish_packet_size(
    remaining_length: usize,
    max_packet_size: u32,
) -> Result<PacketSize, EncodeError> {
    if remaining_length > VARIABLE_INTEGER_MAX as usize {
        return Err(EncodeError::BadParameter(
            "packet exceeds the protocol's maximum remaining length",
        ));
    }

    let packet_size =
        1 + variable_u32_binary_size(remaining_length as u32) as usize + remaining_length;
    if packet_size > max_packet_size as usize {
        return Err(EncodeError::BadParameter(
            "packet exceeds the negotiated maximum packet size",
        ));
    }

    Ok(PacketSize {
        remaining_length,
        packet_size,
    })
}

pub(crate) fn check_max_packet_size(max_packet_size: u32) -> Result<(), EncodeError> {
    if max_packet_size == 0 {
        return Err(EncodeError::BadParameter("maximum packet size must not be 0"));
    }
    Ok(())
}

/// Run a body writer against the counting sink and report the bytes it
/// would produce.
pub(crate) fn measure_body<F>(body: F) -> Result<usize, EncodeError>
where
    F: FnOnce(&mut SizeSink) -> Result<(), EncodeError>,
{
    let mut sink = SizeSink::new();
    body(&mut sink)?;
    Ok(sink.written())
}

/// Write fixed header byte, remaining length, and the packet body into
/// `buffer`, verifying capacity up front so nothing is partially
/// written.
pub(crate) fn serialize_packet<F>(
    buffer: &mut [u8],
    first_byte: u8,
    remaining_length: usize,
    body: F,
) -> Result<usize, EncodeError>
where
    F: FnOnce(&mut BufWriter<'_>) -> Result<(), EncodeError>,
{
    if remaining_length > VARIABLE_INTEGER_MAX as usize {
        return Err(EncodeError::BadParameter(
            "packet exceeds the protocol's maximum remaining length",
        ));
    }

    let packet_size =
        1 + variable_u32_binary_size(remaining_length as u32) as usize + remaining_length;
    if buffer.len() < packet_size {
        return Err(EncodeError::NoMemory {
            needed: packet_size,
            available: buffer.len(),
        });
    }

    let mut writer = BufWriter::new(buffer);
    writer.write_byte(first_byte)?;
    write_variable_u32(&mut writer, remaining_length as u32)?;
    body(&mut writer)?;
    debug_assert_eq!(writer.written(), packet_size);

    Ok(packet_size)
}

/// The property block as serialized inside a packet: its length as a
/// Variable Byte Integer, then the built property bytes. No properties
/// is a single `0x00`.
pub(crate) fn write_property_block<W: PacketSink>(
    sink: &mut W,
    properties: Option<&PropertyBuilder<'_>>,
) -> Result<(), EncodeError> {
    let bytes = properties.map(|p| p.as_bytes()).unwrap_or(&[]);
    write_variable_u32(sink, bytes.len() as u32)?;
    sink.write_slice(bytes)
}

/// Read one byte off a packet, mapping exhaustion to `Malformed`.
pub(crate) fn take_u8(input: &mut &Bytes) -> Result<u8, DecodeError> {
    let result: crate::ParseResult<u8> =
        winnow::Parser::parse_next(&mut winnow::binary::u8, input);
    result.map_err(|e| DecodeError::from_parse_error(e, "truncated packet"))
}

/// Parse a packet identifier that the protocol forbids to be zero.
pub(crate) fn take_packet_identifier(input: &mut &Bytes) -> Result<NonZeroU16, DecodeError> {
    let value = crate::integers::parse_u16(input)
        .map_err(|e| DecodeError::from_parse_error(e, "truncated packet identifier"))?;
    NonZeroU16::new(value).ok_or(DecodeError::Malformed("packet identifier is zero"))
}

/// Shared shape of SUBACK and UNSUBACK: packet identifier, property
/// block, then one reason code per topic filter of the original
/// request.
pub(crate) fn deserialize_subscription_ack<'i, R>(
    packet: &crate::fixed_header::PacketInfo<'i>,
    expected: crate::fixed_header::PacketType,
    request_problem_info: bool,
    max_packet_size: u32,
) -> Result<
    (
        NonZeroU16,
        crate::properties::PropertyReader<'i>,
        ReasonCodeInfo<'i, R>,
    ),
    DecodeError,
>
where
    R: TryFrom<u8> + Copy,
{
    if max_packet_size == 0 {
        return Err(DecodeError::BadParameter("maximum packet size must not be 0"));
    }
    if packet.total_length() > max_packet_size as usize {
        return Err(DecodeError::Malformed(
            "packet exceeds the declared maximum packet size",
        ));
    }
    if packet.packet_type()? != expected {
        return Err(DecodeError::BadParameter(
            "packet type does not match the requested ack",
        ));
    }
    // identifier, property length field, and at least one reason code
    if packet.remaining_length() < 4 {
        return Err(DecodeError::Malformed("ack remaining length too small"));
    }

    let mut input = Bytes::new(packet.remaining_data);
    let packet_identifier = take_packet_identifier(&mut input)?;

    let block = crate::properties::parse_property_block(&mut input)
        .map_err(|e| DecodeError::from_parse_error(e, "property length exceeds the packet"))?;
    if !block.is_empty() && !request_problem_info {
        return Err(DecodeError::Malformed(
            "the server sent problem information although it was not requested",
        ));
    }
    crate::properties::validate_block(
        block,
        &[
            crate::properties::PropertyId::ReasonString,
            crate::properties::PropertyId::UserProperty,
        ],
    )?;

    let codes: &'i [u8] = input;
    let reason_codes = ReasonCodeInfo::validate(codes)?;

    Ok((
        packet_identifier,
        crate::properties::PropertyReader::new(block),
        reason_codes,
    ))
}

/// The borrowed per-topic reason codes of a SUBACK or UNSUBACK payload.
///
/// Validated once at deserialization time against the packet's legal
/// code table; afterwards every byte converts cleanly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReasonCodeInfo<'i, R> {
    codes: &'i [u8],
    _kind: PhantomData<R>,
}

impl<'i, R> ReasonCodeInfo<'i, R>
where
    R: TryFrom<u8> + Copy,
{
    /// Validate every byte of `codes` against `R`'s table.
    pub(crate) fn validate(codes: &'i [u8]) -> Result<ReasonCodeInfo<'i, R>, DecodeError> {
        if codes.is_empty() {
            return Err(DecodeError::Malformed(
                "the packet carries no reason codes",
            ));
        }
        for code in codes {
            R::try_from(*code).map_err(|_| DecodeError::Malformed("illegal reason code"))?;
        }
        Ok(ReasonCodeInfo {
            codes,
            _kind: PhantomData,
        })
    }

    /// One entry per topic filter of the originating request.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<R> {
        self.codes.get(index).map(|code| {
            R::try_from(*code)
                .unwrap_or_else(|_| unreachable!("validated at deserialization time"))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = R> + '_ {
        self.codes.iter().map(|code| {
            R::try_from(*code)
                .unwrap_or_else(|_| unreachable!("validated at deserialization time"))
        })
    }
}
