//
//   This Source Code Form is subject to the terms of the Mozilla Public
//   License, v. 2.0. If a copy of the MPL was not distributed with this
//   file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
//! The QoS acknowledgement family: PUBACK, PUBREC, PUBREL, PUBCOMP
//!
//! All four share one wire shape. On the short end, a remaining length
//! of exactly 2 carries just the packet identifier and implies a
//! success reason; 3 adds the reason byte; anything longer also carries
//! a property block. Outgoing acks always use the full form.

use core::num::NonZeroU16;

use winnow::Bytes;

use crate::error::DecodeError;
use crate::error::EncodeError;
use crate::fixed_header::PacketInfo;
use crate::fixed_header::PacketType;
use crate::packets::PacketSize;
use crate::packets::check_max_packet_size;
use crate::packets::finish_packet_size;
use crate::packets::measure_body;
use crate::packets::serialize_packet;
use crate::packets::take_packet_identifier;
use crate::packets::write_property_block;
use crate::properties::PropertyBuilder;
use crate::properties::PropertyId;
use crate::properties::PropertyReader;
use crate::write::PacketSink;

crate::reason_code::make_combined_reason_code! {
    pub enum PubackReasonCode {
        Success = crate::reason_code::Success,
        NoMatchingSubscribers = crate::reason_code::NoMatchingSubscribers,
        UnspecifiedError = crate::reason_code::UnspecifiedError,
        ImplementationSpecificError = crate::reason_code::ImplementationSpecificError,
        NotAuthorized = crate::reason_code::NotAuthorized,
        TopicNameInvalid = crate::reason_code::TopicNameInvalid,
        PacketIdentifierInUse = crate::reason_code::PacketIdentifierInUse,
        QuotaExceeded = crate::reason_code::QuotaExceeded,
        PayloadFormatInvalid = crate::reason_code::PayloadFormatInvalid,
    }
}

crate::reason_code::make_combined_reason_code! {
    pub enum PubrelReasonCode {
        Success = crate::reason_code::Success,
        PacketIdentifierNotFound = crate::reason_code::PacketIdentifierNotFound,
    }
}

/// Which of the four acknowledgement packets to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckKind {
    Puback,
    Pubrec,
    Pubrel,
    Pubcomp,
}

impl AckKind {
    fn packet_type(self) -> PacketType {
        match self {
            AckKind::Puback => PacketType::Puback,
            AckKind::Pubrec => PacketType::Pubrec,
            AckKind::Pubrel => PacketType::Pubrel,
            AckKind::Pubcomp => PacketType::Pubcomp,
        }
    }

    /// Validate `code` against this packet type's legal reason codes.
    fn check_reason_code(self, code: u8) -> Result<(), EncodeError> {
        let legal = match self {
            AckKind::Puback | AckKind::Pubrec => PubackReasonCode::try_from(code).is_ok(),
            AckKind::Pubrel | AckKind::Pubcomp => PubrelReasonCode::try_from(code).is_ok(),
        };
        if !legal {
            return Err(EncodeError::BadParameter(
                "reason code is not legal for this packet type",
            ));
        }
        Ok(())
    }
}

fn write_ack_body<W: PacketSink>(
    sink: &mut W,
    packet_identifier: u16,
    reason_code: u8,
    properties: Option<&PropertyBuilder<'_>>,
) -> Result<(), EncodeError> {
    sink.write_u16(packet_identifier)?;
    sink.write_byte(reason_code)?;
    write_property_block(sink, properties)
}

/// Compute the Remaining Length and total size of an outgoing ack.
pub fn ack_packet_size(
    properties: Option<&PropertyBuilder<'_>>,
    max_packet_size: u32,
) -> Result<PacketSize, EncodeError> {
    check_max_packet_size(max_packet_size)?;

    let remaining_length = measure_body(|sink| write_ack_body(sink, 0, 0, properties))?;

    finish_packet_size(remaining_length, max_packet_size)
}

/// Serialize a PUBACK, PUBREC, PUBREL or PUBCOMP.
pub fn serialize_ack(
    kind: AckKind,
    packet_identifier: u16,
    reason_code: u8,
    properties: Option<&PropertyBuilder<'_>>,
    remaining_length: usize,
    buffer: &mut [u8],
) -> Result<usize, EncodeError> {
    if packet_identifier == 0 {
        return Err(EncodeError::BadParameter("packet identifier is zero"));
    }
    kind.check_reason_code(reason_code)?;

    serialize_packet(
        buffer,
        kind.packet_type().byte(),
        remaining_length,
        |w| write_ack_body(w, packet_identifier, reason_code, properties),
    )
}

/// A received acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AckInfo<'i, R> {
    pub packet_identifier: NonZeroU16,
    pub reason_code: R,
    /// Empty for the short forms.
    pub properties: PropertyReader<'i>,
}

const ACK_LEGAL_PROPERTIES: &[PropertyId] = &[PropertyId::ReasonString, PropertyId::UserProperty];

fn deserialize_ack_packet<'i, R>(
    packet: &PacketInfo<'i>,
    expected: PacketType,
    success: R,
    request_problem_info: bool,
    max_packet_size: u32,
) -> Result<AckInfo<'i, R>, DecodeError>
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
    if packet.remaining_length() < 2 {
        return Err(DecodeError::Malformed("ack remaining length too small"));
    }

    let mut input = Bytes::new(packet.remaining_data);
    let packet_identifier = take_packet_identifier(&mut input)?;

    // remaining length 2: no reason code on the wire means success
    let reason_code = if input.is_empty() {
        success
    } else {
        let byte = crate::packets::take_u8(&mut input)?;
        R::try_from(byte).map_err(|_| DecodeError::Malformed("illegal reason code"))?
    };

    let block = if input.is_empty() {
        &[][..]
    } else {
        let block = crate::properties::parse_property_block(&mut input)
            .map_err(|e| DecodeError::from_parse_error(e, "property length exceeds the packet"))?;
        if !input.is_empty() {
            return Err(DecodeError::Malformed(
                "trailing bytes after the property block",
            ));
        }
        if !block.is_empty() && !request_problem_info {
            return Err(DecodeError::Malformed(
                "the server sent problem information although it was not requested",
            ));
        }
        crate::properties::validate_block(block, ACK_LEGAL_PROPERTIES)?;
        block
    };

    Ok(AckInfo {
        packet_identifier,
        reason_code,
        properties: PropertyReader::new(block),
    })
}

macro_rules! make_ack_deserializer {
    ($kind:ident, $reason:ty) => {
        paste::paste! {
            #[doc = concat!(
                "Deserialize a received ", stringify!([<$kind:upper>]), ".\n\n",
                "`request_problem_info` must reflect what the client declared in \
                 its CONNECT: when problem information was declined, a property \
                 block on the ack is a protocol error. `max_packet_size` is the \
                 client's own declared limit."
            )]
            pub fn [<deserialize_ $kind:lower>]<'i>(
                packet: &PacketInfo<'i>,
                request_problem_info: bool,
                max_packet_size: u32,
            ) -> Result<AckInfo<'i, $reason>, DecodeError> {
                deserialize_ack_packet(
                    packet,
                    PacketType::$kind,
                    <$reason>::Success,
                    request_problem_info,
                    max_packet_size,
                )
            }
        }
    };
}

make_ack_deserializer!(Puback, PubackReasonCode);
make_ack_deserializer!(Pubrec, PubackReasonCode);
make_ack_deserializer!(Pubrel, PubrelReasonCode);
make_ack_deserializer!(Pubcomp, PubrelReasonCode);
