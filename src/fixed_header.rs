//
//   This Source Code Form is subject to the terms of the Mozilla Public
//   License, v. 2.0. If a copy of the MPL was not distributed with this
//   file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
//! The MQTT fixed header
//!
//! The first byte of every packet carries the packet type in the upper
//! nibble and type-specific flags in the lower nibble. Most types
//! mandate a fixed flag pattern; PUBLISH encodes DUP/QoS/RETAIN there.

use crate::error::DecodeError;
use crate::integers::variable_u32_binary_size;
use crate::qos::QualityOfService;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PacketType {
    Connect,
    Connack,
    Publish {
        dup: bool,
        qos: QualityOfService,
        retain: bool,
    },
    Puback,
    Pubrec,
    Pubrel,
    Pubcomp,
    Subscribe,
    Suback,
    Unsubscribe,
    Unsuback,
    Pingreq,
    Pingresp,
    Disconnect,
}

impl PacketType {
    /// Decode the first byte of a packet, enforcing the flag patterns
    /// the specification mandates per type.
    pub fn from_byte(byte: u8) -> Result<PacketType, DecodeError> {
        let packet_type = match (byte >> 4, byte & 0x0F) {
            (1, 0) => PacketType::Connect,
            (2, 0) => PacketType::Connack,
            (3, flags) => PacketType::Publish {
                dup: (flags & 0b1000) != 0,
                qos: QualityOfService::try_from((flags & 0b0110) >> 1)
                    .map_err(|_| DecodeError::Malformed("PUBLISH flags carry QoS 3"))?,
                retain: (flags & 0b0001) != 0,
            },
            (4, 0) => PacketType::Puback,
            (5, 0) => PacketType::Pubrec,
            (6, 0b0010) => PacketType::Pubrel,
            (7, 0) => PacketType::Pubcomp,
            (8, 0b0010) => PacketType::Subscribe,
            (9, 0) => PacketType::Suback,
            (10, 0b0010) => PacketType::Unsubscribe,
            (11, 0) => PacketType::Unsuback,
            (12, 0) => PacketType::Pingreq,
            (13, 0) => PacketType::Pingresp,
            (14, 0) => PacketType::Disconnect,
            _ => {
                return Err(DecodeError::Malformed(
                    "unknown packet type or reserved flag bits set",
                ));
            }
        };

        Ok(packet_type)
    }

    /// The fixed-header byte for this packet type.
    pub fn byte(self) -> u8 {
        #[allow(clippy::identity_op)]
        match self {
            PacketType::Connect => (1 << 4) | 0,
            PacketType::Connack => (2 << 4) | 0,
            PacketType::Publish { dup, qos, retain } => {
                let lower = ((dup as u8) << 3) | (u8::from(qos) << 1) | retain as u8;
                (3 << 4) | lower
            }
            PacketType::Puback => (4 << 4) | 0,
            PacketType::Pubrec => (5 << 4) | 0,
            PacketType::Pubrel => (6 << 4) | 0b0010,
            PacketType::Pubcomp => (7 << 4) | 0,
            PacketType::Subscribe => (8 << 4) | 0b0010,
            PacketType::Suback => (9 << 4) | 0,
            PacketType::Unsubscribe => (10 << 4) | 0b0010,
            PacketType::Unsuback => (11 << 4) | 0,
            PacketType::Pingreq => (12 << 4) | 0,
            PacketType::Pingresp => (13 << 4) | 0,
            PacketType::Disconnect => (14 << 4) | 0,
        }
    }

    /// Whether a client may legally receive this packet type.
    pub fn is_client_incoming(self) -> bool {
        matches!(
            self,
            PacketType::Connack
                | PacketType::Publish { .. }
                | PacketType::Puback
                | PacketType::Pubrec
                | PacketType::Pubrel
                | PacketType::Pubcomp
                | PacketType::Suback
                | PacketType::Unsuback
                | PacketType::Pingresp
                | PacketType::Disconnect
        )
    }
}

/// Packet type and length information produced by the header-reading
/// entry points, before the packet body has been buffered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Raw first byte, type nibble plus flags.
    pub packet_type: u8,
    /// Declared length of everything after the fixed header.
    pub remaining_length: usize,
    /// Bytes occupied by the fixed header itself (type byte plus the
    /// encoded remaining length).
    pub header_length: usize,
}

impl PacketHeader {
    /// Size of the whole packet once the remaining bytes have arrived.
    pub fn total_length(&self) -> usize {
        self.header_length + self.remaining_length
    }
}

/// One received, already-framed packet.
///
/// `remaining_data` holds exactly the packet's remaining-length bytes;
/// the deserializers borrow from it.
#[derive(Debug, Clone, Copy)]
pub struct PacketInfo<'i> {
    /// Raw first byte, type nibble plus flags.
    pub packet_type: u8,
    /// The packet's bytes after the fixed header.
    pub remaining_data: &'i [u8],
}

impl<'i> PacketInfo<'i> {
    pub fn remaining_length(&self) -> usize {
        self.remaining_data.len()
    }

    /// Size of the packet as it appeared on the wire.
    pub fn total_length(&self) -> usize {
        let remaining = self.remaining_data.len();
        1 + variable_u32_binary_size(remaining as u32) as usize + remaining
    }

    pub fn packet_type(&self) -> Result<PacketType, DecodeError> {
        PacketType::from_byte(self.packet_type)
    }
}
