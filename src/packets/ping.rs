//
//   This Source Code Form is subject to the terms of the Mozilla Public
//   License, v. 2.0. If a copy of the MPL was not distributed with this
//   file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
//! PINGREQ and PINGRESP carry nothing but their fixed header.

use crate::error::DecodeError;
use crate::error::EncodeError;
use crate::fixed_header::PacketInfo;
use crate::fixed_header::PacketType;
use crate::packets::PacketSize;
use crate::packets::serialize_packet;

pub fn pingreq_packet_size() -> PacketSize {
    PacketSize {
        remaining_length: 0,
        packet_size: 2,
    }
}

pub fn serialize_pingreq(buffer: &mut [u8]) -> Result<usize, EncodeError> {
    serialize_packet(buffer, PacketType::Pingreq.byte(), 0, |_| Ok(()))
}

pub fn deserialize_pingresp(packet: &PacketInfo<'_>) -> Result<(), DecodeError> {
    if packet.packet_type()? != PacketType::Pingresp {
        return Err(DecodeError::BadParameter("packet is not a PINGRESP"));
    }
    if !packet.remaining_data.is_empty() {
        return Err(DecodeError::Malformed("PINGRESP carries data"));
    }
    Ok(())
}
