//
//   This Source Code Form is subject to the terms of the Mozilla Public
//   License, v. 2.0. If a copy of the MPL was not distributed with this
//   file, You can obtain one at http://mozilla.org/MPL/2.0/.
//

use crate::error::EncodeError;
use crate::fixed_header::PacketType;
use crate::packets::PacketSize;
use crate::packets::check_max_packet_size;
use crate::packets::finish_packet_size;
use crate::packets::measure_body;
use crate::packets::serialize_packet;
use crate::packets::write_property_block;
use crate::properties::PropertyBuilder;
use crate::write::PacketSink;

fn validate_filters(topic_filters: &[&str]) -> Result<(), EncodeError> {
    if topic_filters.is_empty() {
        return Err(EncodeError::BadParameter("no topic filters given"));
    }
    for filter in topic_filters {
        if filter.is_empty() {
            return Err(EncodeError::BadParameter("topic filter is empty"));
        }
        if filter.len() > u16::MAX as usize {
            return Err(EncodeError::BadParameter(
                "topic filter longer than 65535 bytes",
            ));
        }
    }
    Ok(())
}

fn write_unsubscribe_body<W: PacketSink>(
    sink: &mut W,
    packet_identifier: u16,
    topic_filters: &[&str],
    properties: Option<&PropertyBuilder<'_>>,
) -> Result<(), EncodeError> {
    sink.write_u16(packet_identifier)?;
    write_property_block(sink, properties)?;

    for filter in topic_filters {
        crate::strings::write_string(sink, filter)?;
    }

    Ok(())
}

/// Compute the Remaining Length and total size of an UNSUBSCRIBE
/// packet. Only user properties are legal here.
pub fn unsubscribe_packet_size(
    topic_filters: &[&str],
    properties: Option<&PropertyBuilder<'_>>,
    max_packet_size: u32,
) -> Result<PacketSize, EncodeError> {
    check_max_packet_size(max_packet_size)?;
    validate_filters(topic_filters)?;

    let remaining_length =
        measure_body(|sink| write_unsubscribe_body(sink, 0, topic_filters, properties))?;

    finish_packet_size(remaining_length, max_packet_size)
}

/// Serialize an UNSUBSCRIBE packet into `buffer`.
pub fn serialize_unsubscribe(
    topic_filters: &[&str],
    properties: Option<&PropertyBuilder<'_>>,
    packet_identifier: u16,
    remaining_length: usize,
    buffer: &mut [u8],
) -> Result<usize, EncodeError> {
    if packet_identifier == 0 {
        return Err(EncodeError::BadParameter("packet identifier is zero"));
    }
    validate_filters(topic_filters)?;

    serialize_packet(
        buffer,
        PacketType::Unsubscribe.byte(),
        remaining_length,
        |w| write_unsubscribe_body(w, packet_identifier, topic_filters, properties),
    )
}
