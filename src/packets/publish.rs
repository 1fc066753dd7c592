//
//   This Source Code Form is subject to the terms of the Mozilla Public
//   License, v. 2.0. If a copy of the MPL was not distributed with this
//   file, You can obtain one at http://mozilla.org/MPL/2.0/.
//

use core::num::NonZeroU16;

use winnow::Bytes;

use crate::connection::ConnectionProperties;
use crate::error::DecodeError;
use crate::error::EncodeError;
use crate::fixed_header::PacketInfo;
use crate::fixed_header::PacketType;
use crate::integers::VARIABLE_INTEGER_MAX;
use crate::integers::variable_u32_binary_size;
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
use crate::properties::PropertySet;
use crate::qos::QualityOfService;
use crate::write::BufWriter;
use crate::write::PacketSink;

/// Outgoing PUBLISH packet parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishInfo<'i> {
    pub qos: QualityOfService,
    pub retain: bool,
    pub duplicate: bool,
    /// May be empty when a Topic Alias property stands in for it.
    pub topic_name: &'i str,
    /// Required non-zero for QoS 1 and 2, ignored for QoS 0.
    pub packet_identifier: u16,
    pub payload: &'i [u8],
}

/// Check an outgoing publish against the server's advertised
/// capabilities before sizing it.
pub fn validate_publish_params(
    info: &PublishInfo<'_>,
    connection: &ConnectionProperties,
) -> Result<(), EncodeError> {
    if info.retain && !connection.retain_available {
        return Err(EncodeError::BadParameter(
            "the server does not support retained messages",
        ));
    }
    if u8::from(info.qos) > connection.server_max_qos {
        return Err(EncodeError::BadParameter(
            "QoS exceeds the server's maximum QoS",
        ));
    }
    if info.qos != QualityOfService::AtMostOnce && info.packet_identifier == 0 {
        return Err(EncodeError::BadParameter(
            "QoS>0 publish needs a non-zero packet identifier",
        ));
    }
    check_max_packet_size(connection.server_max_packet_size)?;

    Ok(())
}

fn validate_publish_inputs(
    info: &PublishInfo<'_>,
    properties: Option<&PropertyBuilder<'_>>,
) -> Result<(), EncodeError> {
    if info.topic_name.len() > u16::MAX as usize {
        return Err(EncodeError::BadParameter(
            "topic name longer than 65535 bytes",
        ));
    }
    // An absent topic name is only legal when an alias takes its place.
    if info.topic_name.is_empty()
        && !properties.is_some_and(|p| p.contains(PropertyId::TopicAlias))
    {
        return Err(EncodeError::BadParameter(
            "publish has neither a topic name nor a topic alias",
        ));
    }
    if info.qos != QualityOfService::AtMostOnce && info.packet_identifier == 0 {
        return Err(EncodeError::BadParameter(
            "QoS>0 publish needs a non-zero packet identifier",
        ));
    }

    Ok(())
}

fn write_publish_header_body<W: PacketSink>(
    sink: &mut W,
    info: &PublishInfo<'_>,
    properties: Option<&PropertyBuilder<'_>>,
) -> Result<(), EncodeError> {
    crate::strings::write_string(sink, info.topic_name)?;
    if info.qos != QualityOfService::AtMostOnce {
        sink.write_u16(info.packet_identifier)?;
    }
    write_property_block(sink, properties)
}

/// Compute the Remaining Length and total size of a PUBLISH packet.
///
/// [`validate_publish_params`] is expected to have passed on the same
/// inputs; this function re-checks only the topic-name-or-alias rule
/// and structural bounds.
pub fn publish_packet_size(
    info: &PublishInfo<'_>,
    properties: Option<&PropertyBuilder<'_>>,
    max_packet_size: u32,
) -> Result<PacketSize, EncodeError> {
    check_max_packet_size(max_packet_size)?;
    validate_publish_inputs(info, properties)?;

    let header = measure_body(|sink| write_publish_header_body(sink, info, properties))?;
    let remaining_length = header + info.payload.len();

    finish_packet_size(remaining_length, max_packet_size)
}

fn publish_first_byte(info: &PublishInfo<'_>) -> u8 {
    PacketType::Publish {
        dup: info.duplicate,
        qos: info.qos,
        retain: info.retain,
    }
    .byte()
}

/// Serialize a complete PUBLISH packet, payload included.
pub fn serialize_publish(
    info: &PublishInfo<'_>,
    properties: Option<&PropertyBuilder<'_>>,
    remaining_length: usize,
    buffer: &mut [u8],
) -> Result<usize, EncodeError> {
    validate_publish_inputs(info, properties)?;

    serialize_packet(buffer, publish_first_byte(info), remaining_length, |w| {
        write_publish_header_body(w, info, properties)?;
        w.write_slice(info.payload)
    })
}

/// Serialize everything up to, but excluding, the payload.
///
/// For large payloads this lets the transport send the caller's payload
/// buffer as a second write instead of copying it. `remaining_length`
/// is still the full packet's, payload included, and the emitted bytes
/// are identical to the corresponding prefix of [`serialize_publish`].
/// Returns the header's exact length.
pub fn serialize_publish_header(
    info: &PublishInfo<'_>,
    properties: Option<&PropertyBuilder<'_>>,
    remaining_length: usize,
    buffer: &mut [u8],
) -> Result<usize, EncodeError> {
    validate_publish_inputs(info, properties)?;

    if remaining_length > VARIABLE_INTEGER_MAX as usize {
        return Err(EncodeError::BadParameter(
            "packet exceeds the protocol's maximum remaining length",
        ));
    }
    if remaining_length < info.payload.len() {
        return Err(EncodeError::BadParameter(
            "remaining length is smaller than the payload",
        ));
    }

    let header_size = 1
        + variable_u32_binary_size(remaining_length as u32) as usize
        + (remaining_length - info.payload.len());
    if buffer.len() < header_size {
        return Err(EncodeError::NoMemory {
            needed: header_size,
            available: buffer.len(),
        });
    }

    let mut writer = BufWriter::new(buffer);
    writer.write_byte(publish_first_byte(info))?;
    crate::integers::write_variable_u32(&mut writer, remaining_length as u32)?;
    write_publish_header_body(&mut writer, info, properties)?;
    debug_assert_eq!(writer.written(), header_size);

    Ok(header_size)
}

/// Flip the DUP flag of an already-serialized PUBLISH in place.
///
/// Used when retransmitting a QoS>0 publish; nothing else in the packet
/// changes, so re-serializing would be wasted work.
pub fn set_publish_duplicate(packet: &mut [u8], duplicate: bool) -> Result<(), EncodeError> {
    let first = packet
        .first_mut()
        .ok_or(EncodeError::BadParameter("empty packet"))?;
    if *first >> 4 != 3 {
        return Err(EncodeError::BadParameter("packet is not a PUBLISH"));
    }

    if duplicate {
        *first |= 0b0000_1000;
    } else {
        *first &= !0b0000_1000;
    }
    Ok(())
}

/// A received PUBLISH, borrowed from the receive buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IncomingPublish<'i> {
    pub duplicate: bool,
    pub qos: QualityOfService,
    pub retain: bool,
    /// Empty when the server used a topic alias instead.
    pub topic_name: &'i str,
    /// Present exactly for QoS 1 and 2.
    pub packet_identifier: Option<NonZeroU16>,
    pub properties: PropertyReader<'i>,
    pub payload: &'i [u8],
}

const INCOMING_LEGAL: &[PropertyId] = &[
    PropertyId::PayloadFormatIndicator,
    PropertyId::MessageExpiryInterval,
    PropertyId::TopicAlias,
    PropertyId::ResponseTopic,
    PropertyId::CorrelationData,
    PropertyId::UserProperty,
    PropertyId::SubscriptionIdentifier,
    PropertyId::ContentType,
];

/// Deserialize a received PUBLISH.
///
/// `topic_alias_max` is the alias ceiling this client granted in its
/// CONNECT; any alias above it (or zero) is a protocol error.
pub fn deserialize_publish<'i>(
    packet: &PacketInfo<'i>,
    topic_alias_max: u16,
) -> Result<IncomingPublish<'i>, DecodeError> {
    let PacketType::Publish { dup, qos, retain } = packet.packet_type()? else {
        return Err(DecodeError::BadParameter("packet is not a PUBLISH"));
    };

    // topic length field + empty property block, plus the identifier
    // for QoS > 0
    let minimum = if qos == QualityOfService::AtMostOnce { 3 } else { 5 };
    if packet.remaining_length() < minimum {
        return Err(DecodeError::Malformed("PUBLISH remaining length too small"));
    }

    let mut input = Bytes::new(packet.remaining_data);

    let topic_name = crate::strings::parse_string(&mut input)
        .map_err(|e| DecodeError::from_parse_error(e, "malformed topic name"))?;
    if topic_name.contains(['+', '#']) {
        return Err(DecodeError::Malformed(
            "topic name contains wildcard characters",
        ));
    }

    let packet_identifier = if qos != QualityOfService::AtMostOnce {
        Some(take_packet_identifier(&mut input)?)
    } else {
        None
    };

    let block = crate::properties::parse_property_block(&mut input)
        .map_err(|e| DecodeError::from_parse_error(e, "property length exceeds the packet"))?;

    let mut alias = None;
    let mut seen = PropertySet::default();
    let mut reader = PropertyReader::new(block);
    while let Some(id) = reader.next_id()? {
        if !INCOMING_LEGAL.contains(&id) {
            return Err(DecodeError::Malformed(
                "property is not allowed in a PUBLISH",
            ));
        }
        if !id.repeatable() && !seen.insert(id) {
            return Err(DecodeError::Malformed("duplicate property"));
        }
        if id == PropertyId::TopicAlias {
            let value = reader.topic_alias()?;
            if value == 0 || value > topic_alias_max {
                return Err(DecodeError::Malformed("topic alias out of range"));
            }
            alias = Some(value);
        }
    }

    if topic_name.is_empty() && alias.is_none() {
        return Err(DecodeError::BadParameter(
            "publish has neither a topic name nor a topic alias",
        ));
    }

    let payload: &'i [u8] = input;

    Ok(IncomingPublish {
        duplicate: dup,
        qos,
        retain,
        topic_name,
        packet_identifier,
        properties: PropertyReader::new(block),
        payload,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::PublishInfo;
    use super::deserialize_publish;
    use super::publish_packet_size;
    use super::serialize_publish;
    use super::serialize_publish_header;
    use super::set_publish_duplicate;
    use super::validate_publish_params;
    use crate::connection::ConnectionProperties;
    use crate::error::DecodeError;
    use crate::error::EncodeError;
    use crate::properties::PropertyBuilder;
    use crate::properties::PropertyId;
    use crate::qos::QualityOfService;
    use crate::test::frame_packet;

    fn sample_publish() -> PublishInfo<'static> {
        PublishInfo {
            qos: QualityOfService::AtLeastOnce,
            retain: false,
            duplicate: false,
            topic_name: "sensors/1",
            packet_identifier: 42,
            payload: b"21.5",
        }
    }

    #[test]
    fn roundtrip_through_framing() {
        let info = sample_publish();
        let size = publish_packet_size(&info, None, 1024).unwrap();

        let mut buffer = [0u8; 64];
        let written = serialize_publish(&info, None, size.remaining_length, &mut buffer).unwrap();
        assert_eq!(written, size.packet_size);

        let packet = frame_packet(&buffer[..written]);
        let incoming = deserialize_publish(&packet, 0).unwrap();

        assert_eq!(incoming.topic_name, "sensors/1");
        assert_eq!(incoming.qos, QualityOfService::AtLeastOnce);
        assert_eq!(incoming.packet_identifier.unwrap().get(), 42);
        assert_eq!(incoming.payload, b"21.5");
        assert!(!incoming.duplicate);
        assert!(!incoming.retain);
    }

    #[test]
    fn header_only_serialization_is_a_prefix_of_the_full_packet() {
        let info = sample_publish();
        let size = publish_packet_size(&info, None, 1024).unwrap();

        let mut full = [0u8; 64];
        let written = serialize_publish(&info, None, size.remaining_length, &mut full).unwrap();

        let mut header = [0u8; 64];
        let header_size =
            serialize_publish_header(&info, None, size.remaining_length, &mut header).unwrap();

        assert_eq!(header_size, written - info.payload.len());
        assert_eq!(&header[..header_size], &full[..header_size]);
        assert_eq!(&full[header_size..written], info.payload);
    }

    #[test]
    fn missing_topic_and_alias_is_rejected() {
        let mut info = sample_publish();
        info.topic_name = "";

        assert!(matches!(
            publish_packet_size(&info, None, 1024),
            Err(EncodeError::BadParameter(_))
        ));

        // with an alias in the properties the same call succeeds
        let mut prop_buffer = [0u8; 8];
        let mut properties = PropertyBuilder::new(&mut prop_buffer);
        properties.add_topic_alias(3).unwrap();
        assert!(properties.contains(PropertyId::TopicAlias));

        publish_packet_size(&info, Some(&properties), 1024).unwrap();
    }

    #[test]
    fn dup_flag_patch_only_touches_the_first_byte() {
        let info = sample_publish();
        let size = publish_packet_size(&info, None, 1024).unwrap();

        let mut buffer = [0u8; 64];
        let written = serialize_publish(&info, None, size.remaining_length, &mut buffer).unwrap();

        let before = buffer[..written].to_vec();
        set_publish_duplicate(&mut buffer[..written], true).unwrap();
        assert_eq!(buffer[0], before[0] | 0b0000_1000);
        assert_eq!(&buffer[1..written], &before[1..written]);

        set_publish_duplicate(&mut buffer[..written], false).unwrap();
        assert_eq!(&buffer[..written], &before[..]);
    }

    #[test]
    fn dup_flag_patch_rejects_non_publish() {
        let mut packet = [0x40u8, 0x02, 0x00, 0x01];
        assert!(set_publish_duplicate(&mut packet, true).is_err());
    }

    #[test]
    fn server_capabilities_are_enforced() {
        let mut connection = ConnectionProperties::new();
        connection.retain_available = false;

        let mut info = sample_publish();
        info.retain = true;
        assert!(validate_publish_params(&info, &connection).is_err());

        connection.retain_available = true;
        connection.server_max_qos = 0;
        assert!(validate_publish_params(&info, &connection).is_err());

        connection.server_max_qos = 1;
        validate_publish_params(&info, &connection).unwrap();
    }

    #[test]
    fn incoming_alias_out_of_range_is_rejected() {
        // PUBLISH qos0, topic "t", alias 7, no payload
        #[rustfmt::skip]
        let bytes = [
            0x30, 0x09,
            0x00, 0x01, b't',
            0x03, 0x23, 0x00, 0x07,
            b'x', b'y',
        ];

        let packet = frame_packet(&bytes);
        assert!(matches!(
            deserialize_publish(&packet, 3),
            Err(DecodeError::Malformed(_))
        ));

        let incoming = deserialize_publish(&packet, 7).unwrap();
        assert_eq!(incoming.payload, b"xy");
    }

    #[test]
    fn incoming_qos1_with_zero_identifier_is_rejected() {
        #[rustfmt::skip]
        let bytes = [
            0x32, 0x07,
            0x00, 0x01, b't',
            0x00, 0x00,       // packet identifier 0
            0x00,
            b'p',
        ];

        let packet = frame_packet(&bytes);
        assert_eq!(
            deserialize_publish(&packet, 0),
            Err(DecodeError::Malformed("packet identifier is zero"))
        );
    }

    #[test]
    fn property_block_overrunning_packet_is_rejected() {
        // declared property length 0x10 with two property bytes present
        #[rustfmt::skip]
        let bytes = [
            0x30, 0x07,
            0x00, 0x01, b't',
            0x10, 0x01, 0x00, 0x42,
        ];

        let packet = frame_packet(&bytes);
        assert!(matches!(
            deserialize_publish(&packet, 0),
            Err(DecodeError::Malformed(_))
        ));
    }
}
