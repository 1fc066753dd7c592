//
//   This Source Code Form is subject to the terms of the Mozilla Public
//   License, v. 2.0. If a copy of the MPL was not distributed with this
//   file, You can obtain one at http://mozilla.org/MPL/2.0/.
//

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
use crate::packets::write_property_block;
use crate::properties::PropertyBuilder;
use crate::properties::PropertyId;
use crate::properties::PropertyReader;
use crate::write::PacketSink;

crate::reason_code::make_combined_reason_code! {
    pub enum DisconnectReasonCode {
        NormalDisconnection = crate::reason_code::NormalDisconnection,
        DisconnectWithWillMessage = crate::reason_code::DisconnectWithWillMessage,
        UnspecifiedError = crate::reason_code::UnspecifiedError,
        MalformedPacket = crate::reason_code::MalformedPacket,
        ProtocolError = crate::reason_code::ProtocolError,
        ImplementationSpecificError = crate::reason_code::ImplementationSpecificError,
        NotAuthorized = crate::reason_code::NotAuthorized,
        ServerBusy = crate::reason_code::ServerBusy,
        ServerShuttingDown = crate::reason_code::ServerShuttingDown,
        BadAuthenticationMethod = crate::reason_code::BadAuthenticationMethod,
        KeepAliveTimeout = crate::reason_code::KeepAliveTimeout,
        SessionTakenOver = crate::reason_code::SessionTakenOver,
        TopicFilterInvalid = crate::reason_code::TopicFilterInvalid,
        TopicNameInvalid = crate::reason_code::TopicNameInvalid,
        ReceiveMaximumExceeded = crate::reason_code::ReceiveMaximumExceeded,
        TopicAliasInvalid = crate::reason_code::TopicAliasInvalid,
        PacketTooLarge = crate::reason_code::PacketTooLarge,
        MessageRateTooHigh = crate::reason_code::MessageRateTooHigh,
        QuotaExceeded = crate::reason_code::QuotaExceeded,
        AdministrativeAction = crate::reason_code::AdministrativeAction,
        PayloadFormatInvalid = crate::reason_code::PayloadFormatInvalid,
        RetainNotSupported = crate::reason_code::RetainNotSupported,
        QoSNotSupported = crate::reason_code::QoSNotSupported,
        UseAnotherServer = crate::reason_code::UseAnotherServer,
        ServerMoved = crate::reason_code::ServerMoved,
        SharedSubscriptionsNotSupported = crate::reason_code::SharedSubscriptionsNotSupported,
        ConnectionRateExceeded = crate::reason_code::ConnectionRateExceeded,
        MaximumConnectTime = crate::reason_code::MaximumConnectTime,
        SubscriptionIdentifiersNotSupported = crate::reason_code::SubscriptionIdentifiersNotSupported,
        WildcardSubscriptionsNotSupported = crate::reason_code::WildcardSubscriptionsNotSupported,
    }
}

fn write_disconnect_body<W: PacketSink>(
    sink: &mut W,
    reason_code: DisconnectReasonCode,
    properties: Option<&PropertyBuilder<'_>>,
) -> Result<(), EncodeError> {
    sink.write_byte(reason_code.code())?;
    write_property_block(sink, properties)
}

/// Compute the Remaining Length and total size of an outgoing
/// DISCONNECT. Client disconnects may carry a session expiry interval,
/// reason string and user properties.
pub fn disconnect_packet_size(
    properties: Option<&PropertyBuilder<'_>>,
    max_packet_size: u32,
) -> Result<PacketSize, EncodeError> {
    check_max_packet_size(max_packet_size)?;

    let remaining_length = measure_body(|sink| {
        write_disconnect_body(sink, DisconnectReasonCode::NormalDisconnection, properties)
    })?;

    finish_packet_size(remaining_length, max_packet_size)
}

/// Serialize a DISCONNECT packet into `buffer`.
pub fn serialize_disconnect(
    reason_code: DisconnectReasonCode,
    properties: Option<&PropertyBuilder<'_>>,
    remaining_length: usize,
    buffer: &mut [u8],
) -> Result<usize, EncodeError> {
    serialize_packet(
        buffer,
        PacketType::Disconnect.byte(),
        remaining_length,
        |w| write_disconnect_body(w, reason_code, properties),
    )
}

/// A received DISCONNECT.
#[derive(Debug, Clone, Copy)]
pub struct DisconnectInfo<'i> {
    pub reason_code: DisconnectReasonCode,
    pub properties: PropertyReader<'i>,
}

const INCOMING_LEGAL: &[PropertyId] = &[
    PropertyId::ReasonString,
    PropertyId::UserProperty,
    PropertyId::ServerReference,
];

/// Deserialize a received DISCONNECT.
///
/// A remaining length of 0 is the compact form for a normal
/// disconnection with no properties.
pub fn deserialize_disconnect<'i>(
    packet: &PacketInfo<'i>,
    max_packet_size: u32,
) -> Result<DisconnectInfo<'i>, DecodeError> {
    if max_packet_size == 0 {
        return Err(DecodeError::BadParameter("maximum packet size must not be 0"));
    }
    if packet.total_length() > max_packet_size as usize {
        return Err(DecodeError::Malformed(
            "packet exceeds the declared maximum packet size",
        ));
    }
    if packet.packet_type()? != PacketType::Disconnect {
        return Err(DecodeError::BadParameter("packet is not a DISCONNECT"));
    }

    if packet.remaining_data.is_empty() {
        return Ok(DisconnectInfo {
            reason_code: DisconnectReasonCode::NormalDisconnection,
            properties: PropertyReader::new(&[]),
        });
    }

    let mut input = Bytes::new(packet.remaining_data);
    let reason_code = DisconnectReasonCode::parse(&mut input)
        .map_err(|e| DecodeError::from_parse_error(e, "illegal DISCONNECT reason code"))?;

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
        crate::properties::validate_block(block, INCOMING_LEGAL)?;
        block
    };

    Ok(DisconnectInfo {
        reason_code,
        properties: PropertyReader::new(block),
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::DisconnectReasonCode;
    use super::deserialize_disconnect;
    use super::disconnect_packet_size;
    use super::serialize_disconnect;
    use crate::error::DecodeError;
    use crate::fixed_header::PacketInfo;
    use crate::test::frame_packet;

    #[test]
    fn zero_length_disconnect_is_a_normal_disconnection() {
        let packet = PacketInfo {
            packet_type: 0xE0,
            remaining_data: &[],
        };

        let disconnect = deserialize_disconnect(&packet, 1024).unwrap();
        assert_eq!(
            disconnect.reason_code,
            DisconnectReasonCode::NormalDisconnection
        );
        assert_eq!(disconnect.properties.block_len(), 0);
    }

    #[test]
    fn reason_only_disconnect() {
        let packet = PacketInfo {
            packet_type: 0xE0,
            remaining_data: &[0x8B],
        };

        let disconnect = deserialize_disconnect(&packet, 1024).unwrap();
        assert_eq!(
            disconnect.reason_code,
            DisconnectReasonCode::ServerShuttingDown
        );
    }

    #[test]
    fn server_reference_is_exposed() {
        #[rustfmt::skip]
        let remaining = [
            0x9C,
            0x07, 0x1C, 0x00, 0x04, b'b', b'2', b':', b'1',
        ];
        let packet = PacketInfo {
            packet_type: 0xE0,
            remaining_data: &remaining,
        };

        let disconnect = deserialize_disconnect(&packet, 1024).unwrap();
        assert_eq!(disconnect.reason_code, DisconnectReasonCode::UseAnotherServer);

        let mut properties = disconnect.properties;
        properties.next_id().unwrap();
        assert_eq!(properties.server_reference().unwrap(), "b2:1");
    }

    #[test]
    fn illegal_reason_code_is_rejected() {
        // 0x01 (granted QoS 1) is not a DISCONNECT code
        let packet = PacketInfo {
            packet_type: 0xE0,
            remaining_data: &[0x01],
        };

        assert!(matches!(
            deserialize_disconnect(&packet, 1024),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn session_expiry_from_server_is_rejected() {
        #[rustfmt::skip]
        let remaining = [
            0x00,
            0x05, 0x11, 0x00, 0x00, 0x00, 0x3C,
        ];
        let packet = PacketInfo {
            packet_type: 0xE0,
            remaining_data: &remaining,
        };

        assert!(matches!(
            deserialize_disconnect(&packet, 1024),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn outgoing_disconnect_roundtrips() {
        let mut prop_buffer = [0u8; 16];
        let mut properties = crate::properties::PropertyBuilder::new(&mut prop_buffer);
        properties.add_user_property("k", "v").unwrap();

        let size = disconnect_packet_size(Some(&properties), 1024).unwrap();
        let mut buffer = [0u8; 32];
        let written = serialize_disconnect(
            DisconnectReasonCode::NormalDisconnection,
            Some(&properties),
            size.remaining_length,
            &mut buffer,
        )
        .unwrap();
        assert_eq!(written, size.packet_size);
        assert_eq!(buffer[0], 0xE0);

        let packet = frame_packet(&buffer[..written]);
        let disconnect = deserialize_disconnect(&packet, 1024).unwrap();
        assert_eq!(
            disconnect.reason_code,
            DisconnectReasonCode::NormalDisconnection
        );
    }
}
