//
//   This Source Code Form is subject to the terms of the Mozilla Public
//   License, v. 2.0. If a copy of the MPL was not distributed with this
//   file, You can obtain one at http://mozilla.org/MPL/2.0/.
//

use winnow::Bytes;

use crate::connection::ConnectionProperties;
use crate::error::DecodeError;
use crate::fixed_header::PacketInfo;
use crate::fixed_header::PacketType;
use crate::packets::take_u8;
use crate::properties::PropertyId;
use crate::properties::PropertyReader;
use crate::properties::PropertySet;

crate::reason_code::make_combined_reason_code! {
    pub enum ConnackReasonCode {
        Success = crate::reason_code::Success,
        UnspecifiedError = crate::reason_code::UnspecifiedError,
        MalformedPacket = crate::reason_code::MalformedPacket,
        ProtocolError = crate::reason_code::ProtocolError,
        ImplementationSpecificError = crate::reason_code::ImplementationSpecificError,
        UnsupportedProtocolVersion = crate::reason_code::UnsupportedProtocolVersion,
        ClientIdentifierNotValid = crate::reason_code::ClientIdentifierNotValid,
        BadUsernameOrPassword = crate::reason_code::BadUsernameOrPassword,
        NotAuthorized = crate::reason_code::NotAuthorized,
        ServerUnavailable = crate::reason_code::ServerUnavailable,
        ServerBusy = crate::reason_code::ServerBusy,
        Banned = crate::reason_code::Banned,
        BadAuthenticationMethod = crate::reason_code::BadAuthenticationMethod,
        TopicNameInvalid = crate::reason_code::TopicNameInvalid,
        PacketTooLarge = crate::reason_code::PacketTooLarge,
        QuotaExceeded = crate::reason_code::QuotaExceeded,
        PayloadFormatInvalid = crate::reason_code::PayloadFormatInvalid,
        RetainNotSupported = crate::reason_code::RetainNotSupported,
        QoSNotSupported = crate::reason_code::QoSNotSupported,
        UseAnotherServer = crate::reason_code::UseAnotherServer,
        ServerMoved = crate::reason_code::ServerMoved,
        ConnectionRateExceeded = crate::reason_code::ConnectionRateExceeded,
    }
}

fn boolean_property(value: u8, context: &'static str) -> Result<bool, DecodeError> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(DecodeError::Malformed(context)),
    }
}

/// Deserialize a received CONNACK, folding the server's answer into
/// `connection`.
///
/// Returns the session-present flag and a reader over the property
/// block, through which the borrowed payloads (assigned client
/// identifier, reason string, server reference, user properties) stay
/// accessible. A structurally valid refusal surfaces as
/// [`DecodeError::ServerRefused`] carrying the reason byte, but only
/// after the whole packet validated cleanly.
pub fn deserialize_connack<'i>(
    connection: &mut ConnectionProperties,
    packet: &PacketInfo<'i>,
) -> Result<(bool, PropertyReader<'i>), DecodeError> {
    if packet.packet_type()? != PacketType::Connack {
        return Err(DecodeError::BadParameter("packet is not a CONNACK"));
    }
    if packet.remaining_length() < 2 {
        return Err(DecodeError::Malformed("CONNACK remaining length too small"));
    }
    if packet.total_length() > connection.max_packet_size as usize {
        return Err(DecodeError::Malformed(
            "packet exceeds the declared maximum packet size",
        ));
    }

    let mut input = Bytes::new(packet.remaining_data);

    let acknowledge_flags = take_u8(&mut input)?;
    if acknowledge_flags & 0xFE != 0 {
        return Err(DecodeError::Malformed(
            "reserved connect acknowledge flag bits are set",
        ));
    }
    let session_present = acknowledge_flags & 0x01 != 0;

    let reason_code = ConnackReasonCode::parse(&mut input)
        .map_err(|e| DecodeError::from_parse_error(e, "illegal CONNACK reason code"))?;

    // A resumed session cannot coexist with a refused connection.
    if session_present && reason_code != ConnackReasonCode::Success {
        return Err(DecodeError::Malformed(
            "session present on a refused connection",
        ));
    }

    let block = crate::properties::parse_property_block(&mut input)
        .map_err(|e| DecodeError::from_parse_error(e, "property length exceeds the packet"))?;
    if !input.is_empty() {
        return Err(DecodeError::Malformed(
            "trailing bytes after the property block",
        ));
    }

    apply_connack_properties(connection, block)?;

    if reason_code != ConnackReasonCode::Success {
        return Err(DecodeError::ServerRefused(reason_code.code()));
    }

    Ok((session_present, PropertyReader::new(block)))
}

fn apply_connack_properties(
    connection: &mut ConnectionProperties,
    block: &[u8],
) -> Result<(), DecodeError> {
    let mut reader = PropertyReader::new(block);
    let mut seen = PropertySet::default();

    while let Some(id) = reader.next_id()? {
        if !id.repeatable() && !seen.insert(id) {
            return Err(DecodeError::Malformed("duplicate property"));
        }

        match id {
            PropertyId::SessionExpiryInterval => {
                connection.session_expiry = reader.session_expiry_interval()?;
            }
            PropertyId::ReceiveMaximum => {
                let value = reader.receive_maximum()?;
                if value == 0 {
                    return Err(DecodeError::Malformed("receive maximum is zero"));
                }
                connection.server_receive_maximum = value;
            }
            PropertyId::MaximumQoS => {
                let value = reader.maximum_qos()?;
                if value > 1 {
                    return Err(DecodeError::Malformed("maximum QoS is neither 0 nor 1"));
                }
                connection.server_max_qos = value;
            }
            PropertyId::RetainAvailable => {
                connection.retain_available =
                    boolean_property(reader.retain_available()?, "retain available is not 0 or 1")?;
            }
            PropertyId::MaximumPacketSize => {
                let value = reader.maximum_packet_size()?;
                if value == 0 {
                    return Err(DecodeError::Malformed("maximum packet size is zero"));
                }
                connection.server_max_packet_size = value;
            }
            PropertyId::AssignedClientIdentifier => {
                reader.assigned_client_identifier()?;
            }
            PropertyId::TopicAliasMaximum => {
                connection.server_topic_alias_maximum = reader.topic_alias_maximum()?;
            }
            PropertyId::ReasonString => {
                reader.reason_string()?;
            }
            PropertyId::UserProperty => {
                reader.user_property()?;
            }
            PropertyId::WildcardSubscriptionAvailable => {
                connection.wildcard_subscription_available = boolean_property(
                    reader.wildcard_subscription_available()?,
                    "wildcard subscription available is not 0 or 1",
                )?;
            }
            PropertyId::SubscriptionIdentifiersAvailable => {
                connection.subscription_identifiers_available = boolean_property(
                    reader.subscription_identifiers_available()?,
                    "subscription identifiers available is not 0 or 1",
                )?;
            }
            PropertyId::SharedSubscriptionAvailable => {
                connection.shared_subscription_available = boolean_property(
                    reader.shared_subscription_available()?,
                    "shared subscription available is not 0 or 1",
                )?;
            }
            PropertyId::ServerKeepAlive => {
                connection.server_keep_alive = Some(reader.server_keep_alive()?);
            }
            PropertyId::ResponseInformation => {
                if !connection.request_response_info {
                    return Err(DecodeError::Malformed(
                        "the server sent response information although it was not requested",
                    ));
                }
                reader.response_information()?;
            }
            PropertyId::ServerReference => {
                reader.server_reference()?;
            }
            PropertyId::AuthenticationMethod => {
                reader.authentication_method()?;
            }
            PropertyId::AuthenticationData => {
                reader.authentication_data()?;
            }
            _ => {
                return Err(DecodeError::Malformed(
                    "property is not allowed in a CONNACK",
                ));
            }
        }
    }

    Ok(())
}
