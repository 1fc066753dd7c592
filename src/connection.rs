//
//   This Source Code Form is subject to the terms of the Mozilla Public
//   License, v. 2.0. If a copy of the MPL was not distributed with this
//   file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
//! Negotiated per-connection state

use crate::error::EncodeError;
use crate::integers::VARIABLE_INTEGER_MAX;
use crate::properties::PropertyBuilder;
use crate::properties::PropertyId;
use crate::properties::PropertyReader;

/// Largest packet MQTT can express: maximal remaining length plus its
/// four length bytes plus the fixed-header byte.
pub const MAXIMUM_PACKET_SIZE: u32 = VARIABLE_INTEGER_MAX + 5;

/// The session parameters a client declared in its CONNECT and the
/// capabilities the server answered with in its CONNACK.
///
/// Owned by the caller's connection context. The CONNACK deserializer
/// fills in the `server_*` fields and capability flags; the publish and
/// subscribe validators read them. Fields that arrive as borrowed
/// CONNACK payloads (assigned client identifier, reason string, server
/// reference, user properties) are not stored here; they remain
/// accessible through the [`PropertyReader`] the deserializer returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionProperties {
    /// Session Expiry Interval the client asked for, in seconds.
    pub session_expiry: u32,
    /// Unacknowledged QoS>0 publishes the client is willing to hold.
    pub receive_maximum: u16,
    /// Largest packet the client is willing to accept.
    pub max_packet_size: u32,
    /// Highest topic alias the client accepts on incoming publishes.
    pub topic_alias_maximum: u16,
    /// Whether the client asked the server for response information.
    pub request_response_info: bool,
    /// Whether the server may attach reason strings and user properties
    /// to failures.
    pub request_problem_info: bool,

    /// Unacknowledged QoS>0 publishes the server is willing to hold.
    pub server_receive_maximum: u16,
    /// Highest QoS the server supports.
    pub server_max_qos: u8,
    /// Whether the server supports retained messages.
    pub retain_available: bool,
    /// Largest packet the server is willing to accept.
    pub server_max_packet_size: u32,
    /// Highest topic alias the client may use towards the server.
    pub server_topic_alias_maximum: u16,
    pub wildcard_subscription_available: bool,
    pub subscription_identifiers_available: bool,
    pub shared_subscription_available: bool,
    /// Keep-alive the server imposed, overriding the CONNECT value.
    pub server_keep_alive: Option<u16>,
}

impl Default for ConnectionProperties {
    fn default() -> ConnectionProperties {
        ConnectionProperties {
            session_expiry: 0,
            receive_maximum: u16::MAX,
            max_packet_size: MAXIMUM_PACKET_SIZE,
            topic_alias_maximum: 0,
            request_response_info: false,
            request_problem_info: true,
            server_receive_maximum: u16::MAX,
            server_max_qos: 2,
            retain_available: true,
            server_max_packet_size: MAXIMUM_PACKET_SIZE,
            server_topic_alias_maximum: 0,
            wildcard_subscription_available: true,
            subscription_identifiers_available: true,
            shared_subscription_available: true,
            server_keep_alive: None,
        }
    }
}

impl ConnectionProperties {
    pub fn new() -> ConnectionProperties {
        ConnectionProperties::default()
    }

    /// Record the client's own CONNECT property choices into the
    /// connection state, so later validation sees what was actually
    /// sent on the wire.
    pub fn apply_connect_properties(
        &mut self,
        properties: &PropertyBuilder<'_>,
    ) -> Result<(), EncodeError> {
        let malformed = EncodeError::BadParameter("property is not allowed in a CONNECT");

        let mut reader = PropertyReader::new(properties.as_bytes());
        while let Some(id) = reader.next_id().map_err(|_| malformed)? {
            match id {
                PropertyId::SessionExpiryInterval => {
                    self.session_expiry = reader.session_expiry_interval().map_err(|_| malformed)?;
                }
                PropertyId::ReceiveMaximum => {
                    self.receive_maximum = reader.receive_maximum().map_err(|_| malformed)?;
                }
                PropertyId::MaximumPacketSize => {
                    self.max_packet_size = reader.maximum_packet_size().map_err(|_| malformed)?;
                }
                PropertyId::TopicAliasMaximum => {
                    self.topic_alias_maximum =
                        reader.topic_alias_maximum().map_err(|_| malformed)?;
                }
                PropertyId::RequestResponseInformation => {
                    self.request_response_info =
                        reader.request_response_information().map_err(|_| malformed)? != 0;
                }
                PropertyId::RequestProblemInformation => {
                    self.request_problem_info =
                        reader.request_problem_information().map_err(|_| malformed)? != 0;
                }
                PropertyId::AuthenticationMethod
                | PropertyId::AuthenticationData
                | PropertyId::UserProperty => {}
                _ => return Err(malformed),
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::ConnectionProperties;
    use super::MAXIMUM_PACKET_SIZE;
    use crate::properties::PropertyBuilder;

    #[test]
    fn defaults_match_the_protocol_defaults() {
        let conn = ConnectionProperties::new();
        assert_eq!(conn.receive_maximum, 65_535);
        assert_eq!(conn.max_packet_size, MAXIMUM_PACKET_SIZE);
        assert!(conn.request_problem_info);
        assert!(!conn.request_response_info);
        assert_eq!(conn.server_max_qos, 2);
    }

    #[test]
    fn connect_properties_are_recorded() {
        let mut buffer = [0u8; 32];
        let mut props = PropertyBuilder::new(&mut buffer);
        props.add_session_expiry_interval(300).unwrap();
        props.add_receive_maximum(20).unwrap();
        props.add_maximum_packet_size(4096).unwrap();
        props.add_topic_alias_maximum(8).unwrap();
        props.add_request_problem_information(false).unwrap();

        let mut conn = ConnectionProperties::new();
        conn.apply_connect_properties(&props).unwrap();

        assert_eq!(conn.session_expiry, 300);
        assert_eq!(conn.receive_maximum, 20);
        assert_eq!(conn.max_packet_size, 4096);
        assert_eq!(conn.topic_alias_maximum, 8);
        assert!(!conn.request_problem_info);
    }

    #[test]
    fn connack_only_properties_are_rejected() {
        let mut buffer = [0u8; 8];
        let mut props = PropertyBuilder::new(&mut buffer);
        props.add_reason_string("no").unwrap();

        let mut conn = ConnectionProperties::new();
        assert!(conn.apply_connect_properties(&props).is_err());
    }
}
