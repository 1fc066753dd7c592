//
//   This Source Code Form is subject to the terms of the Mozilla Public
//   License, v. 2.0. If a copy of the MPL was not distributed with this
//   file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
//! The MQTT 5.0 property sub-codec
//!
//! Properties are an ID-tagged, variable-order list of optional fields
//! carried in a length-prefixed block. Outgoing blocks are assembled
//! with the append-only [`PropertyBuilder`]; received blocks are walked
//! with the [`PropertyReader`], whose `next_id`/typed-accessor pairs run
//! in lock-step:
//!
//! ```
//! # use mqtt5_codec::properties::{PropertyId, PropertyReader};
//! let block = [0x23, 0x00, 0x05]; // Topic Alias = 5
//! let mut reader = PropertyReader::new(&block);
//! while let Some(id) = reader.next_id().unwrap() {
//!     if id == PropertyId::TopicAlias {
//!         assert_eq!(reader.topic_alias().unwrap(), 5);
//!     }
//! }
//! ```

use winnow::Bytes;
use winnow::Parser;
use winnow::combinator::trace;

use crate::ParseResult;
use crate::error::DecodeError;
use crate::error::EncodeError;
use crate::integers::parse_variable_u32;
use crate::integers::variable_u32_binary_size;
use crate::integers::write_variable_u32;
use crate::write::BufWriter;
use crate::write::PacketSink;

/// Wire representation of a property payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PropertyKind {
    Byte,
    TwoByteInteger,
    FourByteInteger,
    VariableByteInteger,
    Utf8String,
    BinaryData,
    Utf8StringPair,
}

macro_rules! define_property_ids {
    ($(
        $name:ident = $id:literal => $kind:ident, $method:ident: $ty:ty = $decoder:ident;
    )*) => {
        /// Property identifiers defined by MQTT 5.0.
        #[derive(num_enum::TryFromPrimitive, num_enum::IntoPrimitive)]
        #[repr(u8)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum PropertyId {
            $( $name = $id ),*
        }

        impl PropertyId {
            fn kind(self) -> PropertyKind {
                match self {
                    $( PropertyId::$name => PropertyKind::$kind ),*
                }
            }

            /// Whether MQTT allows this property more than once per packet.
            pub fn repeatable(self) -> bool {
                matches!(
                    self,
                    PropertyId::UserProperty | PropertyId::SubscriptionIdentifier
                )
            }
        }

        impl<'i> PropertyReader<'i> {
            $(
                #[doc = concat!(
                    "Decode the ", stringify!($name),
                    " payload at the cursor.\n\n",
                    "The preceding [`next_id`](Self::next_id) call must have \
                     yielded [`PropertyId::", stringify!($name), "`]."
                )]
                pub fn $method(&self) -> Result<$ty, DecodeError> {
                    self.expect_current(PropertyId::$name)?;
                    self.$decoder()
                }
            )*
        }
    }
}

define_property_ids! {
    PayloadFormatIndicator = 0x01 => Byte, payload_format_indicator: u8 = payload_u8;
    MessageExpiryInterval = 0x02 => FourByteInteger, message_expiry_interval: u32 = payload_u32;
    ContentType = 0x03 => Utf8String, content_type: &'i str = payload_string;
    ResponseTopic = 0x08 => Utf8String, response_topic: &'i str = payload_string;
    CorrelationData = 0x09 => BinaryData, correlation_data: &'i [u8] = payload_binary_data;
    SubscriptionIdentifier = 0x0B => VariableByteInteger, subscription_identifier: u32 = payload_variable_u32;
    SessionExpiryInterval = 0x11 => FourByteInteger, session_expiry_interval: u32 = payload_u32;
    AssignedClientIdentifier = 0x12 => Utf8String, assigned_client_identifier: &'i str = payload_string;
    ServerKeepAlive = 0x13 => TwoByteInteger, server_keep_alive: u16 = payload_u16;
    AuthenticationMethod = 0x15 => Utf8String, authentication_method: &'i str = payload_string;
    AuthenticationData = 0x16 => BinaryData, authentication_data: &'i [u8] = payload_binary_data;
    RequestProblemInformation = 0x17 => Byte, request_problem_information: u8 = payload_u8;
    WillDelayInterval = 0x18 => FourByteInteger, will_delay_interval: u32 = payload_u32;
    RequestResponseInformation = 0x19 => Byte, request_response_information: u8 = payload_u8;
    ResponseInformation = 0x1A => Utf8String, response_information: &'i str = payload_string;
    ServerReference = 0x1C => Utf8String, server_reference: &'i str = payload_string;
    ReasonString = 0x1F => Utf8String, reason_string: &'i str = payload_string;
    ReceiveMaximum = 0x21 => TwoByteInteger, receive_maximum: u16 = payload_u16;
    TopicAliasMaximum = 0x22 => TwoByteInteger, topic_alias_maximum: u16 = payload_u16;
    TopicAlias = 0x23 => TwoByteInteger, topic_alias: u16 = payload_u16;
    MaximumQoS = 0x24 => Byte, maximum_qos: u8 = payload_u8;
    RetainAvailable = 0x25 => Byte, retain_available: u8 = payload_u8;
    UserProperty = 0x26 => Utf8StringPair, user_property: (&'i str, &'i str) = payload_string_pair;
    MaximumPacketSize = 0x27 => FourByteInteger, maximum_packet_size: u32 = payload_u32;
    WildcardSubscriptionAvailable = 0x28 => Byte, wildcard_subscription_available: u8 = payload_u8;
    SubscriptionIdentifiersAvailable = 0x29 => Byte, subscription_identifiers_available: u8 = payload_u8;
    SharedSubscriptionAvailable = 0x2A => Byte, shared_subscription_available: u8 = payload_u8;
}

/// A set of property identifiers with O(1) insert and membership test.
///
/// All identifiers are below 64, so a single word suffices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct PropertySet(u64);

impl PropertySet {
    /// Insert `id`, reporting whether it was newly inserted.
    pub(crate) fn insert(&mut self, id: PropertyId) -> bool {
        let bit = 1u64 << u8::from(id);
        let fresh = self.0 & bit == 0;
        self.0 |= bit;
        fresh
    }

    pub(crate) fn contains(&self, id: PropertyId) -> bool {
        self.0 & (1u64 << u8::from(id)) != 0
    }
}

/// Append-only encoder for one packet's property block.
///
/// Writes into a caller-provided buffer and tracks which singleton
/// properties have been added, rejecting duplicates before they reach
/// the wire. A failed add leaves the builder exactly as it was.
#[derive(Debug)]
pub struct PropertyBuilder<'a> {
    buffer: &'a mut [u8],
    length: usize,
    seen: PropertySet,
}

impl<'a> PropertyBuilder<'a> {
    pub fn new(buffer: &'a mut [u8]) -> PropertyBuilder<'a> {
        PropertyBuilder {
            buffer,
            length: 0,
            seen: PropertySet::default(),
        }
    }

    /// Bytes of property data written so far.
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// The built property block, without its length prefix.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer[..self.length]
    }

    pub fn contains(&self, id: PropertyId) -> bool {
        self.seen.contains(id)
    }

    /// Append one property: the identifier byte plus `payload_size`
    /// payload bytes produced by `payload`.
    ///
    /// Duplicate and capacity violations are detected before anything is
    /// written.
    fn append<F>(&mut self, id: PropertyId, payload_size: usize, payload: F) -> Result<(), EncodeError>
    where
        F: FnOnce(&mut BufWriter<'_>) -> Result<(), EncodeError>,
    {
        if !id.repeatable() && self.seen.contains(id) {
            return Err(EncodeError::BadParameter(
                "property may only appear once per packet",
            ));
        }

        let needed = 1 + payload_size;
        if needed > self.buffer.len() - self.length {
            return Err(EncodeError::NoMemory {
                needed: self.length + needed,
                available: self.buffer.len(),
            });
        }

        let mut writer = BufWriter::new(&mut self.buffer[self.length..]);
        writer.write_byte(id.into())?;
        payload(&mut writer)?;
        debug_assert_eq!(writer.written(), needed);

        self.length += needed;
        self.seen.insert(id);
        Ok(())
    }

    fn append_u8(&mut self, id: PropertyId, value: u8) -> Result<(), EncodeError> {
        self.append(id, 1, |w| w.write_byte(value))
    }

    fn append_u16(&mut self, id: PropertyId, value: u16) -> Result<(), EncodeError> {
        self.append(id, 2, |w| w.write_u16(value))
    }

    fn append_u32(&mut self, id: PropertyId, value: u32) -> Result<(), EncodeError> {
        self.append(id, 4, |w| w.write_u32(value))
    }

    fn append_string(&mut self, id: PropertyId, value: &str) -> Result<(), EncodeError> {
        if value.len() > u16::MAX as usize {
            return Err(EncodeError::BadParameter("string longer than 65535 bytes"));
        }
        self.append(id, crate::strings::string_binary_size(value), |w| {
            crate::strings::write_string(w, value)
        })
    }

    fn append_binary(&mut self, id: PropertyId, value: &[u8]) -> Result<(), EncodeError> {
        if value.len() > u16::MAX as usize {
            return Err(EncodeError::BadParameter(
                "binary data longer than 65535 bytes",
            ));
        }
        self.append(id, crate::bytes::binary_data_binary_size(value), |w| {
            crate::bytes::write_binary_data(w, value)
        })
    }

    pub fn add_session_expiry_interval(&mut self, seconds: u32) -> Result<(), EncodeError> {
        self.append_u32(PropertyId::SessionExpiryInterval, seconds)
    }

    pub fn add_receive_maximum(&mut self, maximum: u16) -> Result<(), EncodeError> {
        if maximum == 0 {
            return Err(EncodeError::BadParameter("receive maximum must not be 0"));
        }
        self.append_u16(PropertyId::ReceiveMaximum, maximum)
    }

    pub fn add_maximum_packet_size(&mut self, size: u32) -> Result<(), EncodeError> {
        if size == 0 {
            return Err(EncodeError::BadParameter(
                "maximum packet size must not be 0",
            ));
        }
        self.append_u32(PropertyId::MaximumPacketSize, size)
    }

    pub fn add_topic_alias_maximum(&mut self, maximum: u16) -> Result<(), EncodeError> {
        self.append_u16(PropertyId::TopicAliasMaximum, maximum)
    }

    pub fn add_request_response_information(&mut self, request: bool) -> Result<(), EncodeError> {
        self.append_u8(PropertyId::RequestResponseInformation, request as u8)
    }

    pub fn add_request_problem_information(&mut self, request: bool) -> Result<(), EncodeError> {
        self.append_u8(PropertyId::RequestProblemInformation, request as u8)
    }

    pub fn add_authentication_method(&mut self, method: &str) -> Result<(), EncodeError> {
        self.append_string(PropertyId::AuthenticationMethod, method)
    }

    pub fn add_authentication_data(&mut self, data: &[u8]) -> Result<(), EncodeError> {
        self.append_binary(PropertyId::AuthenticationData, data)
    }

    /// May be added any number of times.
    pub fn add_user_property(&mut self, key: &str, value: &str) -> Result<(), EncodeError> {
        if key.len() > u16::MAX as usize || value.len() > u16::MAX as usize {
            return Err(EncodeError::BadParameter("string longer than 65535 bytes"));
        }
        self.append(
            PropertyId::UserProperty,
            crate::strings::string_pair_binary_size(key, value),
            |w| {
                crate::strings::write_string(w, key)?;
                crate::strings::write_string(w, value)
            },
        )
    }

    pub fn add_will_delay_interval(&mut self, seconds: u32) -> Result<(), EncodeError> {
        self.append_u32(PropertyId::WillDelayInterval, seconds)
    }

    pub fn add_payload_format_indicator(&mut self, utf8: bool) -> Result<(), EncodeError> {
        self.append_u8(PropertyId::PayloadFormatIndicator, utf8 as u8)
    }

    pub fn add_message_expiry_interval(&mut self, seconds: u32) -> Result<(), EncodeError> {
        self.append_u32(PropertyId::MessageExpiryInterval, seconds)
    }

    pub fn add_content_type(&mut self, content_type: &str) -> Result<(), EncodeError> {
        self.append_string(PropertyId::ContentType, content_type)
    }

    /// Response topics are topic names, not filters: wildcard characters
    /// are rejected.
    pub fn add_response_topic(&mut self, topic: &str) -> Result<(), EncodeError> {
        if topic.contains(['+', '#']) {
            return Err(EncodeError::BadParameter(
                "response topic must not contain wildcard characters",
            ));
        }
        self.append_string(PropertyId::ResponseTopic, topic)
    }

    pub fn add_correlation_data(&mut self, data: &[u8]) -> Result<(), EncodeError> {
        self.append_binary(PropertyId::CorrelationData, data)
    }

    pub fn add_topic_alias(&mut self, alias: u16) -> Result<(), EncodeError> {
        if alias == 0 {
            return Err(EncodeError::BadParameter("topic alias must not be 0"));
        }
        self.append_u16(PropertyId::TopicAlias, alias)
    }

    pub fn add_subscription_identifier(&mut self, id: u32) -> Result<(), EncodeError> {
        if id == 0 {
            return Err(EncodeError::BadParameter(
                "subscription identifier must not be 0",
            ));
        }
        if id > crate::integers::VARIABLE_INTEGER_MAX {
            return Err(EncodeError::BadParameter(
                "subscription identifier exceeds the Variable Byte Integer maximum",
            ));
        }
        self.append(
            PropertyId::SubscriptionIdentifier,
            variable_u32_binary_size(id) as usize,
            |w| write_variable_u32(w, id),
        )
    }

    pub fn add_reason_string(&mut self, reason: &str) -> Result<(), EncodeError> {
        self.append_string(PropertyId::ReasonString, reason)
    }
}

/// Single-pass decoder over a received property block.
///
/// [`next_id`](Self::next_id) advances the cursor past the previous
/// property's payload and yields the next identifier; the typed
/// accessors decode the payload at the cursor without advancing it.
/// Every decode is bounds-checked against the block length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropertyReader<'i> {
    buffer: &'i [u8],
    position: usize,
    current: Option<PropertyId>,
}

impl<'i> PropertyReader<'i> {
    pub fn new(buffer: &'i [u8]) -> PropertyReader<'i> {
        PropertyReader {
            buffer,
            position: 0,
            current: None,
        }
    }

    /// Total size of the block this reader walks.
    pub fn block_len(&self) -> usize {
        self.buffer.len()
    }

    /// Advance to the next property and yield its identifier, or
    /// `Ok(None)` once the block is exhausted.
    pub fn next_id(&mut self) -> Result<Option<PropertyId>, DecodeError> {
        if let Some(id) = self.current.take() {
            self.position += payload_length(id, &self.buffer[self.position..])?;
        }

        if self.position == self.buffer.len() {
            return Ok(None);
        }

        let id = PropertyId::try_from(self.buffer[self.position])
            .map_err(|_| DecodeError::Malformed("unknown property identifier"))?;
        self.position += 1;
        self.current = Some(id);
        Ok(Some(id))
    }

    fn expect_current(&self, id: PropertyId) -> Result<(), DecodeError> {
        if self.current == Some(id) {
            Ok(())
        } else {
            Err(DecodeError::BadParameter(
                "the cursor is not at the requested property",
            ))
        }
    }

    fn payload(&self) -> &'i Bytes {
        Bytes::new(&self.buffer[self.position..])
    }

    fn payload_u8(&self) -> Result<u8, DecodeError> {
        let result: crate::ParseResult<u8> =
            winnow::Parser::parse_next(&mut winnow::binary::u8, &mut self.payload());
        result.map_err(|e| DecodeError::from_parse_error(e, "property payload truncated"))
    }

    fn payload_u16(&self) -> Result<u16, DecodeError> {
        crate::integers::parse_u16(&mut self.payload())
            .map_err(|e| DecodeError::from_parse_error(e, "property payload truncated"))
    }

    fn payload_u32(&self) -> Result<u32, DecodeError> {
        crate::integers::parse_u32(&mut self.payload())
            .map_err(|e| DecodeError::from_parse_error(e, "property payload truncated"))
    }

    fn payload_variable_u32(&self) -> Result<u32, DecodeError> {
        parse_variable_u32(&mut self.payload())
            .map_err(|e| DecodeError::from_parse_error(e, "malformed variable length integer"))
    }

    fn payload_string(&self) -> Result<&'i str, DecodeError> {
        crate::strings::parse_string(&mut self.payload())
            .map_err(|e| DecodeError::from_parse_error(e, "malformed string property"))
    }

    fn payload_binary_data(&self) -> Result<&'i [u8], DecodeError> {
        crate::bytes::parse_binary_data(&mut self.payload())
            .map_err(|e| DecodeError::from_parse_error(e, "malformed binary property"))
    }

    fn payload_string_pair(&self) -> Result<(&'i str, &'i str), DecodeError> {
        crate::strings::parse_string_pair(&mut self.payload())
            .map_err(|e| DecodeError::from_parse_error(e, "malformed string pair property"))
    }
}

/// Encoded payload size of the property at the head of `rest`, bounded
/// by the bytes actually present.
fn payload_length(id: PropertyId, rest: &[u8]) -> Result<usize, DecodeError> {
    let truncated = DecodeError::Malformed("property payload exceeds the property block");

    let length = match id.kind() {
        PropertyKind::Byte => 1,
        PropertyKind::TwoByteInteger => 2,
        PropertyKind::FourByteInteger => 4,
        PropertyKind::VariableByteInteger => {
            let mut input = Bytes::new(rest);
            parse_variable_u32(&mut input)
                .map_err(|e| DecodeError::from_parse_error(e, "malformed variable length integer"))?;
            rest.len() - input.len()
        }
        PropertyKind::Utf8String | PropertyKind::BinaryData => {
            if rest.len() < 2 {
                return Err(truncated);
            }
            2 + u16::from_be_bytes([rest[0], rest[1]]) as usize
        }
        PropertyKind::Utf8StringPair => {
            if rest.len() < 2 {
                return Err(truncated);
            }
            let key_end = 2 + u16::from_be_bytes([rest[0], rest[1]]) as usize;
            if rest.len() < key_end + 2 {
                return Err(truncated);
            }
            let value_len = u16::from_be_bytes([rest[key_end], rest[key_end + 1]]) as usize;
            key_end + 2 + value_len
        }
    };

    if length > rest.len() {
        return Err(truncated);
    }
    Ok(length)
}

/// Parse a length-prefixed property block out of a packet, failing when
/// the declared length exceeds the bytes remaining in the packet.
pub(crate) fn parse_property_block<'i>(input: &mut &'i Bytes) -> ParseResult<&'i [u8]> {
    trace("mqtt_property_block", |input: &mut &'i Bytes| {
        winnow::binary::length_take(parse_variable_u32).parse_next(input)
    })
    .parse_next(input)
}

/// Walk a received block once, rejecting unknown identifiers,
/// identifiers outside `legal`, duplicated singletons, and payloads that
/// overrun the block.
pub(crate) fn validate_block(block: &[u8], legal: &[PropertyId]) -> Result<(), DecodeError> {
    let mut reader = PropertyReader::new(block);
    let mut seen = PropertySet::default();

    while let Some(id) = reader.next_id()? {
        if !legal.contains(&id) {
            return Err(DecodeError::Malformed(
                "property is not allowed in this packet",
            ));
        }
        if !id.repeatable() && !seen.insert(id) {
            return Err(DecodeError::Malformed("duplicate property"));
        }
    }

    Ok(())
}

/// Check a finished PUBLISH property block against the negotiated
/// connection state and hand back the topic alias, if one was added.
pub fn validate_publish_properties(
    server_topic_alias_max: u16,
    builder: &PropertyBuilder<'_>,
) -> Result<Option<u16>, EncodeError> {
    const LEGAL: &[PropertyId] = &[
        PropertyId::PayloadFormatIndicator,
        PropertyId::MessageExpiryInterval,
        PropertyId::TopicAlias,
        PropertyId::ResponseTopic,
        PropertyId::CorrelationData,
        PropertyId::UserProperty,
        PropertyId::ContentType,
    ];

    let malformed = EncodeError::BadParameter("property is not allowed in a client PUBLISH");

    let mut reader = PropertyReader::new(builder.as_bytes());
    let mut alias = None;
    while let Some(id) = reader.next_id().map_err(|_| malformed)? {
        if !LEGAL.contains(&id) {
            return Err(malformed);
        }
        if id == PropertyId::TopicAlias {
            let value = reader.topic_alias().map_err(|_| malformed)?;
            if value > server_topic_alias_max {
                return Err(EncodeError::BadParameter(
                    "topic alias exceeds the server's topic alias maximum",
                ));
            }
            alias = Some(value);
        }
    }

    Ok(alias)
}

/// Check a finished SUBSCRIBE property block against the server's
/// advertised capabilities.
pub fn validate_subscribe_properties(
    subscription_id_available: bool,
    builder: &PropertyBuilder<'_>,
) -> Result<(), EncodeError> {
    let mut reader = PropertyReader::new(builder.as_bytes());
    let malformed = EncodeError::BadParameter("property is not allowed in a SUBSCRIBE");

    while let Some(id) = reader.next_id().map_err(|_| malformed)? {
        match id {
            PropertyId::SubscriptionIdentifier => {
                if !subscription_id_available {
                    return Err(EncodeError::BadParameter(
                        "the server does not support subscription identifiers",
                    ));
                }
            }
            PropertyId::UserProperty => {}
            _ => return Err(malformed),
        }
    }

    Ok(())
}
