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
use crate::qos::QualityOfService;
use crate::qos::RetainHandling;
use crate::write::PacketSink;

/// One topic filter of a SUBSCRIBE packet, with its subscription
/// options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription<'i> {
    pub topic_filter: &'i str,
    pub qos: QualityOfService,
    /// Do not echo own publishes back on this subscription.
    pub no_local: bool,
    pub retain_as_published: bool,
    pub retain_handling: RetainHandling,
}

impl Subscription<'_> {
    fn options_byte(&self) -> u8 {
        u8::from(self.qos)
            | (self.no_local as u8) << 2
            | (self.retain_as_published as u8) << 3
            | u8::from(self.retain_handling) << 4
    }
}

fn validate_subscriptions(subscriptions: &[Subscription<'_>]) -> Result<(), EncodeError> {
    if subscriptions.is_empty() {
        return Err(EncodeError::BadParameter("no subscriptions given"));
    }

    for subscription in subscriptions {
        if subscription.topic_filter.is_empty() {
            return Err(EncodeError::BadParameter("topic filter is empty"));
        }
        if subscription.topic_filter.len() > u16::MAX as usize {
            return Err(EncodeError::BadParameter(
                "topic filter longer than 65535 bytes",
            ));
        }
        // No-local on a shared subscription is a protocol error.
        if subscription.no_local && subscription.topic_filter.starts_with("$share/") {
            return Err(EncodeError::BadParameter(
                "no-local is not allowed on a shared subscription",
            ));
        }
    }

    Ok(())
}

fn write_subscribe_body<W: PacketSink>(
    sink: &mut W,
    packet_identifier: u16,
    subscriptions: &[Subscription<'_>],
    properties: Option<&PropertyBuilder<'_>>,
) -> Result<(), EncodeError> {
    sink.write_u16(packet_identifier)?;
    write_property_block(sink, properties)?;

    for subscription in subscriptions {
        crate::strings::write_string(sink, subscription.topic_filter)?;
        sink.write_byte(subscription.options_byte())?;
    }

    Ok(())
}

/// Compute the Remaining Length and total size of a SUBSCRIBE packet.
pub fn subscribe_packet_size(
    subscriptions: &[Subscription<'_>],
    properties: Option<&PropertyBuilder<'_>>,
    max_packet_size: u32,
) -> Result<PacketSize, EncodeError> {
    check_max_packet_size(max_packet_size)?;
    validate_subscriptions(subscriptions)?;

    let remaining_length =
        measure_body(|sink| write_subscribe_body(sink, 0, subscriptions, properties))?;

    finish_packet_size(remaining_length, max_packet_size)
}

/// Serialize a SUBSCRIBE packet into `buffer`.
pub fn serialize_subscribe(
    subscriptions: &[Subscription<'_>],
    properties: Option<&PropertyBuilder<'_>>,
    packet_identifier: u16,
    remaining_length: usize,
    buffer: &mut [u8],
) -> Result<usize, EncodeError> {
    if packet_identifier == 0 {
        return Err(EncodeError::BadParameter("packet identifier is zero"));
    }
    validate_subscriptions(subscriptions)?;

    serialize_packet(
        buffer,
        PacketType::Subscribe.byte(),
        remaining_length,
        |w| write_subscribe_body(w, packet_identifier, subscriptions, properties),
    )
}
