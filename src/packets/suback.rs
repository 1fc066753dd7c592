//
//   This Source Code Form is subject to the terms of the Mozilla Public
//   License, v. 2.0. If a copy of the MPL was not distributed with this
//   file, You can obtain one at http://mozilla.org/MPL/2.0/.
//

use core::num::NonZeroU16;

use crate::error::DecodeError;
use crate::fixed_header::PacketInfo;
use crate::fixed_header::PacketType;
use crate::packets::ReasonCodeInfo;
use crate::packets::deserialize_subscription_ack;
use crate::properties::PropertyReader;

crate::reason_code::make_combined_reason_code! {
    pub enum SubackReasonCode {
        GrantedQoS0 = crate::reason_code::GrantedQoS0,
        GrantedQoS1 = crate::reason_code::GrantedQoS1,
        GrantedQoS2 = crate::reason_code::GrantedQoS2,
        UnspecifiedError = crate::reason_code::UnspecifiedError,
        ImplementationSpecificError = crate::reason_code::ImplementationSpecificError,
        NotAuthorized = crate::reason_code::NotAuthorized,
        TopicFilterInvalid = crate::reason_code::TopicFilterInvalid,
        PacketIdentifierInUse = crate::reason_code::PacketIdentifierInUse,
        QuotaExceeded = crate::reason_code::QuotaExceeded,
        SharedSubscriptionsNotSupported = crate::reason_code::SharedSubscriptionsNotSupported,
        SubscriptionIdentifiersNotSupported = crate::reason_code::SubscriptionIdentifiersNotSupported,
        WildcardSubscriptionsNotSupported = crate::reason_code::WildcardSubscriptionsNotSupported,
    }
}

impl SubackReasonCode {
    /// Whether the server granted this subscription at some QoS.
    pub fn is_granted(self) -> bool {
        matches!(
            self,
            SubackReasonCode::GrantedQoS0
                | SubackReasonCode::GrantedQoS1
                | SubackReasonCode::GrantedQoS2
        )
    }
}

/// A received SUBACK.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubackInfo<'i> {
    pub packet_identifier: NonZeroU16,
    pub properties: PropertyReader<'i>,
    /// One verdict per topic filter of the SUBSCRIBE, in order.
    pub reason_codes: ReasonCodeInfo<'i, SubackReasonCode>,
}

/// Deserialize a received SUBACK.
pub fn deserialize_suback<'i>(
    packet: &PacketInfo<'i>,
    request_problem_info: bool,
    max_packet_size: u32,
) -> Result<SubackInfo<'i>, DecodeError> {
    let (packet_identifier, properties, reason_codes) = deserialize_subscription_ack(
        packet,
        PacketType::Suback,
        request_problem_info,
        max_packet_size,
    )?;

    Ok(SubackInfo {
        packet_identifier,
        properties,
        reason_codes,
    })
}
