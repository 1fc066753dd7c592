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
    pub enum UnsubackReasonCode {
        Success = crate::reason_code::Success,
        NoSubscriptionExisted = crate::reason_code::NoSubscriptionExisted,
        UnspecifiedError = crate::reason_code::UnspecifiedError,
        ImplementationSpecificError = crate::reason_code::ImplementationSpecificError,
        NotAuthorized = crate::reason_code::NotAuthorized,
        TopicFilterInvalid = crate::reason_code::TopicFilterInvalid,
        PacketIdentifierInUse = crate::reason_code::PacketIdentifierInUse,
    }
}

/// A received UNSUBACK.
#[derive(Debug, Clone, Copy)]
pub struct UnsubackInfo<'i> {
    pub packet_identifier: NonZeroU16,
    pub properties: PropertyReader<'i>,
    /// One verdict per topic filter of the UNSUBSCRIBE, in order.
    pub reason_codes: ReasonCodeInfo<'i, UnsubackReasonCode>,
}

/// Deserialize a received UNSUBACK.
pub fn deserialize_unsuback<'i>(
    packet: &PacketInfo<'i>,
    request_problem_info: bool,
    max_packet_size: u32,
) -> Result<UnsubackInfo<'i>, DecodeError> {
    let (packet_identifier, properties, reason_codes) = deserialize_subscription_ack(
        packet,
        PacketType::Unsuback,
        request_problem_info,
        max_packet_size,
    )?;

    Ok(UnsubackInfo {
        packet_identifier,
        properties,
        reason_codes,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::UnsubackReasonCode;
    use super::deserialize_unsuback;
    use crate::error::DecodeError;
    use crate::fixed_header::PacketInfo;

    #[test]
    fn unsuback_with_reason_string() {
        #[rustfmt::skip]
        let remaining = [
            0x00, 0x05,
            0x05, 0x1F, 0x00, 0x02, b'o', b'k',
            0x00, 0x11,
        ];
        let packet = PacketInfo {
            packet_type: 0xB0,
            remaining_data: &remaining,
        };

        let unsuback = deserialize_unsuback(&packet, true, 1024).unwrap();
        assert_eq!(unsuback.packet_identifier.get(), 5);

        let verdicts: Vec<_> = unsuback.reason_codes.iter().collect();
        assert_eq!(
            verdicts,
            vec![
                UnsubackReasonCode::Success,
                UnsubackReasonCode::NoSubscriptionExisted,
            ]
        );

        let mut properties = unsuback.properties;
        properties.next_id().unwrap();
        assert_eq!(properties.reason_string().unwrap(), "ok");
    }

    #[test]
    fn problem_information_must_have_been_requested() {
        #[rustfmt::skip]
        let remaining = [
            0x00, 0x05,
            0x05, 0x1F, 0x00, 0x02, b'o', b'k',
            0x00,
        ];
        let packet = PacketInfo {
            packet_type: 0xB0,
            remaining_data: &remaining,
        };

        assert!(matches!(
            deserialize_unsuback(&packet, false, 1024),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn wrong_packet_type_is_a_caller_error() {
        let packet = PacketInfo {
            packet_type: 0x90,
            remaining_data: &[0x00, 0x01, 0x00, 0x00],
        };

        assert!(matches!(
            deserialize_unsuback(&packet, true, 1024),
            Err(DecodeError::BadParameter(_))
        ));
    }
}
