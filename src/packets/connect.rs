//
//   This Source Code Form is subject to the terms of the Mozilla Public
//   License, v. 2.0. If a copy of the MPL was not distributed with this
//   file, You can obtain one at http://mozilla.org/MPL/2.0/.
//

use crate::error::EncodeError;
use crate::fixed_header::PacketType;
use crate::packets::PacketSize;
use crate::packets::finish_packet_size;
use crate::packets::measure_body;
use crate::packets::serialize_packet;
use crate::packets::write_property_block;
use crate::properties::PropertyBuilder;
use crate::qos::QualityOfService;
use crate::write::PacketSink;

const PROTOCOL_NAME: &str = "MQTT";
const PROTOCOL_LEVEL: u8 = 5;

/// CONNECT packet parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectInfo<'i> {
    /// Start a fresh session instead of resuming a previous one.
    pub clean_start: bool,
    /// Keep-alive interval in seconds; 0 disables the mechanism.
    pub keep_alive_seconds: u16,
    /// Must be non-empty and unique per client.
    pub client_identifier: &'i str,
    pub user_name: Option<&'i str>,
    pub password: Option<&'i [u8]>,
}

/// The Will message registered with a CONNECT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WillInfo<'i> {
    pub qos: QualityOfService,
    pub retain: bool,
    pub topic_name: &'i str,
    pub payload: &'i [u8],
}

fn connect_flags(info: &ConnectInfo<'_>, will: Option<&WillInfo<'_>>) -> u8 {
    let mut flags = (info.clean_start as u8) << 1;

    if let Some(will) = will {
        flags |= 1 << 2;
        flags |= u8::from(will.qos) << 3;
        flags |= (will.retain as u8) << 5;
    }
    if info.password.is_some() {
        flags |= 1 << 6;
    }
    if info.user_name.is_some() {
        flags |= 1 << 7;
    }

    flags
}

fn write_connect_body<W: PacketSink>(
    sink: &mut W,
    info: &ConnectInfo<'_>,
    will: Option<&WillInfo<'_>>,
    properties: Option<&PropertyBuilder<'_>>,
    will_properties: Option<&PropertyBuilder<'_>>,
) -> Result<(), EncodeError> {
    crate::strings::write_string(sink, PROTOCOL_NAME)?;
    sink.write_byte(PROTOCOL_LEVEL)?;
    sink.write_byte(connect_flags(info, will))?;
    sink.write_u16(info.keep_alive_seconds)?;
    write_property_block(sink, properties)?;

    crate::strings::write_string(sink, info.client_identifier)?;

    if let Some(will) = will {
        write_property_block(sink, will_properties)?;
        crate::strings::write_string(sink, will.topic_name)?;
        crate::bytes::write_binary_data(sink, will.payload)?;
    }

    if let Some(user_name) = info.user_name {
        crate::strings::write_string(sink, user_name)?;
    }
    if let Some(password) = info.password {
        crate::bytes::write_binary_data(sink, password)?;
    }

    Ok(())
}

fn validate_connect_params(
    info: &ConnectInfo<'_>,
    will: Option<&WillInfo<'_>>,
) -> Result<(), EncodeError> {
    if info.client_identifier.is_empty() {
        return Err(EncodeError::BadParameter("client identifier is empty"));
    }
    if info.client_identifier.len() > u16::MAX as usize {
        return Err(EncodeError::BadParameter(
            "client identifier longer than 65535 bytes",
        ));
    }
    if info.user_name.is_some_and(|u| u.len() > u16::MAX as usize) {
        return Err(EncodeError::BadParameter("user name longer than 65535 bytes"));
    }
    if info.password.is_some_and(|p| p.len() > u16::MAX as usize) {
        return Err(EncodeError::BadParameter("password longer than 65535 bytes"));
    }

    if let Some(will) = will {
        if will.topic_name.is_empty() {
            return Err(EncodeError::BadParameter("will topic is empty"));
        }
        // Topic and payload each get a 16-bit length prefix; their sum
        // bounds both at once.
        if will.topic_name.len() + will.payload.len() > u16::MAX as usize {
            return Err(EncodeError::BadParameter(
                "will topic and payload exceed the 16-bit length fields",
            ));
        }
    }

    Ok(())
}

/// Compute the Remaining Length and total size of a CONNECT packet.
///
/// CONNECT precedes any negotiation, so only the protocol's own packet
/// size ceiling applies.
pub fn connect_packet_size(
    info: &ConnectInfo<'_>,
    will: Option<&WillInfo<'_>>,
    properties: Option<&PropertyBuilder<'_>>,
    will_properties: Option<&PropertyBuilder<'_>>,
) -> Result<PacketSize, EncodeError> {
    validate_connect_params(info, will)?;

    let remaining_length =
        measure_body(|sink| write_connect_body(sink, info, will, properties, will_properties))?;

    finish_packet_size(remaining_length, crate::connection::MAXIMUM_PACKET_SIZE)
}

/// Serialize a CONNECT packet into `buffer`.
///
/// `remaining_length` must come from [`connect_packet_size`] over the
/// same inputs.
pub fn serialize_connect(
    info: &ConnectInfo<'_>,
    will: Option<&WillInfo<'_>>,
    properties: Option<&PropertyBuilder<'_>>,
    will_properties: Option<&PropertyBuilder<'_>>,
    remaining_length: usize,
    buffer: &mut [u8],
) -> Result<usize, EncodeError> {
    validate_connect_params(info, will)?;

    serialize_packet(buffer, PacketType::Connect.byte(), remaining_length, |w| {
        write_connect_body(w, info, will, properties, will_properties)
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::ConnectInfo;
    use super::WillInfo;
    use super::connect_packet_size;
    use super::serialize_connect;
    use crate::error::EncodeError;
    use crate::properties::PropertyBuilder;
    use crate::qos::QualityOfService;

    fn minimal_connect() -> ConnectInfo<'static> {
        ConnectInfo {
            clean_start: true,
            keep_alive_seconds: 60,
            client_identifier: "TEST",
            user_name: None,
            password: None,
        }
    }

    #[test]
    fn minimal_connect_sizes() {
        let size = connect_packet_size(&minimal_connect(), None, None, None).unwrap();
        assert_eq!(size.remaining_length, 17);
        assert_eq!(size.packet_size, 19);
    }

    #[test]
    fn minimal_connect_bytes() {
        let size = connect_packet_size(&minimal_connect(), None, None, None).unwrap();

        let mut buffer = [0u8; 32];
        let written =
            serialize_connect(&minimal_connect(), None, None, None, size.remaining_length, &mut buffer)
                .unwrap();

        assert_eq!(written, size.packet_size);
        #[rustfmt::skip]
        assert_eq!(
            &buffer[..written],
            &[
                0x10, 17,
                0x00, 0x04, b'M', b'Q', b'T', b'T',
                0x05,
                0b0000_0010,          // clean start
                0x00, 60,             // keep alive
                0x00,                 // empty properties
                0x00, 0x04, b'T', b'E', b'S', b'T',
            ]
        );
    }

    #[test]
    fn serializer_leaves_sentinel_bytes_untouched() {
        let size = connect_packet_size(&minimal_connect(), None, None, None).unwrap();

        let mut buffer = [0xAAu8; 32];
        let written = serialize_connect(
            &minimal_connect(),
            None,
            None,
            None,
            size.remaining_length,
            &mut buffer[..size.packet_size],
        )
        .unwrap();

        assert_eq!(written, size.packet_size);
        assert!(buffer[size.packet_size..].iter().all(|&b| b == 0xAA));
    }

    #[test]
    fn connect_with_will_and_credentials() {
        let info = ConnectInfo {
            clean_start: false,
            keep_alive_seconds: 10,
            client_identifier: "c1",
            user_name: Some("user"),
            password: Some(b"pass"),
        };
        let will = WillInfo {
            qos: QualityOfService::AtLeastOnce,
            retain: true,
            topic_name: "will/topic",
            payload: b"gone",
        };

        let mut prop_buffer = [0u8; 16];
        let mut will_properties = PropertyBuilder::new(&mut prop_buffer);
        will_properties.add_will_delay_interval(30).unwrap();

        let size = connect_packet_size(&info, Some(&will), None, Some(&will_properties)).unwrap();

        let mut buffer = [0u8; 128];
        let written = serialize_connect(
            &info,
            Some(&will),
            None,
            Some(&will_properties),
            size.remaining_length,
            &mut buffer,
        )
        .unwrap();
        assert_eq!(written, size.packet_size);

        // flags: username, password, will retain, will qos 1, will flag
        assert_eq!(buffer[9], 0b1110_1100);
    }

    #[test]
    fn empty_client_identifier_is_rejected() {
        let mut info = minimal_connect();
        info.client_identifier = "";

        assert!(matches!(
            connect_packet_size(&info, None, None, None),
            Err(EncodeError::BadParameter(_))
        ));
    }

    #[test]
    fn undersized_buffer_is_rejected_without_partial_write() {
        let size = connect_packet_size(&minimal_connect(), None, None, None).unwrap();

        let mut buffer = [0xAAu8; 10];
        let result = serialize_connect(
            &minimal_connect(),
            None,
            None,
            None,
            size.remaining_length,
            &mut buffer,
        );

        assert_eq!(
            result,
            Err(EncodeError::NoMemory {
                needed: size.packet_size,
                available: 10,
            })
        );
        assert!(buffer.iter().all(|&b| b == 0xAA));
    }
}
