#![no_main]
use libfuzzer_sys::fuzz_target;
use mqtt5_codec::fixed_header::PacketInfo;
use mqtt5_codec::transport::process_packet_type_and_length;

fuzz_target!(|data: &[u8]| {
    let Ok(header) = process_packet_type_and_length(data) else {
        return;
    };
    let Some(remaining_data) = data
        .get(header.header_length..)
        .and_then(|rest| rest.get(..header.remaining_length))
    else {
        return;
    };

    let packet = PacketInfo {
        packet_type: header.packet_type,
        remaining_data,
    };

    let mut connection = mqtt5_codec::ConnectionProperties::new();
    let _ = mqtt5_codec::packets::connack::deserialize_connack(&mut connection, &packet);
    let _ = mqtt5_codec::packets::publish::deserialize_publish(&packet, u16::MAX);
    let _ = mqtt5_codec::packets::ack::deserialize_puback(&packet, true, u32::MAX);
    let _ = mqtt5_codec::packets::ack::deserialize_pubrec(&packet, true, u32::MAX);
    let _ = mqtt5_codec::packets::ack::deserialize_pubrel(&packet, true, u32::MAX);
    let _ = mqtt5_codec::packets::ack::deserialize_pubcomp(&packet, true, u32::MAX);
    let _ = mqtt5_codec::packets::suback::deserialize_suback(&packet, true, u32::MAX);
    let _ = mqtt5_codec::packets::unsuback::deserialize_unsuback(&packet, true, u32::MAX);
    let _ = mqtt5_codec::packets::disconnect::deserialize_disconnect(&packet, u32::MAX);
    let _ = mqtt5_codec::packets::ping::deserialize_pingresp(&packet);
});
