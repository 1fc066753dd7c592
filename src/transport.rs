//
//   This Source Code Form is subject to the terms of the Mozilla Public
//   License, v. 2.0. If a copy of the MPL was not distributed with this
//   file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
//! Reading the fixed header of an incoming packet
//!
//! The codec never owns a socket. [`read_packet_type_and_length`] pulls
//! the 1–5 header bytes of the next packet through the caller's
//! [`TransportRecv`] implementation; transports that buffer bytes
//! themselves use [`process_packet_type_and_length`] over their own
//! span instead. Fetching the remaining-length bytes of the packet body
//! is the caller's job either way.

use winnow::Bytes;
use winnow::Partial;
use winnow::stream::Stream;

use crate::error::DecodeError;
use crate::fixed_header::PacketHeader;
use crate::fixed_header::PacketType;
use crate::integers::parse_variable_u32;
use crate::integers::variable_u32_binary_size;

/// Capability to synchronously receive bytes from some transport.
///
/// `recv` fills at most `buffer.len()` bytes and reports how many it
/// delivered. Returning `Ok(0)` means no data was available right now,
/// which is legal for non-blocking transports.
pub trait TransportRecv {
    type Error;

    fn recv(&mut self, buffer: &mut [u8]) -> Result<usize, Self::Error>;
}

impl<T: TransportRecv + ?Sized> TransportRecv for &mut T {
    type Error = T::Error;

    fn recv(&mut self, buffer: &mut [u8]) -> Result<usize, Self::Error> {
        (**self).recv(buffer)
    }
}

/// Read the type byte and remaining length of the next incoming packet.
///
/// Returns [`DecodeError::NoData`] when the transport has nothing to
/// hand out before the first header byte; retry later. Once the first
/// byte has been read the header must follow: a transport error maps to
/// [`DecodeError::RecvFailed`], a stalled or non-conformant remaining
/// length to [`DecodeError::Malformed`].
pub fn read_packet_type_and_length<T: TransportRecv>(
    mut transport: T,
) -> Result<PacketHeader, DecodeError> {
    let mut byte = [0u8; 1];

    let received = transport
        .recv(&mut byte)
        .map_err(|_| DecodeError::RecvFailed)?;
    if received == 0 {
        return Err(DecodeError::NoData);
    }

    let packet_type = byte[0];
    validate_incoming_type(packet_type)?;

    // Remaining length, one byte at a time as it arrives off the wire.
    let mut remaining_length: u32 = 0;
    let mut multiplier: u32 = 1;
    let mut bytes_decoded: u32 = 0;

    loop {
        if bytes_decoded == 4 {
            return Err(DecodeError::Malformed(
                "remaining length continues past four bytes",
            ));
        }

        let received = transport
            .recv(&mut byte)
            .map_err(|_| DecodeError::RecvFailed)?;
        if received != 1 {
            return Err(DecodeError::Malformed(
                "transport ended mid fixed header",
            ));
        }

        remaining_length += (byte[0] as u32 & 0x7F) * multiplier;
        multiplier *= 128;
        bytes_decoded += 1;

        if byte[0] & 0x80 == 0 {
            break;
        }
    }

    if bytes_decoded != variable_u32_binary_size(remaining_length) {
        return Err(DecodeError::Malformed(
            "remaining length is not minimally encoded",
        ));
    }

    Ok(PacketHeader {
        packet_type,
        remaining_length: remaining_length as usize,
        header_length: 1 + bytes_decoded as usize,
    })
}

/// Parse the type byte and remaining length out of an in-memory span.
///
/// The span does not need to hold the whole packet, only the header;
/// [`DecodeError::NeedMoreBytes`] asks the caller to retry with more
/// data appended.
pub fn process_packet_type_and_length(buffer: &[u8]) -> Result<PacketHeader, DecodeError> {
    let Some((&packet_type, rest)) = buffer.split_first() else {
        return Err(DecodeError::NeedMoreBytes);
    };

    validate_incoming_type(packet_type)?;

    let mut input = Partial::new(Bytes::new(rest));
    let remaining_length = parse_variable_u32(&mut input)
        .map_err(|e| DecodeError::from_parse_error(e, "malformed remaining length"))?;
    let length_bytes = rest.len() - input.eof_offset();

    Ok(PacketHeader {
        packet_type,
        remaining_length: remaining_length as usize,
        header_length: 1 + length_bytes,
    })
}

fn validate_incoming_type(byte: u8) -> Result<(), DecodeError> {
    let packet_type = PacketType::from_byte(byte)?;
    if !packet_type.is_client_incoming() {
        return Err(DecodeError::Malformed(
            "packet type is never sent to a client",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::TransportRecv;
    use super::process_packet_type_and_length;
    use super::read_packet_type_and_length;
    use crate::error::DecodeError;

    /// Hands out a canned byte stream in configurable chunks.
    struct ChunkedRecv<'a> {
        data: &'a [u8],
        position: usize,
    }

    impl<'a> ChunkedRecv<'a> {
        fn new(data: &'a [u8]) -> ChunkedRecv<'a> {
            ChunkedRecv { data, position: 0 }
        }
    }

    impl TransportRecv for ChunkedRecv<'_> {
        type Error = ();

        fn recv(&mut self, buffer: &mut [u8]) -> Result<usize, ()> {
            let available = &self.data[self.position..];
            let n = buffer.len().min(available.len());
            buffer[..n].copy_from_slice(&available[..n]);
            self.position += n;
            Ok(n)
        }
    }

    struct FailingRecv;

    impl TransportRecv for FailingRecv {
        type Error = &'static str;

        fn recv(&mut self, _buffer: &mut [u8]) -> Result<usize, &'static str> {
            Err("broken pipe")
        }
    }

    #[test]
    fn reads_type_and_length_from_transport() {
        let mut transport = ChunkedRecv::new(&[0x90, 0x80, 0x01, 0xFF]);

        let header = read_packet_type_and_length(&mut transport).unwrap();
        assert_eq!(header.packet_type, 0x90);
        assert_eq!(header.remaining_length, 128);
        assert_eq!(header.header_length, 3);
        assert_eq!(header.total_length(), 131);
        // the packet body is left unread
        assert_eq!(transport.position, 3);
    }

    #[test]
    fn empty_transport_reports_no_data() {
        let mut transport = ChunkedRecv::new(&[]);
        assert_eq!(
            read_packet_type_and_length(&mut transport),
            Err(DecodeError::NoData)
        );
    }

    #[test]
    fn failing_transport_reports_recv_failed() {
        assert_eq!(
            read_packet_type_and_length(FailingRecv),
            Err(DecodeError::RecvFailed)
        );
    }

    #[test]
    fn stalled_header_is_malformed() {
        // remaining length promises a continuation byte that never comes
        let mut transport = ChunkedRecv::new(&[0x40, 0x80]);
        assert!(matches!(
            read_packet_type_and_length(&mut transport),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn outgoing_only_types_are_rejected() {
        // SUBSCRIBE never flows towards a client
        let mut transport = ChunkedRecv::new(&[0x82, 0x00]);
        assert!(matches!(
            read_packet_type_and_length(&mut transport),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn five_length_bytes_are_malformed() {
        let mut transport = ChunkedRecv::new(&[0x30, 0xFF, 0xFF, 0xFF, 0xFF, 0x7F]);
        assert!(matches!(
            read_packet_type_and_length(&mut transport),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn in_memory_parse_matches_transport_parse() {
        let buffer = [0x90, 0x80, 0x01];
        let header = process_packet_type_and_length(&buffer).unwrap();
        assert_eq!(header.packet_type, 0x90);
        assert_eq!(header.remaining_length, 128);
        assert_eq!(header.header_length, 3);
    }

    #[test]
    fn in_memory_parse_asks_for_more_bytes() {
        assert_eq!(
            process_packet_type_and_length(&[]),
            Err(DecodeError::NeedMoreBytes)
        );
        assert_eq!(
            process_packet_type_and_length(&[0x90]),
            Err(DecodeError::NeedMoreBytes)
        );
        assert_eq!(
            process_packet_type_and_length(&[0x90, 0x80]),
            Err(DecodeError::NeedMoreBytes)
        );
    }

    #[test]
    fn in_memory_parse_rejects_non_minimal_length() {
        assert!(matches!(
            process_packet_type_and_length(&[0x90, 0x80, 0x00]),
            Err(DecodeError::Malformed(_))
        ));
    }
}
