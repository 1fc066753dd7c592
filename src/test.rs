//
//   This Source Code Form is subject to the terms of the Mozilla Public
//   License, v. 2.0. If a copy of the MPL was not distributed with this
//   file, You can obtain one at http://mozilla.org/MPL/2.0/.
//

use crate::error::EncodeError;
use crate::write::BufWriter;
use crate::write::PacketSink;

/// Run a writer closure against a large scratch buffer and hand back
/// exactly the bytes it produced.
pub(crate) fn collect_writes<F>(f: F) -> Vec<u8>
where
    F: FnOnce(&mut BufWriter<'_>) -> Result<(), EncodeError>,
{
    let mut buffer = [0u8; 1024];
    let mut writer = BufWriter::new(&mut buffer);
    f(&mut writer).unwrap();
    let written = writer.written();
    buffer[..written].to_vec()
}

/// Frame a full packet buffer into a [`PacketInfo`] the way a transport
/// loop would, using the real header parser.
///
/// [`PacketInfo`]: crate::fixed_header::PacketInfo
pub(crate) fn frame_packet(buffer: &[u8]) -> crate::fixed_header::PacketInfo<'_> {
    let header = crate::transport::process_packet_type_and_length(buffer).unwrap();
    crate::fixed_header::PacketInfo {
        packet_type: header.packet_type,
        remaining_data: &buffer[header.header_length..header.header_length + header.remaining_length],
    }
}
