//
//   This Source Code Form is subject to the terms of the Mozilla Public
//   License, v. 2.0. If a copy of the MPL was not distributed with this
//   file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
//! A pure MQTT 5.0 packet codec for client implementations.
//!
//! This crate turns structured descriptions of the client-side MQTT 5.0
//! control packets into their exact wire format and parses received,
//! already-framed packets back into structured data. It performs no
//! network I/O and no allocation: serializers write into caller-provided
//! buffers, deserializers borrow from the caller's receive buffer.
//!
//! The intended flow for an outgoing packet:
//!
//! 1. build the optional property block with a [`PropertyBuilder`],
//! 2. ask the matching `*_packet_size` function for the packet's
//!    remaining length and total size,
//! 3. serialize into a buffer of (at least) that size with the matching
//!    `serialize_*` function.
//!
//! For an incoming packet, [`transport::read_packet_type_and_length`]
//! (or its in-memory sibling) yields the packet type and remaining
//! length; once the remaining bytes are buffered, the per-packet
//! `deserialize_*` function validates and destructures them.
//!
//! [`PropertyBuilder`]: properties::PropertyBuilder

#![deny(missing_debug_implementations)]
#![deny(clippy::std_instead_of_core)]
#![deny(clippy::alloc_instead_of_core)]

pub mod bytes;
pub mod connection;
pub mod error;
pub mod fixed_header;
pub mod integers;
pub mod packets;
pub mod properties;
pub mod qos;
pub mod reason_code;
pub mod strings;
pub mod transport;
pub mod write;

#[cfg(test)]
pub(crate) mod test;

pub(crate) type ParseResult<O> = winnow::ModalResult<O>;

pub use crate::connection::ConnectionProperties;
pub use crate::error::DecodeError;
pub use crate::error::EncodeError;
pub use crate::fixed_header::PacketHeader;
pub use crate::fixed_header::PacketInfo;
pub use crate::properties::PropertyBuilder;
pub use crate::properties::PropertyReader;
