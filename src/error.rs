//
//   This Source Code Form is subject to the terms of the Mozilla Public
//   License, v. 2.0. If a copy of the MPL was not distributed with this
//   file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
//! Error types for the encode and decode halves of the codec

/// Errors produced while sizing or serializing an outgoing packet.
///
/// Both variants are recoverable: `BadParameter` by fixing the call,
/// `NoMemory` by supplying a larger buffer. A failed serialization never
/// leaves a partial packet in the destination buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// An argument was structurally invalid before any byte was written.
    #[error("invalid argument: {0}")]
    BadParameter(&'static str),

    /// The destination buffer is smaller than the required packet size.
    #[error("buffer of {available} bytes cannot hold {needed} bytes")]
    NoMemory { needed: usize, available: usize },
}

/// Errors produced while reading or deserializing an incoming packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The peer sent bytes that violate the MQTT 5.0 specification.
    ///
    /// Fatal for the connection: the stream can no longer be trusted to
    /// be packet-aligned.
    #[error("protocol violation: {0}")]
    Malformed(&'static str),

    /// A structurally valid packet whose reason code signals rejection.
    #[error("server refused the request with reason code {0:#04x}")]
    ServerRefused(u8),

    /// More bytes must arrive before the packet can be parsed.
    ///
    /// Not a failure. Retry the same call once the transport has
    /// delivered more data.
    #[error("the packet is incomplete, more bytes are needed")]
    NeedMoreBytes,

    /// The transport had no data to hand out.
    ///
    /// Not a failure. Expected on non-blocking transports; retry later.
    #[error("no data available from the transport")]
    NoData,

    /// The transport receive call itself failed.
    #[error("the transport receive call failed")]
    RecvFailed,

    /// An argument was invalid, independent of the received bytes.
    #[error("invalid argument: {0}")]
    BadParameter(&'static str),
}

impl DecodeError {
    /// Map a winnow error to the public taxonomy.
    ///
    /// `Incomplete` only arises from `Partial` input and is the
    /// flow-control signal, everything else means the peer violated the
    /// protocol.
    pub(crate) fn from_parse_error<E>(
        error: winnow::error::ErrMode<E>,
        context: &'static str,
    ) -> DecodeError {
        match error {
            winnow::error::ErrMode::Incomplete(_) => DecodeError::NeedMoreBytes,
            _ => DecodeError::Malformed(context),
        }
    }
}

#[cfg(test)]
mod tests {
    use winnow::error::ContextError;
    use winnow::error::ErrMode;
    use winnow::error::Needed;

    use super::DecodeError;

    #[test]
    fn incomplete_maps_to_need_more_bytes() {
        let err: ErrMode<ContextError> = ErrMode::Incomplete(Needed::new(1));
        assert_eq!(
            DecodeError::from_parse_error(err, "x"),
            DecodeError::NeedMoreBytes
        );
    }

    #[test]
    fn backtrack_maps_to_malformed() {
        let err: ErrMode<ContextError> = ErrMode::Backtrack(ContextError::new());
        assert_eq!(
            DecodeError::from_parse_error(err, "bad header"),
            DecodeError::Malformed("bad header")
        );
    }
}
