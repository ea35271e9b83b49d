use std::fmt::{Display, Formatter};

use bytes::Bytes;
use thiserror::Error;

use crate::sequence::SequenceNumber;

/// Number of hex characters in the encoded suffix: 8 groups of 4.
pub const SUFFIX_HEX_LEN: usize = 32;

/// Payload bytes that survive encoding without truncation: the 32-character
/// suffix minus the two characters taken by the sequence number.
pub const MAX_LOSSLESS_PAYLOAD: usize = 15;

/// Upper bound the codec accepts per call. A 16th byte is dropped entirely
/// by the suffix truncation, so senders that care about their data stay at
/// [MAX_LOSSLESS_PAYLOAD].
pub const MAX_PAYLOAD: usize = 16;

/// One sequenced unit of payload carried by the covert channel.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Frame {
    pub sequence: SequenceNumber,
    pub payload: Bytes,
}

/// A synthetic address literal with a frame encoded into its suffix groups.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AddressLiteral(String);

impl AddressLiteral {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for AddressLiteral {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("address literal {0:?} has no suffix groups")]
    MissingSuffix(String),
    #[error("address literal {0:?} carries non-hex or odd-length data")]
    MalformedHex(String),
}

/// Packs a sequence number and up to [MAX_PAYLOAD] payload bytes into the
/// suffix of an address literal: two hex characters of sequence number
/// followed by the hex-rendered payload, truncated to [SUFFIX_HEX_LEN]
/// characters, right-padded with `'0'`, and grouped in fours.
pub fn encode(peer_prefix: &str, sequence: SequenceNumber, payload: &[u8]) -> AddressLiteral {
    debug_assert!(payload.len() <= MAX_PAYLOAD, "caller must slice payloads to at most {} bytes", MAX_PAYLOAD);

    let mut suffix = String::with_capacity(SUFFIX_HEX_LEN);
    suffix.push_str(&format!("{:02x}", sequence.to_raw()));
    for byte in payload {
        suffix.push_str(&format!("{:02x}", byte));
    }
    suffix.truncate(SUFFIX_HEX_LEN);
    while suffix.len() < SUFFIX_HEX_LEN {
        suffix.push('0');
    }

    let mut literal = String::with_capacity(peer_prefix.len() + SUFFIX_HEX_LEN + SUFFIX_HEX_LEN / 4);
    literal.push_str(peer_prefix);
    for group in suffix.as_bytes().chunks(4) {
        literal.push(':');
        // groups are sliced from an ASCII hex string
        literal.push_str(std::str::from_utf8(group).unwrap_or(""));
    }

    AddressLiteral(literal)
}

/// Unpacks an address literal: the first `:`-separated field is the peer
/// prefix and is discarded, the first two hex characters of the remainder are
/// the sequence number, the rest hex-decodes to the payload.
///
/// The wire format carries no length field, so padding zeros are
/// indistinguishable from payload bytes that happen to be zero. Trailing zero
/// bytes are stripped here, which restores every payload that does not itself
/// end in a zero byte.
pub fn decode(literal: &str) -> Result<Frame, DecodeError> {
    let mut fields = literal.split(':');
    let _peer_prefix = fields.next();
    let suffix = fields.collect::<String>();

    if suffix.len() < 2 {
        return Err(DecodeError::MissingSuffix(literal.to_string()));
    }
    if suffix.len() % 2 != 0 {
        return Err(DecodeError::MalformedHex(literal.to_string()));
    }

    let seq_chars = std::str::from_utf8(&suffix.as_bytes()[..2])
        .map_err(|_| DecodeError::MalformedHex(literal.to_string()))?;
    let sequence = u8::from_str_radix(seq_chars, 16)
        .map_err(|_| DecodeError::MalformedHex(literal.to_string()))?;

    let mut payload = Vec::with_capacity(suffix.len() / 2 - 1);
    for pair in suffix.as_bytes()[2..].chunks(2) {
        let pair = std::str::from_utf8(pair)
            .map_err(|_| DecodeError::MalformedHex(literal.to_string()))?;
        let byte = u8::from_str_radix(pair, 16)
            .map_err(|_| DecodeError::MalformedHex(literal.to_string()))?;
        payload.push(byte);
    }

    while payload.last() == Some(&0) {
        payload.pop();
    }

    Ok(Frame {
        sequence: SequenceNumber::from_raw(sequence),
        payload: Bytes::from(payload),
    })
}

/// The stable part of an address literal, used as the peer's identity for
/// session lookup.
pub fn peer_prefix(literal: &str) -> &str {
    literal.split(':').next().unwrap_or("")
}
