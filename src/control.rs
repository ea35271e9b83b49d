use bytes::{BufMut, BytesMut};

use crate::sequence::SequenceNumber;

/// Acknowledgment grammar: the receiver answers every successfully decoded
/// frame with exactly one of these, sent as the payload of a reply to the
/// originating peer. Acknowledgments are never themselves acknowledged.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AckMessage {
    /// `ACK<seq>`: the frame with this sequence number was delivered (or had
    /// been delivered before), and the sender can drop it.
    Ack(SequenceNumber),
    /// `NACK<seq>`: the receiver is still waiting for this sequence number
    /// and asks for a retransmission.
    Nack(SequenceNumber),
}

impl AckMessage {
    pub fn ser(&self, buf: &mut BytesMut) {
        match self {
            AckMessage::Ack(sequence) => buf.put_slice(format!("ACK{}", sequence).as_bytes()),
            AckMessage::Nack(sequence) => buf.put_slice(format!("NACK{}", sequence).as_bytes()),
        }
    }

    /// Parses an acknowledgment payload. Anything that is not well-formed
    /// `ACK<seq>` / `NACK<seq>` yields `None` and is dropped by the caller -
    /// there is no error channel back to a peer that sends garbage.
    pub fn try_parse(buf: &[u8]) -> Option<AckMessage> {
        let text = std::str::from_utf8(buf).ok()?.trim();

        if let Some(raw) = text.strip_prefix("NACK") {
            return Some(AckMessage::Nack(SequenceNumber::from_raw(raw.parse().ok()?)));
        }
        if let Some(raw) = text.strip_prefix("ACK") {
            return Some(AckMessage::Ack(SequenceNumber::from_raw(raw.parse().ok()?)));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use super::*;

    #[rstest]
    #[case::ack_zero(AckMessage::Ack(SequenceNumber::ZERO), b"ACK0")]
    #[case::ack(AckMessage::Ack(SequenceNumber::from_raw(42)), b"ACK42")]
    #[case::ack_max(AckMessage::Ack(SequenceNumber::from_raw(255)), b"ACK255")]
    #[case::nack(AckMessage::Nack(SequenceNumber::from_raw(7)), b"NACK7")]
    fn test_ser(#[case] message: AckMessage, #[case] expected: &[u8]) {
        let mut buf = BytesMut::new();
        message.ser(&mut buf);
        assert_eq!(buf.as_ref(), expected);
    }

    #[rstest]
    #[case::ack(b"ACK3", Some(AckMessage::Ack(SequenceNumber::from_raw(3))))]
    #[case::nack(b"NACK200", Some(AckMessage::Nack(SequenceNumber::from_raw(200))))]
    #[case::trailing_newline(b"ACK3\n", Some(AckMessage::Ack(SequenceNumber::from_raw(3))))]
    #[case::missing_sequence(b"ACK", None)]
    #[case::sequence_out_of_range(b"ACK300", None)]
    #[case::negative_sequence(b"NACK-1", None)]
    #[case::unknown_tag(b"SYN3", None)]
    #[case::empty(b"", None)]
    #[case::not_utf8(b"\xff\xfe", None)]
    #[case::lowercase(b"ack3", None)]
    fn test_try_parse(#[case] buf: &[u8], #[case] expected: Option<AckMessage>) {
        assert_eq!(AckMessage::try_parse(buf), expected);
    }
}
