//! Tunnels an arbitrary byte stream across a covert channel that carries its
//! data in the destination-address field of outbound packets instead of a
//! conventional payload.
//!
//! The sender accepts a local stream connection (e.g. an SSH session), slices
//! the bytes into small frames, packs each frame into a synthetic address
//! literal and emits it; the receiver observes incoming addressed packets,
//! decodes the frames, restores the original ordering and forwards the
//! recovered stream to the real destination service. The carrier is
//! connectionless, unordered and drops frames silently, so the crate brings
//! its own reliability layer: sequencing, acknowledgment, gap detection,
//! retransmission and reassembly.
//!
//! ## Address encoding
//!
//! A frame is a single-byte sequence number plus up to 16 payload bytes. On
//! the wire it becomes the suffix of an address literal:
//!
//! ```ascii
//! <peer prefix> ':' g1 ':' g2 ':' ... ':' g8
//! ```
//!
//! where `g1..g8` are four hex characters each: two characters of sequence
//! number followed by the hex-rendered payload, truncated to 32 characters
//! and right-padded with `'0'`. There is no length field - trailing zero
//! bytes of a payload are indistinguishable from padding, which is an
//! accepted ambiguity of the format (senders slice at 15 bytes so nothing is
//! ever truncated away).
//!
//! ## Reliability rules
//!
//! * the receiver answers every successfully decoded frame with exactly one
//!   `ACK<seq>` or `NACK<seq>` reply (decimal sequence number, sent as an
//!   ordinary datagram payload)
//! * in-order frames are forwarded immediately; out-of-order frames are
//!   buffered and the still-missing sequence number is NACK'ed
//! * filling a gap drains the whole contiguous run of buffered frames
//! * duplicates of already delivered frames are re-ACK'ed but never
//!   re-forwarded
//! * the sender retransmits only in reaction to a NACK, with per-frame
//!   exponential backoff up to a fixed ceiling
//! * acknowledgments are never themselves acknowledged
//!
//! Delivery order is guaranteed per peer; frames of different peers are
//! independent. All session state is in-memory and lost on restart.
//!
//! Raw packet I/O is not this crate's business: the [transport::Transport]
//! collaborator hands frames to whatever actually puts packets on the wire,
//! and [forward::Forwarder] performs the final TCP hand-off to the
//! destination service.

pub mod codec;
pub mod control;
pub mod forward;
pub mod reassembly;
pub mod receiver;
pub mod send_tracker;
pub mod sender;
pub mod sequence;
pub mod transport;


#[cfg(test)]
mod test {
    use tracing::Level;

    #[ctor::ctor]
    fn init_test_logging() {
        tracing_subscriber::fmt()
            .with_max_level(Level::TRACE)
            .try_init()
            .ok();
    }
}
