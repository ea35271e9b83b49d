use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::sync::RwLock;
use tracing::{debug, error, trace};

use crate::codec::Frame;
use crate::control::AckMessage;
use crate::forward::Forwarder;
use crate::sequence::{SequenceNumber, SequenceRelation};
use crate::transport::Transport;

struct ReassemblyInner {
    transport: Arc<dyn Transport>,
    forwarder: Arc<dyn Forwarder>,

    /// next sequence number due for in-order delivery; only ever advances
    expected_sequence: SequenceNumber,
    /// frames that arrived ahead of `expected_sequence`, keyed by sequence
    /// number. Never contains `expected_sequence` once a receive cycle has
    /// completed.
    pending: BTreeMap<SequenceNumber, Bytes>,
}

impl ReassemblyInner {
    /// Forwards a payload, acknowledges it, and advances the window.
    ///
    /// A forwarding failure is logged but does not roll anything back: from
    /// the channel's perspective the frame was received, and re-requesting it
    /// would not make the destination reachable.
    async fn deliver(&mut self, sequence: SequenceNumber, payload: &[u8], reply_addr: &str, reply_port: u16) {
        if let Err(e) = self.forwarder.forward(payload).await {
            error!("{}", e);
        }
        self.send_ack_message(AckMessage::Ack(sequence), reply_addr, reply_port).await;
        self.expected_sequence = self.expected_sequence.next();
    }

    async fn send_ack_message(&self, message: AckMessage, reply_addr: &str, reply_port: u16) {
        let mut buf = BytesMut::new();
        message.ser(&mut buf);

        trace!("sending {:?} to {}:{}", message, reply_addr, reply_port);
        if let Err(e) = self.transport.send(&buf, reply_addr, reply_port).await {
            error!("error sending {:?} to {}:{}: {}", message, reply_addr, reply_port, e);
        }
    }
}

/// Receiver-side per-peer session: delivers the peer's byte stream to the
/// forwarding collaborator in strict sequence order despite out-of-order and
/// duplicate arrivals, and answers every frame with exactly one ACK or NACK.
pub struct ReassemblyWindow {
    inner: Arc<RwLock<ReassemblyInner>>,
}

impl ReassemblyWindow {
    pub fn new(transport: Arc<dyn Transport>, forwarder: Arc<dyn Forwarder>) -> ReassemblyWindow {
        ReassemblyWindow {
            inner: Arc::new(RwLock::new(ReassemblyInner {
                transport,
                forwarder,
                expected_sequence: SequenceNumber::ZERO,
                pending: BTreeMap::default(),
            })),
        }
    }

    /// One receive cycle. The session's exclusive guard is held for the whole
    /// cycle, so concurrent frames for the same peer cannot interleave their
    /// updates to the window.
    pub async fn on_frame(&self, frame: Frame, reply_addr: &str, reply_port: u16) {
        let mut inner = self.inner.write().await;
        let expected = inner.expected_sequence;

        match frame.sequence.relative_to(expected) {
            SequenceRelation::Ahead => {
                debug!("frame #{} arrived ahead of expected #{} - buffering and requesting the missing frame", frame.sequence, expected);
                // a duplicate of a buffered frame just overwrites its twin
                inner.pending.insert(frame.sequence, frame.payload);
                inner.send_ack_message(AckMessage::Nack(expected), reply_addr, reply_port).await;
            }
            SequenceRelation::Equal => {
                trace!("frame #{} is in order - delivering", frame.sequence);
                inner.deliver(frame.sequence, &frame.payload, reply_addr, reply_port).await;

                // drain the contiguous run that this frame may have completed
                loop {
                    let next = inner.expected_sequence;
                    let Some(payload) = inner.pending.remove(&next) else {
                        break;
                    };
                    trace!("draining buffered frame #{}", next);
                    inner.deliver(next, &payload, reply_addr, reply_port).await;
                }
            }
            SequenceRelation::Behind => {
                debug!("duplicate of already delivered frame #{} - re-acknowledging only", frame.sequence);
                inner.send_ack_message(AckMessage::Ack(frame.sequence), reply_addr, reply_port).await;
            }
        }
    }

    #[cfg(test)]
    async fn set_expected_sequence(&self, sequence: SequenceNumber) {
        self.inner.write().await.expected_sequence = sequence;
    }
}
