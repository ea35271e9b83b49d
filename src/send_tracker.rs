use std::cmp::min;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::RwLock;
use tokio::time;
use tracing::{debug, error, trace};

use crate::codec;
use crate::sequence::SequenceNumber;
use crate::transport::Transport;

pub struct SendTrackerConfig {
    /// backoff start for a frame's first negative acknowledgment
    pub initial_retransmission_delay: Duration,
    /// backoff ceiling - repeated negative acknowledgments never push the
    /// delay beyond this
    pub retransmission_ceiling: Duration,
}

struct OutstandingFrame {
    payload: Bytes,
    delay: Duration,
}

struct SendTrackerInner {
    config: Arc<SendTrackerConfig>,
    transport: Arc<dyn Transport>,
    peer_prefix: String,
    peer_port: u16,

    next_sequence: SequenceNumber,
    /// frames sent but not yet acknowledged, keyed by sequence number
    outstanding: BTreeMap<SequenceNumber, OutstandingFrame>,
}

impl SendTrackerInner {
    async fn send_frame(&self, sequence: SequenceNumber, payload: &[u8]) {
        let literal = codec::encode(&self.peer_prefix, sequence, payload);
        trace!("sending frame #{} as {}", sequence, literal);

        // the frame travels in the address field, the datagram body stays empty
        if let Err(e) = self.transport.send(b"", literal.as_str(), self.peer_port).await {
            error!("error sending frame #{} towards {}: {}", sequence, self.peer_prefix, e);
        }
    }
}

/// Sender-side per-peer session: hands out sequence numbers, remembers every
/// frame that was sent but not yet acknowledged, and retransmits with
/// exponential backoff when the peer reports a gap.
///
/// Retransmission is reactive only - it happens solely in response to a
/// received negative acknowledgment, never on a timeout of the tracker's own.
pub struct SendTracker {
    inner: Arc<RwLock<SendTrackerInner>>,
}

impl SendTracker {
    pub fn new(
        config: Arc<SendTrackerConfig>,
        transport: Arc<dyn Transport>,
        peer_prefix: String,
        peer_port: u16,
    ) -> SendTracker {
        SendTracker {
            inner: Arc::new(RwLock::new(SendTrackerInner {
                config,
                transport,
                peer_prefix,
                peer_port,
                next_sequence: SequenceNumber::ZERO,
                outstanding: BTreeMap::default(),
            })),
        }
    }

    /// Assigns the next sequence number to `payload`, emits the frame, and
    /// records it for potential retransmission.
    pub async fn send_next(&self, payload: Bytes) -> SequenceNumber {
        let mut inner = self.inner.write().await;

        let sequence = inner.next_sequence;
        inner.next_sequence = sequence.next();

        inner.send_frame(sequence, &payload).await;

        let delay = inner.config.initial_retransmission_delay;
        inner.outstanding.insert(sequence, OutstandingFrame { payload, delay });

        sequence
    }

    /// Drops the acknowledged frame. A late or duplicate acknowledgment for a
    /// frame that is no longer tracked is not an error.
    pub async fn on_ack(&self, sequence: SequenceNumber) {
        let mut inner = self.inner.write().await;
        if inner.outstanding.remove(&sequence).is_some() {
            trace!("frame #{} acknowledged", sequence);
        }
        else {
            debug!("late or duplicate ACK for frame #{} - ignoring", sequence);
        }
    }

    /// Doubles the frame's backoff delay (capped at the ceiling), re-records
    /// it, and retransmits the original payload at the same sequence number
    /// once the new delay has passed. The retransmission is skipped if the
    /// frame gets acknowledged while the delay is pending. A NACK for a frame
    /// that is not tracked (already acknowledged, or never sent by this
    /// tracker) is a no-op.
    pub async fn on_nack(&self, sequence: SequenceNumber) {
        let mut inner = self.inner.write().await;
        let ceiling = inner.config.retransmission_ceiling;

        let Some(frame) = inner.outstanding.get_mut(&sequence) else {
            debug!("NACK for frame #{} that is not outstanding - ignoring", sequence);
            return;
        };

        frame.delay = min(frame.delay * 2, ceiling);
        let delay = frame.delay;
        let payload = frame.payload.clone();
        debug!("NACK for frame #{} - retransmitting after {:?}", sequence, delay);

        let inner_arc = self.inner.clone();
        tokio::spawn(async move {
            time::sleep(delay).await;

            let inner = inner_arc.read().await;
            if inner.outstanding.contains_key(&sequence) {
                inner.send_frame(sequence, &payload).await;
            }
            else {
                trace!("frame #{} acknowledged before retransmission - skipping", sequence);
            }
        });
    }

    pub async fn num_outstanding(&self) -> usize {
        self.inner.read().await.outstanding.len()
    }
}
