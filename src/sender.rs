use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::TcpListener;
use tokio::time;
use tracing::{debug, error, info, trace};

use crate::codec;
use crate::control::AckMessage;
use crate::send_tracker::{SendTracker, SendTrackerConfig};
use crate::transport::Transport;

pub struct SenderConfig {
    /// address prefix of the remote peer that frames are encoded towards
    pub remote_addr: String,
    pub remote_port: u16,
    /// pause between consecutive frames of a local connection
    pub frame_interval: Duration,
}

/// Sender endpoint: accepts local stream connections, slices their bytes into
/// frames, and emits each frame through the per-peer tracker. A second
/// long-lived task consumes the acknowledgments coming back from the peer.
pub struct SenderEndpoint {
    config: Arc<SenderConfig>,
    transport: Arc<dyn Transport>,
    tracker: Arc<SendTracker>,
}

impl SenderEndpoint {
    pub fn new(
        config: Arc<SenderConfig>,
        tracker_config: Arc<SendTrackerConfig>,
        transport: Arc<dyn Transport>,
    ) -> SenderEndpoint {
        let tracker = Arc::new(SendTracker::new(
            tracker_config,
            transport.clone(),
            config.remote_addr.clone(),
            config.remote_port,
        ));

        SenderEndpoint {
            config,
            transport,
            tracker,
        }
    }

    /// Accepts local connections until the process ends. Failing to bind the
    /// listening socket is the only fatal error; everything after that is
    /// contained per connection.
    pub async fn run(&self, bind_address: &str, listen_port: u16) -> anyhow::Result<()> {
        let listener = TcpListener::bind((bind_address, listen_port)).await?;
        info!("listening on {}:{} for local connections", bind_address, listen_port);

        let ack_transport = self.transport.clone();
        let ack_tracker = self.tracker.clone();
        tokio::spawn(async move {
            Self::ack_loop(ack_transport, ack_tracker).await;
        });

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(x) => x,
                Err(e) => {
                    error!("error accepting local connection: {}", e);
                    continue;
                }
            };
            debug!("accepted local connection from {}", peer);

            let tracker = self.tracker.clone();
            let frame_interval = self.config.frame_interval;
            tokio::spawn(async move {
                Self::pump_local_connection(stream, tracker, frame_interval).await;
            });
        }
    }

    /// Reads the local byte stream until EOF, slicing it into frames small
    /// enough to survive the address encoding without truncation.
    async fn pump_local_connection(
        mut stream: impl AsyncRead + Unpin,
        tracker: Arc<SendTracker>,
        frame_interval: Duration,
    ) {
        let mut buf = [0u8; 1024];
        loop {
            match stream.read(&mut buf).await {
                Ok(0) => {
                    debug!("local connection closed");
                    return;
                }
                Ok(n) => {
                    for chunk in buf[..n].chunks(codec::MAX_LOSSLESS_PAYLOAD) {
                        let sequence = tracker.send_next(Bytes::copy_from_slice(chunk)).await;
                        trace!("emitted frame #{} with {} bytes", sequence, chunk.len());
                        time::sleep(frame_interval).await;
                    }
                }
                Err(e) => {
                    error!("error reading from local connection: {}", e);
                    return;
                }
            }
        }
    }

    /// Consumes ACK / NACK replies from the peer until the process ends.
    async fn ack_loop(transport: Arc<dyn Transport>, tracker: Arc<SendTracker>) {
        loop {
            let inbound = match transport.recv().await {
                Ok(inbound) => inbound,
                Err(e) => {
                    error!("transport error receiving acknowledgment: {}", e);
                    continue;
                }
            };
            Self::handle_acknowledgment(&tracker, &inbound.payload, &inbound.peer_addr).await;
        }
    }

    async fn handle_acknowledgment(tracker: &SendTracker, payload: &[u8], from: &str) {
        match AckMessage::try_parse(payload) {
            Some(AckMessage::Ack(sequence)) => {
                debug!("received ACK for frame #{} from {}", sequence, from);
                tracker.on_ack(sequence).await;
            }
            Some(AckMessage::Nack(sequence)) => {
                debug!("received NACK for frame #{} from {}", sequence, from);
                tracker.on_nack(sequence).await;
            }
            None => {
                trace!("dropping unrecognized acknowledgment payload from {}", from);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use rstest::rstest;
    use tokio::runtime::Builder;

    use crate::sequence::SequenceNumber;
    use crate::transport::MockTransport;

    use super::*;

    fn capturing_transport(sent: Arc<StdMutex<Vec<String>>>) -> MockTransport {
        let mut transport = MockTransport::new();
        transport.expect_send()
            .returning(move |_, addr, _| {
                sent.lock().unwrap().push(addr.to_string());
                Ok(())
            });
        transport
    }

    #[rstest]
    fn test_pump_slices_stream_into_lossless_frames() {
        let rt = Builder::new_current_thread().enable_all().start_paused(true).build().unwrap();
        rt.block_on(async {
            let sent: Arc<StdMutex<Vec<String>>> = Arc::default();
            let transport = capturing_transport(sent.clone());

            let tracker = Arc::new(SendTracker::new(
                Arc::new(SendTrackerConfig {
                    initial_retransmission_delay: Duration::from_secs(1),
                    retransmission_ceiling: Duration::from_secs(16),
                }),
                Arc::new(transport),
                "fd00".to_string(),
                4711,
            ));

            let input: Vec<u8> = (0u8..40).map(|i| i + b'A').collect();
            SenderEndpoint::pump_local_connection(input.as_slice(), tracker, Duration::from_millis(100)).await;

            // 40 bytes -> 15 + 15 + 10, sequences 0..=2, original bytes recoverable
            let sent = sent.lock().unwrap();
            assert_eq!(sent.len(), 3);

            let mut recovered = Vec::new();
            for (i, literal) in sent.iter().enumerate() {
                let frame = codec::decode(literal).unwrap();
                assert_eq!(frame.sequence, SequenceNumber::from_raw(i as u8));
                recovered.extend_from_slice(&frame.payload);
            }
            assert_eq!(recovered, input);
        });
    }

    #[rstest]
    fn test_acknowledgment_dispatch() {
        let rt = Builder::new_current_thread().enable_all().start_paused(true).build().unwrap();
        rt.block_on(async {
            let sent: Arc<StdMutex<Vec<String>>> = Arc::default();
            let transport = capturing_transport(sent.clone());

            let tracker = SendTracker::new(
                Arc::new(SendTrackerConfig {
                    initial_retransmission_delay: Duration::from_secs(1),
                    retransmission_ceiling: Duration::from_secs(16),
                }),
                Arc::new(transport),
                "fd00".to_string(),
                4711,
            );

            let sequence = tracker.send_next(Bytes::from_static(b"x")).await;
            assert_eq!(tracker.num_outstanding().await, 1);

            // garbage is dropped silently
            SenderEndpoint::handle_acknowledgment(&tracker, b"HELLO", "fd00::1").await;
            assert_eq!(tracker.num_outstanding().await, 1);

            // a NACK keeps the frame outstanding and schedules a retransmission
            SenderEndpoint::handle_acknowledgment(&tracker, b"NACK0", "fd00::1").await;
            assert_eq!(tracker.num_outstanding().await, 1);

            let ack = format!("ACK{}", sequence);
            SenderEndpoint::handle_acknowledgment(&tracker, ack.as_bytes(), "fd00::1").await;
            assert_eq!(tracker.num_outstanding().await, 0);

            time::sleep(Duration::from_secs(60)).await;
        });
    }
}
