use std::collections::hash_map::Entry;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, error, info, warn};

use crate::codec;
use crate::forward::Forwarder;
use crate::reassembly::ReassemblyWindow;
use crate::transport::{Inbound, Transport};

/// Receiver endpoint: observes inbound addressed packets, decodes the frames
/// carried in their address fields, and hands each frame to its peer's
/// reassembly window on a bounded pool of worker tasks.
///
/// Sessions are created on first contact and never evicted; a peer's window
/// lives for the rest of the process.
pub struct ReceiverEndpoint {
    transport: Arc<dyn Transport>,
    forwarder: Arc<dyn Forwarder>,
    sessions: Mutex<FxHashMap<String, Arc<ReassemblyWindow>>>,
    worker_limit: Arc<Semaphore>,
}

impl ReceiverEndpoint {
    pub fn new(transport: Arc<dyn Transport>, forwarder: Arc<dyn Forwarder>, max_workers: usize) -> ReceiverEndpoint {
        ReceiverEndpoint {
            transport,
            forwarder,
            sessions: Mutex::default(),
            worker_limit: Arc::new(Semaphore::new(max_workers)),
        }
    }

    /// Accepts inbound packets until the process ends. Per-packet errors are
    /// contained here and never terminate the loop.
    pub async fn recv_loop(self: &Arc<Self>) -> anyhow::Result<()> {
        info!("listening for tunneled frames");

        loop {
            let inbound = match self.transport.recv().await {
                Ok(inbound) => inbound,
                Err(e) => {
                    error!("transport error receiving packet: {}", e);
                    continue;
                }
            };
            self.dispatch(inbound).await?;
        }
    }

    async fn dispatch(self: &Arc<Self>, inbound: Inbound) -> anyhow::Result<()> {
        let frame = match codec::decode(&inbound.peer_addr) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("dropping packet with undecodable address field: {}", e);
                return Ok(());
            }
        };

        debug!("received frame #{} from {}", frame.sequence, inbound.peer_addr);
        let session = self.session(codec::peer_prefix(&inbound.peer_addr)).await;

        // the permit bounds the number of in-flight frame handlers
        let permit = self.worker_limit.clone().acquire_owned().await?;
        tokio::spawn(async move {
            session.on_frame(frame, &inbound.peer_addr, inbound.peer_port).await;
            drop(permit);
        });
        Ok(())
    }

    async fn session(&self, peer: &str) -> Arc<ReassemblyWindow> {
        match self.sessions.lock().await.entry(peer.to_string()) {
            Entry::Occupied(e) => e.get().clone(),
            Entry::Vacant(e) => {
                debug!("first frame from peer {} - creating session", peer);
                e.insert(Arc::new(ReassemblyWindow::new(self.transport.clone(), self.forwarder.clone()))).clone()
            }
        }
    }
}
