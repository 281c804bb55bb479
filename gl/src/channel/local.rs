//! In-process channel fabric over tokio primitives
//!
//! One bounded mpsc inbox per endpoint, every endpoint holding senders to all
//! others, and a single `tokio::sync::Barrier` spanning the coordinator and
//! all workers. Delivery is reliable and ordered per sender/receiver pair,
//! which is exactly the assumption the lockstep protocol makes.
//!
//! Every blocking operation is bounded by an optional timeout. A worker that
//! stalls mid-generation would otherwise hang the whole run at the next
//! barrier; the timeout turns that into a fatal, attributable failure.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::Barrier;
use tracing::{debug, trace};

use super::messages::{Endpoint, Envelope, Payload, PayloadKind};
use super::MessageChannel;
use crate::error::ChannelError;

/// Default inbox capacity per endpoint
///
/// During one halo stage an endpoint receives at most one row per neighbor,
/// and during gather the coordinator drains as it receives, so a small buffer
/// keeps senders from blocking without hiding protocol bugs behind huge queues.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 8;

async fn with_timeout<T>(
    limit: Option<Duration>,
    fut: impl Future<Output = Result<T, ChannelError>>,
) -> Result<T, ChannelError> {
    match limit {
        Some(duration) => tokio::time::timeout(duration, fut)
            .await
            .map_err(|_| ChannelError::Timeout(duration))?,
        None => fut.await,
    }
}

/// Builder for a complete in-process fabric
pub struct LocalFabric {
    worker_count: usize,
    capacity: usize,
    timeout: Option<Duration>,
}

impl LocalFabric {
    pub fn new(worker_count: usize) -> Self {
        Self {
            worker_count,
            capacity: DEFAULT_CHANNEL_CAPACITY,
            timeout: None,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Create the coordinator channel and one channel per worker
    pub fn build(self) -> (LocalChannel, Vec<LocalChannel>) {
        let endpoints: Vec<Endpoint> = std::iter::once(Endpoint::Coordinator)
            .chain((0..self.worker_count).map(Endpoint::Worker))
            .collect();

        let mut senders = HashMap::new();
        let mut inboxes = Vec::new();
        for &endpoint in &endpoints {
            let (tx, rx) = mpsc::channel(self.capacity);
            senders.insert(endpoint, tx);
            inboxes.push((endpoint, rx));
        }

        // The coordinator participates in the barrier just like rank 0 of an
        // MPI world: it waits out the halo exchange and update phases before
        // gathering.
        let barrier = Arc::new(Barrier::new(self.worker_count + 1));

        let mut channels: Vec<LocalChannel> = inboxes
            .into_iter()
            .map(|(endpoint, inbox)| {
                let mut peers = senders.clone();
                peers.remove(&endpoint);
                LocalChannel {
                    endpoint,
                    worker_count: self.worker_count,
                    inbox,
                    peers,
                    barrier: Arc::clone(&barrier),
                    stash: VecDeque::new(),
                    timeout: self.timeout,
                }
            })
            .collect();

        debug!(
            worker_count = self.worker_count,
            capacity = self.capacity,
            timeout = ?self.timeout,
            "built local channel fabric"
        );

        let coordinator = channels.remove(0);
        (coordinator, channels)
    }
}

/// One endpoint's view of the fabric
pub struct LocalChannel {
    endpoint: Endpoint,
    worker_count: usize,
    inbox: mpsc::Receiver<Envelope>,
    peers: HashMap<Endpoint, mpsc::Sender<Envelope>>,
    barrier: Arc<Barrier>,
    /// Envelopes received ahead of the call that wants them
    stash: VecDeque<Envelope>,
    timeout: Option<Duration>,
}

impl LocalChannel {
    fn take_stashed(&mut self, from: Endpoint, kind: PayloadKind) -> Option<Payload> {
        let position = self
            .stash
            .iter()
            .position(|env| env.from == from && env.payload.kind() == kind)?;
        Some(self.stash.remove(position).expect("position in bounds").payload)
    }

    async fn recv_matching_within(
        &mut self,
        from: Endpoint,
        kind: PayloadKind,
        limit: Option<Duration>,
    ) -> Result<Payload, ChannelError> {
        if let Some(payload) = self.take_stashed(from, kind) {
            trace!(at = %self.endpoint, %from, ?kind, "recv (stashed)");
            return Ok(payload);
        }

        let inbox = &mut self.inbox;
        let stash = &mut self.stash;
        let endpoint = self.endpoint;
        with_timeout(limit, async {
            loop {
                let envelope = inbox.recv().await.ok_or(ChannelError::Closed(from))?;
                if envelope.from == from && envelope.payload.kind() == kind {
                    trace!(at = %endpoint, %from, ?kind, "recv");
                    return Ok(envelope.payload);
                }
                trace!(
                    at = %endpoint,
                    from = %envelope.from,
                    kind = ?envelope.payload.kind(),
                    "stashing out-of-order envelope"
                );
                stash.push_back(envelope);
            }
        })
        .await
    }
}

#[async_trait]
impl MessageChannel for LocalChannel {
    fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    fn worker_count(&self) -> usize {
        self.worker_count
    }

    async fn send(&mut self, to: Endpoint, payload: Payload) -> Result<(), ChannelError> {
        let tx = self.peers.get(&to).ok_or(ChannelError::Closed(to))?;
        trace!(from = %self.endpoint, %to, kind = ?payload.kind(), "send");
        let envelope = Envelope {
            from: self.endpoint,
            payload,
        };
        with_timeout(self.timeout, async {
            tx.send(envelope).await.map_err(|_| ChannelError::Closed(to))
        })
        .await
    }

    async fn recv_matching(
        &mut self,
        from: Endpoint,
        kind: PayloadKind,
    ) -> Result<Payload, ChannelError> {
        let timeout = self.timeout;
        self.recv_matching_within(from, kind, timeout).await
    }

    async fn recv_matching_unbounded(
        &mut self,
        from: Endpoint,
        kind: PayloadKind,
    ) -> Result<Payload, ChannelError> {
        self.recv_matching_within(from, kind, None).await
    }

    async fn barrier(&mut self) -> Result<(), ChannelError> {
        let barrier = Arc::clone(&self.barrier);
        with_timeout(self.timeout, async {
            barrier.wait().await;
            Ok(())
        })
        .await
    }

    fn unclaimed(&self) -> Option<(Endpoint, usize)> {
        self.stash.front().map(|env| (env.from, self.stash.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::messages::{ControlState, HaloDirection};
    use crate::grid::Cell;

    #[tokio::test]
    async fn test_point_to_point_send_recv() {
        let (mut coordinator, mut workers) = LocalFabric::new(1).build();
        let mut worker = workers.remove(0);

        coordinator
            .send(Endpoint::Worker(0), Payload::Control(ControlState::default()))
            .await
            .unwrap();

        let payload = worker
            .recv_matching(Endpoint::Coordinator, PayloadKind::Control)
            .await
            .unwrap();
        assert!(matches!(payload, Payload::Control(c) if c.animating));
    }

    #[tokio::test]
    async fn test_out_of_order_envelopes_are_stashed() {
        let (mut coordinator, mut workers) = LocalFabric::new(1).build();
        let mut worker = workers.remove(0);

        // Control arrives first, but the receiver asks for the partition.
        coordinator
            .send(Endpoint::Worker(0), Payload::Control(ControlState::default()))
            .await
            .unwrap();
        coordinator
            .send(Endpoint::Worker(0), Payload::Partition(vec![Cell::Alive; 3]))
            .await
            .unwrap();

        let partition = worker
            .recv_matching(Endpoint::Coordinator, PayloadKind::Partition)
            .await
            .unwrap();
        assert!(matches!(partition, Payload::Partition(cells) if cells.len() == 3));

        // The stashed control envelope is still deliverable.
        assert!(worker.unclaimed().is_some());
        let control = worker
            .recv_matching(Endpoint::Coordinator, PayloadKind::Control)
            .await
            .unwrap();
        assert!(matches!(control, Payload::Control(_)));
        assert!(worker.unclaimed().is_none());
    }

    #[tokio::test]
    async fn test_matching_distinguishes_halo_directions() {
        let (_coordinator, mut workers) = LocalFabric::new(3).build();
        let mut middle = workers.remove(1);
        let mut first = workers.remove(0);
        // workers vec is now [worker 2]
        let mut last = workers.remove(0);

        // Worker 2's backward row lands before worker 0's forward row.
        last.send(
            Endpoint::Worker(1),
            Payload::HaloRow {
                direction: HaloDirection::Up,
                cells: vec![Cell::Dead; 4],
            },
        )
        .await
        .unwrap();
        first
            .send(
                Endpoint::Worker(1),
                Payload::HaloRow {
                    direction: HaloDirection::Down,
                    cells: vec![Cell::Alive; 4],
                },
            )
            .await
            .unwrap();

        let down = middle
            .recv_matching(Endpoint::Worker(0), PayloadKind::HaloRow(HaloDirection::Down))
            .await
            .unwrap();
        assert!(matches!(down, Payload::HaloRow { cells, .. } if cells[0].is_alive()));

        let up = middle
            .recv_matching(Endpoint::Worker(2), PayloadKind::HaloRow(HaloDirection::Up))
            .await
            .unwrap();
        assert!(matches!(up, Payload::HaloRow { cells, .. } if !cells[0].is_alive()));
    }

    #[tokio::test]
    async fn test_barrier_releases_all_parties() {
        let (mut coordinator, workers) = LocalFabric::new(2).build();

        let mut tasks = Vec::new();
        for mut worker in workers {
            tasks.push(tokio::spawn(async move { worker.barrier().await }));
        }
        coordinator.barrier().await.unwrap();
        for task in tasks {
            task.await.unwrap().unwrap();
        }
    }

    #[tokio::test]
    async fn test_recv_timeout() {
        let (_coordinator, mut workers) = LocalFabric::new(1)
            .with_timeout(Some(Duration::from_millis(20)))
            .build();
        let mut worker = workers.remove(0);

        let err = worker
            .recv_matching(Endpoint::Coordinator, PayloadKind::Control)
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_closed_peer_detected() {
        let (coordinator, mut workers) = LocalFabric::new(1).build();
        let mut worker = workers.remove(0);
        drop(coordinator);

        let err = worker
            .recv_matching(Endpoint::Coordinator, PayloadKind::Control)
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::Closed(Endpoint::Coordinator)));
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_worker() {
        let (mut coordinator, workers) = LocalFabric::new(3).build();

        coordinator
            .broadcast(Payload::Control(ControlState {
                stop: true,
                animating: false,
            }))
            .await
            .unwrap();

        for mut worker in workers {
            let payload = worker
                .recv_matching(Endpoint::Coordinator, PayloadKind::Control)
                .await
                .unwrap();
            assert!(matches!(payload, Payload::Control(c) if c.stop));
        }
    }
}
