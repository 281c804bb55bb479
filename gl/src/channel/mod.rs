//! Message channel abstraction
//!
//! All coordinator/worker traffic goes through one `MessageChannel` interface:
//! point-to-point `send` / `recv_matching`, a global `barrier`, and collective
//! `broadcast` / `scatter` / `gather` built on top of the point-to-point
//! primitives. No component touches shared grid memory - state moves only as
//! messages.
//!
//! `recv_matching` has MPI-style selective receive semantics: it completes
//! only for an envelope whose sender and payload kind match, stashing anything
//! else for a later call. Workers run the halo stages at their own pace, so
//! without this a fast neighbor's backward row could arrive while a worker is
//! still waiting on the forward row from the other side.

pub mod local;
pub mod messages;

use async_trait::async_trait;
use thiserror::Error;
use tracing::trace;

use crate::error::{ChannelError, ProtocolError};
use crate::grid::Grid;
use crate::plan::PartitionPlan;

pub use local::{LocalChannel, LocalFabric};
pub use messages::{ControlState, Endpoint, Envelope, HaloDirection, Payload, PayloadKind};

/// Failure of a collective operation
///
/// Scatter and broadcast can only fail in transport; gather additionally
/// validates that every returned partition has the planned size.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Point-to-point and collective communication primitives
///
/// One instance per endpoint. The local in-process implementation lives in
/// [`local`]; the trait is the seam where a socket transport would go.
#[async_trait]
pub trait MessageChannel: Send {
    /// The endpoint this channel belongs to
    fn endpoint(&self) -> Endpoint;

    /// Number of workers on the fabric (excluding the coordinator)
    fn worker_count(&self) -> usize;

    /// Deliver a payload to one endpoint
    async fn send(&mut self, to: Endpoint, payload: Payload) -> Result<(), ChannelError>;

    /// Receive the next payload of `kind` from `from`, stashing mismatches
    async fn recv_matching(
        &mut self,
        from: Endpoint,
        kind: PayloadKind,
    ) -> Result<Payload, ChannelError>;

    /// `recv_matching` without a deadline
    ///
    /// The per-operation timeout exists to catch workers stalling inside a
    /// generation. Between generations an arbitrarily long wait is legitimate
    /// (the coordinator may be paused), so the generation-start control
    /// receive uses this instead.
    async fn recv_matching_unbounded(
        &mut self,
        from: Endpoint,
        kind: PayloadKind,
    ) -> Result<Payload, ChannelError> {
        self.recv_matching(from, kind).await
    }

    /// Block until every endpoint on the fabric has arrived
    async fn barrier(&mut self) -> Result<(), ChannelError>;

    /// Sender and count of stashed envelopes nobody has asked for
    ///
    /// Non-empty after a completed exchange means a peer sent traffic outside
    /// the protocol.
    fn unclaimed(&self) -> Option<(Endpoint, usize)> {
        None
    }

    /// Coordinator: deliver the same payload to every worker
    async fn broadcast(&mut self, payload: Payload) -> Result<(), ChannelError> {
        for worker_id in 0..self.worker_count() {
            self.send(Endpoint::Worker(worker_id), payload.clone()).await?;
        }
        Ok(())
    }

    /// Coordinator: distribute grid rows to workers according to the plan
    async fn scatter(&mut self, grid: &Grid, plan: &PartitionPlan) -> Result<(), ChannelError> {
        for range in plan.ranges() {
            let slice = grid.rows(range.row_offset, range.row_count).to_vec();
            trace!(worker_id = range.worker_id, rows = range.row_count, "scatter slice");
            self.send(Endpoint::Worker(range.worker_id), Payload::Partition(slice))
                .await?;
        }
        Ok(())
    }

    /// Coordinator: collect updated partitions back into the grid
    async fn gather(&mut self, grid: &mut Grid, plan: &PartitionPlan) -> Result<(), ExchangeError> {
        for range in plan.ranges() {
            let from = Endpoint::Worker(range.worker_id);
            let payload = self.recv_matching(from, PayloadKind::Partition).await?;
            let Payload::Partition(cells) = payload else {
                unreachable!("recv_matching returned a non-matching payload");
            };
            let expected = range.row_count * grid.width();
            if cells.len() != expected {
                return Err(ProtocolError::PartitionLength {
                    from,
                    expected,
                    got: cells.len(),
                }
                .into());
            }
            trace!(worker_id = range.worker_id, rows = range.row_count, "gathered slice");
            grid.write_rows(range.row_offset, &cells);
        }
        Ok(())
    }
}
