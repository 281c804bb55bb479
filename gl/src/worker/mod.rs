//! Partition worker - owns one contiguous row range of the grid
//!
//! A worker is a plain task holding its context, its partition buffer, and a
//! message channel. All grid state arrives by scatter and leaves by gather;
//! the worker keeps nothing across generations except the buffer the next
//! scatter will overwrite.

pub mod halo;
pub mod step;

use tracing::{debug, trace};

use crate::channel::{ControlState, Endpoint, ExchangeError, MessageChannel, Payload, PayloadKind};
use crate::error::{EngineError, Phase, ProtocolError};
use crate::grid::Cell;
use crate::plan::WorkerRange;

pub use halo::HaloBuffer;

/// Identity of one worker within the run
///
/// Passed explicitly into every operation that used to read process-rank
/// globals; there is no ambient rank state anywhere.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerContext {
    pub id: usize,
    pub total_workers: usize,
}

impl WorkerContext {
    pub fn is_first(self) -> bool {
        self.id == 0
    }

    pub fn is_last(self) -> bool {
        self.id == self.total_workers - 1
    }
}

/// One worker's generation loop
pub struct PartitionWorker<C> {
    ctx: WorkerContext,
    rows: usize,
    width: usize,
    channel: C,
}

impl<C: MessageChannel> PartitionWorker<C> {
    pub fn new(ctx: WorkerContext, range: WorkerRange, width: usize, channel: C) -> Self {
        Self {
            ctx,
            rows: range.row_count,
            width,
            channel,
        }
    }

    /// Run generations until the coordinator broadcasts `stop`
    ///
    /// Per generation: control broadcast, scatter, 4-stage halo exchange,
    /// barrier, local update, barrier, gather. Any channel or protocol fault
    /// is fatal and reported with the generation and phase it occurred in.
    pub async fn run(mut self) -> Result<(), EngineError> {
        debug!(worker_id = self.ctx.id, rows = self.rows, "worker started");
        let mut partition: Vec<Cell> = vec![Cell::Dead; self.rows * self.width];
        let mut generation: u64 = 0;

        loop {
            let control = self.recv_control(generation).await?;
            if control.stop {
                debug!(worker_id = self.ctx.id, generation, "worker stopping");
                return Ok(());
            }

            self.recv_partition(generation, &mut partition).await?;

            let halo = halo::exchange(self.ctx, &mut self.channel, &partition, self.width)
                .await
                .map_err(|e| fault(generation, Phase::HaloExchange, e))?;
            if let Some((from, count)) = self.channel.unclaimed() {
                return Err(EngineError::protocol(
                    generation,
                    Phase::HaloExchange,
                    ProtocolError::UnexpectedMessage { from, count },
                ));
            }

            self.barrier(generation, Phase::HaloExchange).await?;

            step::step(&mut partition, self.width, &halo);
            trace!(worker_id = self.ctx.id, generation, "local update complete");

            self.barrier(generation, Phase::Update).await?;

            self.channel
                .send(Endpoint::Coordinator, Payload::Partition(partition.clone()))
                .await
                .map_err(|e| EngineError::comm(generation, Phase::Gather, e))?;

            generation += 1;
        }
    }

    async fn recv_control(&mut self, generation: u64) -> Result<ControlState, EngineError> {
        // Unbounded: the coordinator may legitimately sit paused for a long
        // time between generations.
        let payload = self
            .channel
            .recv_matching_unbounded(Endpoint::Coordinator, PayloadKind::Control)
            .await
            .map_err(|e| EngineError::comm(generation, Phase::Broadcast, e))?;
        let Payload::Control(control) = payload else {
            unreachable!("recv_matching returned a non-matching payload");
        };
        Ok(control)
    }

    async fn recv_partition(
        &mut self,
        generation: u64,
        partition: &mut Vec<Cell>,
    ) -> Result<(), EngineError> {
        let payload = self
            .channel
            .recv_matching(Endpoint::Coordinator, PayloadKind::Partition)
            .await
            .map_err(|e| EngineError::comm(generation, Phase::Scatter, e))?;
        let Payload::Partition(cells) = payload else {
            unreachable!("recv_matching returned a non-matching payload");
        };
        let expected = self.rows * self.width;
        if cells.len() != expected {
            return Err(EngineError::protocol(
                generation,
                Phase::Scatter,
                ProtocolError::PartitionLength {
                    from: Endpoint::Coordinator,
                    expected,
                    got: cells.len(),
                },
            ));
        }
        *partition = cells;
        Ok(())
    }

    async fn barrier(&mut self, generation: u64, phase: Phase) -> Result<(), EngineError> {
        self.channel
            .barrier()
            .await
            .map_err(|e| EngineError::comm(generation, phase, e))
    }
}

fn fault(generation: u64, phase: Phase, err: ExchangeError) -> EngineError {
    match err {
        ExchangeError::Channel(e) => EngineError::comm(generation, phase, e),
        ExchangeError::Protocol(e) => EngineError::protocol(generation, phase, e),
    }
}
