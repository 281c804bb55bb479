//! Engine - wires the coordinator, workers, and channel fabric together
//!
//! `Engine::spawn` validates the configuration, builds the in-process fabric,
//! seeds the grid, and launches one task per worker plus the coordinator. The
//! returned [`EngineHandle`] is the only way callers interact with a running
//! engine: commands in, events and the final grid out.

use std::sync::Arc;

use eyre::{Context, Result};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::channel::LocalFabric;
use crate::config::Config;
use crate::coordinator::{Coordinator, EngineCommand};
use crate::error::EngineError;
use crate::events::{EngineEvent, EventBus};
use crate::grid::Grid;
use crate::patterns;
use crate::plan::PartitionPlan;
use crate::worker::{PartitionWorker, WorkerContext};

/// Command queue depth between handles and the coordinator
const COMMAND_CHANNEL_CAPACITY: usize = 64;

pub struct Engine;

impl Engine {
    /// Validate the configuration and launch a full engine
    ///
    /// Fails immediately with [`EngineError::InvalidPartition`] when the
    /// worker count cannot split the grid; no tasks are spawned in that case.
    pub fn spawn(config: &Config) -> Result<EngineHandle, EngineError> {
        let plan = PartitionPlan::compute(config.grid_size, config.worker_count)?;

        let mut grid = Grid::square(config.grid_size);
        patterns::seed(&mut grid, config.pattern, config.density, config.seed);

        let (coordinator_channel, worker_channels) = LocalFabric::new(config.worker_count)
            .with_capacity(config.channel_capacity)
            .with_timeout(config.phase_timeout())
            .build();

        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let events = Arc::new(EventBus::with_default_capacity());

        let mut workers = Vec::with_capacity(config.worker_count);
        for (channel, range) in worker_channels.into_iter().zip(plan.ranges()) {
            let ctx = WorkerContext {
                id: range.worker_id,
                total_workers: config.worker_count,
            };
            let worker = PartitionWorker::new(ctx, *range, grid.width(), channel);
            workers.push(tokio::spawn(worker.run()));
        }

        let coordinator = Coordinator::new(
            grid,
            plan,
            coordinator_channel,
            command_rx,
            Arc::clone(&events),
            config.generations,
        );
        let coordinator = tokio::spawn(coordinator.run());

        debug!(workers = config.worker_count, "engine spawned");
        Ok(EngineHandle {
            commands: command_tx,
            events,
            coordinator,
            workers,
        })
    }
}

/// Handle to a running engine
///
/// Cloneable command access is deliberately not offered; the handle owns the
/// join handles and must outlive the run to collect its result.
#[derive(Debug)]
pub struct EngineHandle {
    commands: mpsc::Sender<EngineCommand>,
    events: Arc<EventBus>,
    coordinator: JoinHandle<Result<Grid, EngineError>>,
    workers: Vec<JoinHandle<Result<(), EngineError>>>,
}

impl EngineHandle {
    /// Grid state as of the last completed generation
    pub async fn snapshot(&self) -> Result<Grid> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(EngineCommand::Snapshot { reply })
            .await
            .context("engine is no longer running")?;
        rx.await.context("engine dropped the snapshot request")
    }

    /// Edit one cell of the global grid; applied before the next scatter
    pub async fn set_cell(&self, x: usize, y: usize, alive: bool) -> Result<()> {
        self.commands
            .send(EngineCommand::SetCell { x, y, alive })
            .await
            .context("engine is no longer running")
    }

    /// Pause (`false`) or resume (`true`) stepping
    pub async fn set_animating(&self, animating: bool) -> Result<()> {
        self.commands
            .send(EngineCommand::SetAnimating(animating))
            .await
            .context("engine is no longer running")
    }

    /// End the run after the current generation
    pub async fn stop(&self) -> Result<()> {
        self.commands
            .send(EngineCommand::Stop)
            .await
            .context("engine is no longer running")
    }

    /// Subscribe to per-generation progress events
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Wait for the run to finish and return the final grid
    ///
    /// A worker failure surfaces in preference to the coordinator's own view
    /// of it; the worker error names the generation and phase at fault.
    pub async fn wait(self) -> Result<Grid> {
        let coordinator_result = self
            .coordinator
            .await
            .context("coordinator task panicked")?;

        for (worker_id, worker) in self.workers.into_iter().enumerate() {
            match worker.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(worker_id, error = %e, "worker failed");
                    return Err(e).context("worker failed");
                }
                Err(join) if coordinator_result.is_err() => {
                    // Coordinator fault already explains the run's end; worker
                    // aborts/panics downstream of it are secondary.
                    debug!(worker_id, error = %join, "worker did not finish");
                }
                Err(join) => return Err(join).context("worker task panicked"),
            }
        }

        coordinator_result.context("run failed")
    }
}
