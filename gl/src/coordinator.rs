//! Coordinator - owns the authoritative grid between generations
//!
//! Each generation the coordinator merges external edits into its grid and
//! control state, broadcasts the control flags, scatters the grid, waits out
//! the workers' halo-exchange and update barriers, and gathers the updated
//! partitions back. The grid round-trips through the coordinator every cycle;
//! no state lives in the workers across generations.
//!
//! External collaborators never touch the grid directly: they send
//! [`EngineCommand`]s which the coordinator applies only at generation
//! boundaries, when it holds the single authoritative copy.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::channel::{ControlState, Endpoint, ExchangeError, MessageChannel, Payload};
use crate::error::{EngineError, Phase};
use crate::events::{EngineEvent, EventBus};
use crate::grid::{Cell, Grid};
use crate::plan::PartitionPlan;

/// Commands from the external control surface
///
/// Applied between generations, before the next broadcast.
#[derive(Debug)]
pub enum EngineCommand {
    /// Read the grid as of the last completed generation
    Snapshot { reply: oneshot::Sender<Grid> },
    /// Edit one cell of the global grid before the next scatter
    SetCell { x: usize, y: usize, alive: bool },
    /// Pause or resume stepping
    SetAnimating(bool),
    /// End the run after the current generation
    Stop,
}

/// The coordinator's generation loop
pub struct Coordinator<C> {
    grid: Grid,
    plan: PartitionPlan,
    channel: C,
    commands: mpsc::Receiver<EngineCommand>,
    events: Arc<EventBus>,
    control: ControlState,
    generation_limit: u64,
}

impl<C: MessageChannel> Coordinator<C> {
    pub fn new(
        grid: Grid,
        plan: PartitionPlan,
        channel: C,
        commands: mpsc::Receiver<EngineCommand>,
        events: Arc<EventBus>,
        generation_limit: u64,
    ) -> Self {
        Self {
            grid,
            plan,
            channel,
            commands,
            events,
            control: ControlState::default(),
            generation_limit,
        }
    }

    /// Run to the generation limit or an external stop; returns the final grid
    pub async fn run(mut self) -> Result<Grid, EngineError> {
        info!(
            height = self.grid.height(),
            width = self.grid.width(),
            workers = self.plan.worker_count(),
            generation_limit = self.generation_limit,
            "coordinator started"
        );
        let run_started = Instant::now();
        let mut generation: u64 = 0;

        let outcome = self.advance(&mut generation).await;

        // Release the workers from their generation-start control recv so
        // they exit even when the run ends in an error. Per-worker send
        // failures are secondary here: a worker behind a dead channel has
        // already terminated on its own.
        let stop = Payload::Control(ControlState {
            stop: true,
            animating: self.control.animating,
        });
        for worker_id in 0..self.plan.worker_count() {
            let _ = self
                .channel
                .send(Endpoint::Worker(worker_id), stop.clone())
                .await;
        }

        outcome?;

        let duration_ms = run_started.elapsed().as_millis() as u64;
        info!(generations = generation, duration_ms, "coordinator finished");
        self.events.emit(EngineEvent::RunCompleted {
            generations: generation,
            live_cells: self.grid.live_cells(),
            duration_ms,
        });
        Ok(self.grid)
    }

    /// Generation loop body; `generation` counts completed generations even
    /// when the loop ends in an error
    async fn advance(&mut self, generation: &mut u64) -> Result<(), EngineError> {
        while !self.control.stop && *generation < self.generation_limit {
            self.drain_commands();
            self.park_while_paused().await;
            if self.control.stop {
                break;
            }

            let started = Instant::now();
            self.run_generation(*generation).await?;
            *generation += 1;

            self.events.emit(EngineEvent::GenerationCompleted {
                generation: *generation,
                live_cells: self.grid.live_cells(),
                duration_ms: started.elapsed().as_millis() as u64,
            });
        }
        Ok(())
    }

    /// One full generation: broadcast, scatter, barriers, gather
    async fn run_generation(&mut self, generation: u64) -> Result<(), EngineError> {
        debug!(generation, "generation starting");

        self.channel
            .broadcast(Payload::Control(self.control))
            .await
            .map_err(|e| EngineError::comm(generation, Phase::Broadcast, e))?;

        self.channel
            .scatter(&self.grid, &self.plan)
            .await
            .map_err(|e| EngineError::comm(generation, Phase::Scatter, e))?;

        // Workers exchange halos, then update; the coordinator waits out both
        // phases so the gather below cannot overlap either one.
        self.channel
            .barrier()
            .await
            .map_err(|e| EngineError::comm(generation, Phase::HaloExchange, e))?;
        self.channel
            .barrier()
            .await
            .map_err(|e| EngineError::comm(generation, Phase::Update, e))?;

        self.channel
            .gather(&mut self.grid, &self.plan)
            .await
            .map_err(|e| match e {
                ExchangeError::Channel(err) => EngineError::comm(generation, Phase::Gather, err),
                ExchangeError::Protocol(err) => {
                    EngineError::protocol(generation, Phase::Gather, err)
                }
            })?;

        debug!(generation, live_cells = self.grid.live_cells(), "generation complete");
        Ok(())
    }

    /// Apply all queued commands without blocking
    fn drain_commands(&mut self) {
        while let Ok(cmd) = self.commands.try_recv() {
            self.apply(cmd);
        }
    }

    /// While not animating, sleep on the command channel instead of spinning
    async fn park_while_paused(&mut self) {
        while !self.control.animating && !self.control.stop {
            debug!("paused, waiting for control input");
            match self.commands.recv().await {
                Some(cmd) => self.apply(cmd),
                // Every handle is gone; nobody can ever resume us.
                None => self.control.stop = true,
            }
        }
    }

    fn apply(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::Snapshot { reply } => {
                let _ = reply.send(self.grid.clone());
            }
            EngineCommand::SetCell { x, y, alive } => {
                debug!(x, y, alive, "external cell edit");
                self.grid.set_cell(x, y, Cell::from(alive));
            }
            EngineCommand::SetAnimating(animating) => {
                debug!(animating, "external animating change");
                self.control.animating = animating;
            }
            EngineCommand::Stop => {
                info!("external stop requested");
                self.control.stop = true;
            }
        }
    }
}
