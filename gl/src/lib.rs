//! gridlife - distributed generation-synchronous Game of Life engine
//!
//! The global grid is split into contiguous row bands, one per worker. Every
//! generation the coordinator broadcasts control flags, scatters the grid,
//! waits while workers exchange halo rows and step their partitions in
//! lockstep, and gathers the results back into the single authoritative copy.
//!
//! # Core Concepts
//!
//! - **State Moves as Messages**: No shared grid memory; partitions and halo
//!   rows travel through a [`channel::MessageChannel`]
//! - **Generation Lockstep**: Barriers separate halo exchange, local update,
//!   and gather, so no worker can run ahead of the round
//! - **Single Authority**: The coordinator's grid is the only global state,
//!   and external edits apply only at generation boundaries
//!
//! # Modules
//!
//! - [`plan`] - Partition planner mapping grid rows onto workers
//! - [`channel`] - Message channel trait and the in-process fabric
//! - [`worker`] - Partition workers, halo exchange, and the update rule
//! - [`coordinator`] - The generation loop over the authoritative grid
//! - [`engine`] - Wiring and the external control handle
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod channel;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod events;
pub mod grid;
pub mod patterns;
pub mod plan;
pub mod worker;

// Re-export commonly used types
pub use channel::{
    ControlState, Endpoint, Envelope, ExchangeError, HaloDirection, LocalChannel, LocalFabric,
    MessageChannel, Payload, PayloadKind,
};
pub use config::Config;
pub use coordinator::{Coordinator, EngineCommand};
pub use engine::{Engine, EngineHandle};
pub use error::{ChannelError, EngineError, Phase, ProtocolError};
pub use events::{EngineEvent, EventBus};
pub use grid::{Cell, Grid};
pub use patterns::Pattern;
pub use plan::{PartitionPlan, WorkerRange};
pub use worker::{HaloBuffer, PartitionWorker, WorkerContext};
