//! Error taxonomy for the engine
//!
//! Three fatal failure classes: an invalid partition at startup, a protocol
//! violation on the message channel, and a communication failure. The lockstep
//! design has no way to continue with a partial generation, so none of these
//! are recovered locally - they terminate the run carrying the generation and
//! phase at which they occurred.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::channel::messages::Endpoint;

/// Phase of a generation, used to locate failures
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Broadcast,
    Scatter,
    HaloExchange,
    Update,
    Gather,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Broadcast => "broadcast",
            Phase::Scatter => "scatter",
            Phase::HaloExchange => "halo exchange",
            Phase::Update => "update",
            Phase::Gather => "gather",
        };
        f.write_str(name)
    }
}

/// Transport-level failures on the message channel
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel to {0} closed")]
    Closed(Endpoint),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Malformed or misdirected traffic on the message channel
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("boundary row of {got} cells, expected {expected}")]
    RowLength { expected: usize, got: usize },

    #[error("partition of {got} cells from {from}, expected {expected}")]
    PartitionLength {
        from: Endpoint,
        expected: usize,
        got: usize,
    },

    #[error("{count} unexpected message(s) left over from {from}")]
    UnexpectedMessage { from: Endpoint, count: usize },
}

/// Top-level engine failures surfaced to the operator
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid partition: {worker_count} workers for a grid of {height} rows")]
    InvalidPartition { height: usize, worker_count: usize },

    #[error("protocol violation in generation {generation} during {phase}: {source}")]
    ProtocolViolation {
        generation: u64,
        phase: Phase,
        source: ProtocolError,
    },

    #[error("communication failure in generation {generation} during {phase}: {source}")]
    CommunicationFailure {
        generation: u64,
        phase: Phase,
        source: ChannelError,
    },
}

impl EngineError {
    pub fn protocol(generation: u64, phase: Phase, source: ProtocolError) -> Self {
        EngineError::ProtocolViolation {
            generation,
            phase,
            source,
        }
    }

    pub fn comm(generation: u64, phase: Phase, source: ChannelError) -> Self {
        EngineError::CommunicationFailure {
            generation,
            phase,
            source,
        }
    }
}
