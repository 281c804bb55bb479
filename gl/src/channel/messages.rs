//! Message channel wire types
//!
//! Everything that crosses a channel is an `Envelope`: the sending endpoint
//! plus one of three payloads. Receivers match on source and payload kind,
//! so a late backward halo row from one neighbor can never be mistaken for
//! the forward row still expected from the other.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::grid::Cell;

/// Addressable party on the channel fabric
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Coordinator,
    Worker(usize),
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Coordinator => f.write_str("coordinator"),
            Endpoint::Worker(id) => write!(f, "worker {id}"),
        }
    }
}

/// Direction a boundary row travels during the halo exchange
///
/// `Down`: a worker's last row sent to `id + 1`, landing in that neighbor's
/// missing-upper slot. `Up`: a worker's first row sent to `id - 1`, landing in
/// the missing-lower slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HaloDirection {
    Down,
    Up,
}

/// Control flags broadcast from the coordinator ahead of every generation
///
/// Constructed fresh each generation from the coordinator's merged view of
/// external edits; workers never mutate it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlState {
    pub stop: bool,
    pub animating: bool,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            stop: false,
            animating: true,
        }
    }
}

/// Payload of one message
#[derive(Clone, Debug)]
pub enum Payload {
    /// Coordinator -> workers, once per generation
    Control(ControlState),
    /// A partition slice: coordinator -> worker (scatter) or back (gather)
    Partition(Vec<Cell>),
    /// One boundary row between neighboring workers
    HaloRow {
        direction: HaloDirection,
        cells: Vec<Cell>,
    },
}

impl Payload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Control(_) => PayloadKind::Control,
            Payload::Partition(_) => PayloadKind::Partition,
            Payload::HaloRow { direction, .. } => PayloadKind::HaloRow(*direction),
        }
    }
}

/// Matching key for selective receive
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PayloadKind {
    Control,
    Partition,
    HaloRow(HaloDirection),
}

/// A payload tagged with its sender
#[derive(Clone, Debug)]
pub struct Envelope {
    pub from: Endpoint,
    pub payload: Payload,
}
