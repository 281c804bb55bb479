//! Four-stage halo exchange
//!
//! Every generation each worker needs the last row of the worker above it and
//! the first row of the worker below it. All workers run the same four
//! strictly ordered stages, split by worker-id parity so that at every stage
//! each participant is purely a sender or purely a receiver - no pair of
//! workers ever waits on each other:
//!
//! 1. forward-even:  even ids (except the last worker) send their last row down
//! 2. forward-odd:   odd ids receive it, then odd ids (except the last) send
//!    their own last row down and even ids (except worker 0) receive
//! 3. backward-even: even ids (except worker 0) send their first row up; odd
//!    ids (except the last) receive
//! 4. backward-odd:  odd ids send their first row up; even ids (except the
//!    last) receive
//!
//! Edge workers simply skip the stages for the neighbor they do not have.
//! The received rows describe the neighbors' state at the start of the
//! generation, because every send happens before any worker updates.

use tracing::trace;

use crate::channel::{Endpoint, ExchangeError, HaloDirection, MessageChannel, Payload, PayloadKind};
use crate::error::ProtocolError;
use crate::grid::Cell;
use crate::worker::WorkerContext;

/// Boundary rows borrowed from the neighboring partitions
///
/// `upper` is the row directly above this partition (absent for worker 0),
/// `lower` the row directly below (absent for the last worker). Rebuilt from
/// scratch every generation; never carried across generations.
#[derive(Clone, Debug, Default)]
pub struct HaloBuffer {
    pub upper: Option<Vec<Cell>>,
    pub lower: Option<Vec<Cell>>,
}

fn first_row(partition: &[Cell], width: usize) -> Vec<Cell> {
    partition[..width].to_vec()
}

fn last_row(partition: &[Cell], width: usize) -> Vec<Cell> {
    partition[partition.len() - width..].to_vec()
}

async fn send_row<C: MessageChannel>(
    channel: &mut C,
    to: usize,
    direction: HaloDirection,
    cells: Vec<Cell>,
) -> Result<(), ExchangeError> {
    channel
        .send(Endpoint::Worker(to), Payload::HaloRow { direction, cells })
        .await?;
    Ok(())
}

async fn recv_row<C: MessageChannel>(
    channel: &mut C,
    from: usize,
    direction: HaloDirection,
    width: usize,
) -> Result<Vec<Cell>, ExchangeError> {
    let payload = channel
        .recv_matching(Endpoint::Worker(from), PayloadKind::HaloRow(direction))
        .await?;
    let Payload::HaloRow { cells, .. } = payload else {
        unreachable!("recv_matching returned a non-matching payload");
    };
    if cells.len() != width {
        return Err(ProtocolError::RowLength {
            expected: width,
            got: cells.len(),
        }
        .into());
    }
    Ok(cells)
}

/// Run the exchange and return this worker's halo for the generation
pub async fn exchange<C: MessageChannel>(
    ctx: WorkerContext,
    channel: &mut C,
    partition: &[Cell],
    width: usize,
) -> Result<HaloBuffer, ExchangeError> {
    let mut halo = HaloBuffer::default();
    let even = ctx.id % 2 == 0;

    // Stage 1: even ids send their last row forward.
    if even {
        if !ctx.is_last() {
            send_row(channel, ctx.id + 1, HaloDirection::Down, last_row(partition, width)).await?;
        }
    } else {
        halo.upper = Some(recv_row(channel, ctx.id - 1, HaloDirection::Down, width).await?);
    }

    // Stage 2: odd ids send their last row forward.
    if !even {
        if !ctx.is_last() {
            send_row(channel, ctx.id + 1, HaloDirection::Down, last_row(partition, width)).await?;
        }
    } else if !ctx.is_first() {
        halo.upper = Some(recv_row(channel, ctx.id - 1, HaloDirection::Down, width).await?);
    }

    // Stage 3: even ids send their first row backward.
    if even {
        if !ctx.is_first() {
            send_row(channel, ctx.id - 1, HaloDirection::Up, first_row(partition, width)).await?;
        }
    } else if !ctx.is_last() {
        halo.lower = Some(recv_row(channel, ctx.id + 1, HaloDirection::Up, width).await?);
    }

    // Stage 4: odd ids send their first row backward.
    if !even {
        send_row(channel, ctx.id - 1, HaloDirection::Up, first_row(partition, width)).await?;
    } else if !ctx.is_last() {
        halo.lower = Some(recv_row(channel, ctx.id + 1, HaloDirection::Up, width).await?);
    }

    trace!(
        worker_id = ctx.id,
        has_upper = halo.upper.is_some(),
        has_lower = halo.lower.is_some(),
        "halo exchange complete"
    );
    Ok(halo)
}
