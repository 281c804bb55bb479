//! Local generation step - neighbor counting and the transition rule
//!
//! Two passes over the partition: count every cell's 8-connected live
//! neighbors into a separate buffer, then apply the transition rule. The
//! split avoids read-after-write hazards; a cell updated in place would leak
//! its new state into its neighbors' counts.

use crate::grid::Cell;
use crate::worker::halo::HaloBuffer;

/// Exactly this many neighbors and a cell comes to life
pub const REPRODUCE_NUM: u8 = 3;
/// More than this many neighbors and a cell starves
pub const OVERPOPULATE_NUM: u8 = 3;
/// Fewer than this many neighbors and a cell dies of loneliness
pub const ISOLATION_NUM: u8 = 2;

/// Count live cells in the 3x3 neighborhood of `(x, y)`, excluding the cell itself
///
/// Rows outside the partition are resolved from the halo when the matching
/// neighbor exists; anything outside both the partition and the halos is the
/// grid edge and contributes nothing.
pub fn count_living_neighbours(
    partition: &[Cell],
    width: usize,
    halo: &HaloBuffer,
    x: usize,
    y: usize,
) -> u8 {
    let rows = partition.len() / width;
    let mut count = 0u8;

    for i in y as isize - 1..=y as isize + 1 {
        for j in x as isize - 1..=x as isize + 1 {
            if j < 0 || j >= width as isize {
                continue;
            }
            let j = j as usize;
            if (0..rows as isize).contains(&i) {
                if partition[i as usize * width + j].is_alive() {
                    count += 1;
                }
            } else if i < 0 {
                if let Some(row) = &halo.upper {
                    if row[j].is_alive() {
                        count += 1;
                    }
                }
            } else if let Some(row) = &halo.lower {
                if row[j].is_alive() {
                    count += 1;
                }
            }
        }
    }

    // The 3x3 sweep counted the center cell itself
    if partition[y * width + x].is_alive() {
        count -= 1;
    }
    count
}

/// Transition rule for one cell
///
/// Exactly `REPRODUCE_NUM` neighbors brings any cell to life; outside the
/// `[ISOLATION_NUM, OVERPOPULATE_NUM]` band the cell dies. A count of exactly
/// two leaves the cell as it was - live or dead. That last branch is kept
/// bit-for-bit from the reference behavior and must not be rewritten in terms
/// of a survival rule.
pub fn update_cell(cell: Cell, neighbours: u8) -> Cell {
    if neighbours == REPRODUCE_NUM {
        Cell::Alive
    } else if neighbours > OVERPOPULATE_NUM || neighbours < ISOLATION_NUM {
        Cell::Dead
    } else {
        cell
    }
}

/// Advance a partition one generation in place
pub fn step(partition: &mut [Cell], width: usize, halo: &HaloBuffer) {
    let rows = partition.len() / width;

    let mut counts = vec![0u8; partition.len()];
    for y in 0..rows {
        for x in 0..width {
            counts[y * width + x] = count_living_neighbours(partition, width, halo, x, y);
        }
    }

    for (cell, &neighbours) in partition.iter_mut().zip(counts.iter()) {
        *cell = update_cell(*cell, neighbours);
    }
}
