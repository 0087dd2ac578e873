#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Debounces raw per-cell overlap facts into trigger-state commands.

use std::collections::BTreeSet;

use blocks_core::{CellId, Command};
use blocks_world::query::CellView;
use tracing::trace;

/// Pure system that feeds one overlap bit per cell through the trigger table.
#[derive(Debug, Default)]
pub struct Overlap;

impl Overlap {
    /// Emits a [`Command::SetTriggerState`] for every cell whose trigger state
    /// changes this step.
    ///
    /// `overlapping` holds the cells an agent currently intersects; every
    /// other cell reads as not overlapping. Dissolved cells are out of play and
    /// never change state.
    pub fn handle(&mut self, cells: &CellView, overlapping: &BTreeSet<CellId>, out: &mut Vec<Command>) {
        for cell in cells.iter().filter(|cell| !cell.dissolved) {
            let next = cell.trigger.next(overlapping.contains(&cell.id));
            if next != cell.trigger {
                trace!(cell = cell.id.get(), from = ?cell.trigger, to = ?next, "trigger transition");
                out.push(Command::SetTriggerState {
                    cell: cell.id,
                    state: next,
                });
            }
        }
    }
}
