#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Cell lifecycle: traversal counting and dissolve scheduling.

use blocks_core::{Command, Event, TriggerState};
use blocks_world::query::CellView;
use tracing::debug;

/// Pure system that counts exits and queues dissolves for exhausted cells.
#[derive(Debug, Default)]
pub struct Lifecycle;

impl Lifecycle {
    /// Emits a traversal record for every cell whose trigger just became `Exit`.
    ///
    /// Solid cells are still reported; the world leaves their counters alone.
    pub fn handle(&mut self, events: &[Event], out: &mut Vec<Command>) {
        for event in events {
            if let Event::TriggerChanged {
                cell,
                state: TriggerState::Exit,
            } = event
            {
                out.push(Command::RecordTraversal { cell: *cell });
            }
        }
    }

    /// Queues a dissolve for every dissolving cell not yet removed from play.
    ///
    /// The world defers these until the next flush, so calling this more than
    /// once before the barrier only repeats idempotent requests.
    pub fn sweep(&mut self, cells: &CellView, out: &mut Vec<Command>) {
        for cell in cells.iter().filter(|cell| cell.dissolving && !cell.dissolved) {
            debug!(cell = cell.id.get(), "queueing dissolve");
            out.push(Command::DissolveCell { cell: cell.id });
        }
    }
}
