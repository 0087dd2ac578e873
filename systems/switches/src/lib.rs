#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Switch activation and grouped-object appearance.

use blocks_core::{CellId, Command, Event, ObjectId, SwitchState, TriggerState};
use blocks_world::query::CellView;
use tracing::debug;

/// Pure system that flips switches on entry and reveals their groups.
#[derive(Debug, Default)]
pub struct Switches;

impl Switches {
    /// Consumes world events and emits switch and hierarchy commands.
    ///
    /// A switch cell whose trigger becomes `Enter` is activated. When a
    /// switch flips on, every object in its group is queued for enabling;
    /// flipping off leaves the group as it is.
    pub fn handle<'a, F>(
        &mut self,
        events: &[Event],
        cells: &CellView,
        group_of: F,
        out: &mut Vec<Command>,
    ) where
        F: Fn(CellId) -> &'a [ObjectId],
    {
        for event in events {
            match event {
                Event::TriggerChanged {
                    cell,
                    state: TriggerState::Enter,
                } => {
                    let is_switch = cells
                        .get(*cell)
                        .is_some_and(|snapshot| snapshot.switch.is_some());
                    if is_switch {
                        out.push(Command::ActivateSwitch { cell: *cell });
                    }
                }
                Event::SwitchToggled {
                    cell,
                    state: SwitchState::On,
                } => {
                    let members = group_of(*cell);
                    if !members.is_empty() {
                        debug!(cell = cell.get(), members = members.len(), "revealing switch group");
                    }
                    out.extend(
                        members
                            .iter()
                            .map(|root| Command::EnableHierarchy { root: *root }),
                    );
                }
                _ => {}
            }
        }
    }
}
