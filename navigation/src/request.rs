//! Single-slot path request protocol.

use blocks_core::{AgentId, PathRequest, SolvedPath, Waypoint};
use tracing::{debug, trace};

use crate::{grid::Grid, search::Solver};

/// Request waiting in the slot together with the agent that raised it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingRequest {
    /// Agent that will follow the resulting path.
    pub agent: AgentId,
    /// Nodes to connect.
    pub request: PathRequest,
}

/// Holds at most one unserviced request; newer submissions replace older ones.
#[derive(Clone, Debug, Default)]
pub struct RequestSlot {
    pending: Option<PendingRequest>,
}

impl RequestSlot {
    /// Creates an empty slot.
    #[must_use]
    pub const fn new() -> Self {
        Self { pending: None }
    }

    /// Stores `pending`, returning the unserviced request it replaced.
    pub fn submit(&mut self, pending: PendingRequest) -> Option<PendingRequest> {
        self.pending.replace(pending)
    }

    /// Clears the slot, yielding its request if any.
    pub fn take(&mut self) -> Option<PendingRequest> {
        self.pending.take()
    }

    /// Request currently waiting in the slot.
    #[must_use]
    pub const fn peek(&self) -> Option<&PendingRequest> {
        self.pending.as_ref()
    }
}

/// Reports whether a path moves along a single axis only.
///
/// Divergence on each axis is sticky: once the path has stepped along x and
/// along y, anywhere in its length, it is no longer straight.
#[must_use]
pub fn is_straight_line(waypoints: &[Waypoint]) -> bool {
    let mut moved_x = false;
    let mut moved_y = false;
    for pair in waypoints.windows(2) {
        moved_x |= pair[0].coord.x() != pair[1].coord.x();
        moved_y |= pair[0].coord.y() != pair[1].coord.y();
        if moved_x && moved_y {
            return false;
        }
    }
    true
}

/// Runs the search for `request` and applies the straight-line filter.
///
/// Search failures and unknown endpoints both surface as a not-found path.
pub fn service_request(solver: &mut Solver, grid: &Grid, request: &PathRequest) -> SolvedPath {
    let path = match solver.solve(grid, request.start, request.end) {
        Ok(path) => path,
        Err(error) => {
            debug!(start = %request.start, end = %request.end, %error, "path request unsolved");
            return SolvedPath::not_found();
        }
    };

    if request.straight_line_only && !is_straight_line(path.waypoints()) {
        debug!(
            start = %request.start,
            end = %request.end,
            len = path.len(),
            "path rejected by straight-line filter"
        );
        return SolvedPath::not_found();
    }

    trace!(start = %request.start, end = %request.end, len = path.len(), "path solved");
    path
}
