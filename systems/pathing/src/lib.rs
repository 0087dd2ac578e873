#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Turns pointer selections into path requests and services the request slot.

use blocks_core::{AgentId, Command, PathRequest};
use blocks_navigation::{service_request, Grid, PendingRequest, Solver};
use blocks_world::query::AgentView;
use glam::Vec3;
use tracing::{debug, trace};

/// System owning the search workspace used to answer path requests.
#[derive(Debug)]
pub struct Pathing {
    solver: Solver,
    straight_line_only: bool,
}

impl Pathing {
    /// Creates a pathing system whose pointer requests use `straight_line_only`.
    #[must_use]
    pub fn new(straight_line_only: bool) -> Self {
        Self {
            solver: Solver::new(),
            straight_line_only,
        }
    }

    /// Raises a request from `agent`'s current node to the node under `hit`.
    ///
    /// Nothing is emitted when either node is missing from the grid or when
    /// the pointer selects the node the agent already stands on.
    pub fn handle_pointer(
        &self,
        hit: Vec3,
        agent: AgentId,
        grid: &Grid,
        agents: &AgentView,
        out: &mut Vec<Command>,
    ) {
        let Some(start) = agents.get(agent).map(|snapshot| snapshot.node) else {
            trace!(agent = agent.get(), "pointer ignored: unknown agent");
            return;
        };
        let Some(end) = grid.node_at(hit).map(|node| node.id()) else {
            trace!(?hit, "pointer ignored: no node under hit");
            return;
        };
        if !grid.contains_index(start) || start == end {
            return;
        }

        debug!(agent = agent.get(), %start, %end, "pointer path request");
        out.push(Command::RequestPath {
            agent,
            request: PathRequest::new(start, end, self.straight_line_only),
        });
    }

    /// Services the pending request, if any, against the current grid.
    pub fn service(&mut self, grid: &Grid, pending: Option<PendingRequest>, out: &mut Vec<Command>) {
        let Some(PendingRequest { agent, request }) = pending else {
            return;
        };

        let path = service_request(&mut self.solver, grid, &request);
        out.push(Command::CompletePathRequest { agent, path });
    }
}

impl Default for Pathing {
    fn default() -> Self {
        Self::new(true)
    }
}
