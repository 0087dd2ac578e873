#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Traversability grid, path search and the path request protocol.
//!
//! The [`Grid`] is built once from a level scan and afterwards only has node
//! traversability and block flags mutated. [`solve_path`] runs a best-first
//! search over a read-only grid reference, and [`service_request`] wraps it
//! with the request semantics agents rely on: missing nodes and failed
//! searches collapse into a not-found [`SolvedPath`](blocks_core::SolvedPath),
//! and straight-line requests reject paths that turn.

mod grid;
mod request;
mod search;

pub use grid::{Grid, GridError, GridNode, GridTransform, MAX_SIDE_LENGTH};
pub use request::{is_straight_line, service_request, PendingRequest, RequestSlot};
pub use search::{solve_path, Solver};
