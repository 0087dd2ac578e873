#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Agent path follower that interpolates poses along solved paths.

use std::collections::BTreeMap;

use blocks_core::{AgentId, Command, Event, NodeId, Pose, SolvedPath, Waypoint};
use blocks_world::query::AgentView;
use glam::{Quat, Vec3};
use tracing::debug;

/// Segments shorter than this complete in a single step.
const MIN_SEGMENT_LENGTH: f32 = 1e-6;

/// Progress of one agent along a solved path.
#[derive(Clone, Debug, PartialEq)]
pub struct PathFollower {
    waypoints: Vec<Waypoint>,
    target: usize,
    t: f32,
    moving: bool,
}

/// Outcome of advancing a [`PathFollower`] by one step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FollowerStep {
    /// Node the agent last departed from or arrived at.
    pub node: NodeId,
    /// Interpolated world-space pose.
    pub pose: Pose,
    /// Whether the follower still has path left to cover.
    pub moving: bool,
}

impl PathFollower {
    /// Starts following `path`, or returns `None` when it has no segment.
    #[must_use]
    pub fn start(path: &SolvedPath) -> Option<Self> {
        if path.len() < 2 {
            return None;
        }

        Some(Self {
            waypoints: path.waypoints().to_vec(),
            target: 1,
            t: 0.0,
            moving: true,
        })
    }

    /// Whether the follower still has path left to cover.
    #[must_use]
    pub const fn is_moving(&self) -> bool {
        self.moving
    }

    /// Progress along the current segment.
    #[must_use]
    pub const fn progress(&self) -> f32 {
        self.t
    }

    /// Index of the waypoint the follower is heading to.
    #[must_use]
    pub const fn target_index(&self) -> usize {
        self.target
    }

    /// Advances along the current segment.
    ///
    /// Progress grows by `velocity² / segment_length` per call, independent of
    /// `dt`. The position is interpolated with that progress before any
    /// segment change, so overshoot carries into the reported position as
    /// well as into the next segment. Rotation blends from `rotation` toward
    /// the segment heading by `rotation_smoothing * dt`.
    pub fn advance(
        &mut self,
        velocity: f32,
        rotation_smoothing: f32,
        dt: f32,
        rotation: Quat,
    ) -> FollowerStep {
        let from = self.waypoints[self.target - 1];
        let to = self.waypoints[self.target];
        if !self.moving {
            return FollowerStep {
                node: to.node,
                pose: Pose::new(to.position, rotation),
                moving: false,
            };
        }

        let offset = to.position - from.position;
        let length = offset.length();
        if length > MIN_SEGMENT_LENGTH {
            self.t += velocity * velocity / length;
        } else {
            self.t = 1.0;
        }
        let mut position = from.position.lerp(to.position, self.t);
        let rotation = if length > MIN_SEGMENT_LENGTH {
            let blend = (rotation_smoothing * dt).clamp(0.0, 1.0);
            rotation.lerp(look_rotation(offset / length), blend)
        } else {
            rotation
        };

        let mut node = from.node;
        if self.t >= 1.0 {
            node = to.node;
            if self.target < self.waypoints.len() - 1 {
                self.target += 1;
                self.t -= 1.0;
            } else {
                self.moving = false;
                position = to.position;
            }
        }

        FollowerStep {
            node,
            pose: Pose::new(position, rotation),
            moving: self.moving,
        }
    }
}

/// Orientation facing `direction` on the ground plane, with +Z as forward.
fn look_rotation(direction: Vec3) -> Quat {
    Quat::from_rotation_y(direction.x.atan2(direction.z))
}

/// Pure system that starts followers on solved paths and publishes poses.
#[derive(Debug)]
pub struct Movement {
    velocity: f32,
    rotation_smoothing: f32,
    followers: BTreeMap<AgentId, PathFollower>,
}

impl Movement {
    /// Creates a movement system with the provided agent parameters.
    #[must_use]
    pub fn new(velocity: f32, rotation_smoothing: f32) -> Self {
        Self {
            velocity,
            rotation_smoothing,
            followers: BTreeMap::new(),
        }
    }

    /// Consumes world events and the agent view to emit pose commands.
    ///
    /// A solved path replaces whatever the agent was following. Followers only
    /// advance on steps that carry a [`Event::TimeAdvanced`]; finished
    /// followers are dropped so idle agents receive no further commands.
    pub fn handle(&mut self, events: &[Event], agents: &AgentView, out: &mut Vec<Command>) {
        let mut dt = None;
        for event in events {
            match event {
                Event::PathSolved { agent, path } => match PathFollower::start(path) {
                    Some(follower) => {
                        debug!(agent = agent.get(), waypoints = path.len(), "following path");
                        let _ = self.followers.insert(*agent, follower);
                    }
                    None => {
                        let _ = self.followers.remove(agent);
                    }
                },
                Event::TimeAdvanced { dt: step } => dt = Some(step.as_secs_f32()),
                _ => {}
            }
        }

        let Some(dt) = dt else {
            return;
        };

        for (agent, follower) in &mut self.followers {
            let Some(snapshot) = agents.get(*agent) else {
                continue;
            };
            let step = follower.advance(
                self.velocity,
                self.rotation_smoothing,
                dt,
                snapshot.pose.rotation,
            );
            out.push(Command::SetAgentPose {
                agent: *agent,
                node: step.node,
                pose: step.pose,
                moving: step.moving,
            });
        }

        self.followers.retain(|_, follower| follower.is_moving());
    }

    /// Number of agents currently following a path.
    #[must_use]
    pub fn active_followers(&self) -> usize {
        self.followers.len()
    }
}

#[cfg(test)]
mod tests {
    use blocks_core::GridCoord;

    use super::*;

    fn path(points: &[(u32, u32)]) -> SolvedPath {
        SolvedPath::new(
            points
                .iter()
                .map(|&(x, y)| Waypoint {
                    coord: GridCoord::new(x, y),
                    node: NodeId::from_coord(GridCoord::new(x, y), 10),
                    position: Vec3::new(x as f32, 0.0, y as f32),
                })
                .collect(),
        )
    }

    #[test]
    fn single_waypoint_paths_do_not_start() {
        assert!(PathFollower::start(&path(&[(3, 3)])).is_none());
        assert!(PathFollower::start(&SolvedPath::not_found()).is_none());
    }

    #[test]
    fn progress_grows_by_velocity_squared_over_distance() {
        let mut follower = PathFollower::start(&path(&[(0, 0), (2, 0)])).expect("follower");

        let step = follower.advance(0.5, 0.0, 1.0, Quat::IDENTITY);

        assert!((follower.progress() - 0.125).abs() < 1e-6);
        assert!((step.pose.position.x - 0.25).abs() < 1e-6);
        assert_eq!(step.node, NodeId::new(0));
        assert!(step.moving);
    }

    #[test]
    fn overshoot_carries_into_next_segment() {
        let mut follower =
            PathFollower::start(&path(&[(0, 0), (1, 0), (2, 0), (3, 0)])).expect("follower");

        let step = follower.advance(1.2, 0.0, 1.0, Quat::IDENTITY);

        assert_eq!(follower.target_index(), 2);
        assert!((follower.progress() - 0.44).abs() < 1e-5);
        assert!((step.pose.position.x - 1.44).abs() < 1e-5);
        assert_eq!(step.node, NodeId::new(1));
    }

    #[test]
    fn final_segment_snaps_to_end() {
        let mut follower = PathFollower::start(&path(&[(0, 0), (0, 1)])).expect("follower");

        let step = follower.advance(1.5, 0.0, 1.0, Quat::IDENTITY);

        assert!(!step.moving);
        assert!(!follower.is_moving());
        assert_eq!(step.pose.position, Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(step.node, NodeId::new(10));
    }

    #[test]
    fn rotation_blends_toward_heading() {
        let mut follower = PathFollower::start(&path(&[(0, 0), (5, 0)])).expect("follower");

        let half = follower.advance(0.1, 5.0, 0.1, Quat::IDENTITY);
        let full = follower.advance(0.1, 100.0, 1.0, Quat::IDENTITY);

        let heading = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        assert!(half.pose.rotation.angle_between(heading) > 0.1);
        assert!(full.pose.rotation.abs_diff_eq(heading, 1e-5));
        assert!((heading * Vec3::Z - Vec3::X).length() < 1e-5);
    }
}
