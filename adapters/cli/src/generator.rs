//! Seeded random level generation.

use anyhow::{bail, Result};
use blocks_core::{BlockType, GridCoord, NodeId};
use blocks_navigation::{solve_path, Grid, GridNode, GridTransform};
use blocks_world::{BlockLayout, LevelLayout};
use glam::{Vec2, Vec3};
use rand::Rng;
use tracing::debug;

/// Attempts made before giving up on a connected layout.
const MAX_ATTEMPTS: u32 = 10_000;

/// Parameters of a randomly generated rectangular level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct RandomLevel {
    pub(crate) width: u32,
    pub(crate) height: u32,
    /// Upper bound of each wall draw; larger values produce fewer walls.
    pub(crate) empty_factor: u32,
}

impl RandomLevel {
    /// Rolls layouts until the start corner can reach the opposite corner.
    ///
    /// The wall counter carries over between attempts.
    pub(crate) fn generate<R: Rng>(&self, rng: &mut R) -> Result<LevelLayout> {
        if self.empty_factor == 0 {
            bail!("empty factor must be positive");
        }
        if u64::from(self.width) * u64::from(self.height) < 2 {
            bail!("a {}x{} level has no room for a goal", self.width, self.height);
        }

        let mut counter = 0;
        for attempt in 1..=MAX_ATTEMPTS {
            let walkable = self.roll(rng, &mut counter);
            if self.corners_connected(&walkable)? {
                debug!(attempt, width = self.width, height = self.height, "random level generated");
                return Ok(self.layout(&walkable));
            }
        }

        bail!(
            "no connected {}x{} level after {MAX_ATTEMPTS} attempts",
            self.width,
            self.height
        )
    }

    fn last(&self) -> GridCoord {
        GridCoord::new(self.width - 1, self.height - 1)
    }

    fn coords(&self) -> impl Iterator<Item = GridCoord> + '_ {
        (0..self.height).flat_map(move |y| (0..self.width).map(move |x| GridCoord::new(x, y)))
    }

    fn roll<R: Rng>(&self, rng: &mut R, counter: &mut u32) -> Vec<bool> {
        let last = self.last();
        self.coords()
            .map(|coord| {
                if coord == GridCoord::new(0, 0) || coord == last {
                    return true;
                }
                *counter += 1;
                let wall = rng.gen_range(0..self.empty_factor) < *counter;
                if wall {
                    *counter = 0;
                }
                !wall
            })
            .collect()
    }

    fn corners_connected(&self, walkable: &[bool]) -> Result<bool> {
        let nodes = self
            .coords()
            .zip(walkable)
            .map(|(coord, &open)| GridNode::new(coord, self.width).with_traversable(open));
        let grid = Grid::new(
            self.width,
            self.height,
            GridTransform::new(Vec2::ZERO, 1.0),
            nodes,
        )?;

        let start = NodeId::from_coord(GridCoord::new(0, 0), self.width);
        let end = NodeId::from_coord(self.last(), self.width);
        Ok(solve_path(&grid, start, end).is_ok())
    }

    fn layout(&self, walkable: &[bool]) -> LevelLayout {
        let last = self.last();
        let blocks = self
            .coords()
            .zip(walkable)
            .filter(|&(_, open)| *open)
            .map(|(coord, _)| {
                let block =
                    BlockLayout::new(Vec3::new(coord.x() as f32, 0.0, coord.y() as f32));
                if coord == GridCoord::new(0, 0) {
                    block.with_type(BlockType::Start)
                } else if coord == last {
                    block.with_type(BlockType::Goal)
                } else {
                    block
                }
            })
            .collect();

        LevelLayout {
            blocks,
            ..LevelLayout::default()
        }
    }
}
