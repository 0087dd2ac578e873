//! Scenario files: simulation settings, an optional level and scripted input.

use std::{collections::BTreeSet, fs, path::Path, time::Duration};

use anyhow::{Context, Result};
use blocks_core::CellId;
use blocks_simulation::{Config, StepInput};
use blocks_world::LevelLayout;
use glam::Vec3;
use serde::Deserialize;

/// Contents of a scenario TOML file.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub(crate) struct Scenario {
    #[serde(default)]
    pub(crate) simulation: Config,
    #[serde(default)]
    pub(crate) level: Option<LevelLayout>,
    #[serde(default)]
    pub(crate) script: Vec<ScriptEntry>,
}

/// Input injected at one step.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub(crate) struct ScriptEntry {
    pub(crate) step: u64,
    #[serde(default)]
    pub(crate) pointer: Option<Vec3>,
    /// Overrides the overlap set derived from agent positions.
    #[serde(default)]
    pub(crate) overlapping: Option<BTreeSet<u32>>,
}

impl Scenario {
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("invalid scenario {}", path.display()))
    }

    /// Expands the script into one input per step.
    pub(crate) fn inputs(&self, steps: u64, dt: Duration) -> Vec<StepInput> {
        (0..steps)
            .map(|step| {
                let mut input = StepInput::idle(dt);
                for entry in self.script.iter().filter(|entry| entry.step == step) {
                    input.pointer.extend(entry.pointer);
                    if let Some(cells) = &entry.overlapping {
                        input.overlapping = Some(cells.iter().copied().map(CellId::new).collect());
                    }
                }
                input
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use blocks_core::BlockType;

    use super::*;

    const SCENARIO: &str = r#"
        [simulation]
        velocity = 0.5
        straight_line_only = false

        [[level.blocks]]
        position = [0.0, 0.0, 0.0]
        block_type = "Start"

        [[level.blocks]]
        position = [1.0, 0.0, 0.0]
        block_type = "Goal"

        [[script]]
        step = 2
        pointer = [1.0, 0.0, 0.0]

        [[script]]
        step = 2
        overlapping = [1]
    "#;

    #[test]
    fn parses_all_tables() {
        let scenario: Scenario = toml::from_str(SCENARIO).expect("scenario");

        assert_eq!(scenario.simulation.velocity, 0.5);
        assert!(!scenario.simulation.straight_line_only);
        let level = scenario.level.expect("level");
        assert_eq!(level.blocks[1].block_type, BlockType::Goal);
        assert_eq!(scenario.script.len(), 2);
    }

    #[test]
    fn script_entries_land_on_their_step() {
        let scenario: Scenario = toml::from_str(SCENARIO).expect("scenario");
        let inputs = scenario.inputs(4, Duration::from_millis(20));

        assert_eq!(inputs.len(), 4);
        assert_eq!(inputs[0], StepInput::idle(Duration::from_millis(20)));
        assert_eq!(inputs[2].pointer, vec![Vec3::X]);
        assert_eq!(
            inputs[2].overlapping,
            Some(BTreeSet::from([CellId::new(1)]))
        );
    }

    #[test]
    fn empty_file_uses_defaults() {
        let scenario: Scenario = toml::from_str("").expect("scenario");

        assert_eq!(scenario, Scenario::default());
    }
}
