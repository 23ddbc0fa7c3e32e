//! Configuration settings for the planner

use crate::error::PlanResult;
use crate::game::{GoalCondition, ObjectKind, PatternEntry, RuleLibrary, RuleTemplate, StayPolicy};
use crate::sat::{EncodingOptions, FrameEncoding, Horizon, SolverOptions};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub board: BoardConfig,
    pub planning: PlanningConfig,
    /// Conjunction of goal clauses
    pub goal: Vec<GoalCondition>,
    pub rules: RulesConfig,
    pub solver: SolverConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    pub level_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanningConfig {
    /// Number of snapshots when the plan length is fixed
    pub horizon: usize,
    /// Upper bound on the plan length when minimising
    pub max_horizon: usize,
    pub optimize: bool,
    #[serde(default)]
    pub stay_policy: StayPolicy,
    #[serde(default)]
    pub frame_encoding: FrameEncoding,
    #[serde(default = "default_parallel_build")]
    pub parallel_build: bool,
}

fn default_parallel_build() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSet {
    /// Move and push in four directions
    Standard,
    MovesOnly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    pub library: RuleSet,
    #[serde(default)]
    pub custom: Vec<CustomRule>,
}

/// A user-supplied rule. `pattern` entries are `[dx, dy, kind]`, anchor first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomRule {
    pub name: String,
    pub pattern: Vec<(isize, isize, ObjectKind)>,
    pub replacement: Vec<ObjectKind>,
    /// Author facing east and register all four rotations
    #[serde(default)]
    pub directional: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Per solver call; 0 disables the limit
    pub timeout_seconds: u64,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub output_directory: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Text,
    Json,
    /// Per-timestep `{x, y, c}` records for an external renderer
    Records,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            board: BoardConfig {
                level_file: PathBuf::from("levels/push.txt"),
            },
            planning: PlanningConfig {
                horizon: 7,
                max_horizon: 12,
                optimize: true,
                stay_policy: StayPolicy::Forbidden,
                frame_encoding: FrameEncoding::Explanatory,
                parallel_build: true,
            },
            goal: vec![GoalCondition::object_at(5, 4, ObjectKind::Crate)],
            rules: RulesConfig {
                library: RuleSet::Standard,
                custom: Vec::new(),
            },
            solver: SolverConfig {
                timeout_seconds: 300,
                max_retries: 2,
            },
            output: OutputConfig {
                format: OutputFormat::Text,
                output_directory: PathBuf::from("output/plans"),
            },
        }
    }
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let settings: Settings = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to a YAML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self).context("Failed to serialize settings")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        if !self.planning.optimize && self.planning.horizon == 0 {
            anyhow::bail!("Horizon must include the initial snapshot (horizon >= 1)");
        }

        if self.goal.is_empty() {
            anyhow::bail!("At least one goal clause is required");
        }

        if !self.board.level_file.exists() {
            anyhow::bail!("Level file does not exist: {}", self.board.level_file.display());
        }

        Ok(())
    }

    /// Merge settings with command line overrides
    pub fn merge_with_cli(&mut self, cli_overrides: &CliOverrides) {
        if let Some(horizon) = cli_overrides.horizon {
            self.planning.horizon = horizon;
            self.planning.optimize = false;
        }
        if let Some(max_horizon) = cli_overrides.max_horizon {
            self.planning.max_horizon = max_horizon;
            self.planning.optimize = true;
        }
        if let Some(ref level_file) = cli_overrides.level_file {
            self.board.level_file = level_file.clone();
        }
        if let Some(ref output_dir) = cli_overrides.output_dir {
            self.output.output_directory = output_dir.clone();
        }
        if let Some(format) = cli_overrides.format {
            self.output.format = format;
        }
    }

    /// The configured rule library
    pub fn rule_library(&self) -> PlanResult<RuleLibrary> {
        let mut library = match self.rules.library {
            RuleSet::Standard => RuleLibrary::standard(self.planning.stay_policy)?,
            RuleSet::MovesOnly => RuleLibrary::moves_only(self.planning.stay_policy)?,
        };

        for custom in &self.rules.custom {
            let pattern: Vec<PatternEntry> = custom
                .pattern
                .iter()
                .map(|&(dx, dy, kind)| PatternEntry::new(dx, dy, kind))
                .collect();
            if custom.directional {
                let template =
                    RuleTemplate::new(custom.name.clone(), pattern, custom.replacement.clone());
                library.register_directional(&template)?;
            } else {
                library.register_rule(custom.name.clone(), pattern, custom.replacement.clone())?;
            }
        }
        Ok(library)
    }

    pub fn goal_condition(&self) -> GoalCondition {
        GoalCondition::all(self.goal.clone())
    }

    pub fn horizon(&self) -> Horizon {
        if self.planning.optimize {
            Horizon::Minimize {
                max: self.planning.max_horizon,
            }
        } else {
            Horizon::Fixed(self.planning.horizon)
        }
    }

    pub fn encoding_options(&self) -> EncodingOptions {
        EncodingOptions {
            frame: self.planning.frame_encoding,
            parallel: self.planning.parallel_build,
        }
    }

    pub fn solver_options(&self) -> SolverOptions {
        SolverOptions {
            timeout: (self.solver.timeout_seconds > 0)
                .then(|| Duration::from_secs(self.solver.timeout_seconds)),
            max_retries: self.solver.max_retries,
        }
    }
}

/// Command line overrides for settings
#[derive(Debug, Default)]
pub struct CliOverrides {
    /// Fixes the horizon and turns minimisation off
    pub horizon: Option<usize>,
    /// Sets the bound and turns minimisation on
    pub max_horizon: Option<usize>,
    pub level_file: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub format: Option<OutputFormat>,
}
