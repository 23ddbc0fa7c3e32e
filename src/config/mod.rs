//! Configuration management for the planner

pub mod settings;

pub use settings::{
    BoardConfig, CliOverrides, CustomRule, OutputConfig, OutputFormat, PlanningConfig, RuleSet,
    RulesConfig, Settings, SolverConfig,
};
