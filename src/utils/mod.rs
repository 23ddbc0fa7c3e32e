//! Output formatting helpers

pub mod display;

pub use display::{CellRecord, Color, ColorOutput, PlanFormatter, StateRecord};
