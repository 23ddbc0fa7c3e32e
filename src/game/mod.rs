//! Object vocabulary, grid model, rules and goals

pub mod goal;
pub mod grid;
pub mod io;
pub mod object;
pub mod rules;

pub use goal::GoalCondition;
pub use grid::{Cell, GridState, Level};
pub use io::{
    create_example_levels, load_level_from_file, parse_level_from_string, save_level_to_file,
};
pub use object::ObjectKind;
pub use rules::{Direction, PatternEntry, Rule, RuleId, RuleLibrary, RuleTemplate, StayPolicy};
