//! Rule library: local pattern/replacement rewrites
//!
//! Directional actions are authored once, facing east, and registered in all
//! four directions by rotating their offsets.

use super::{Cell, GridState, ObjectKind};
use crate::error::{PlanError, PlanResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// One pattern entry: the cell at `anchor + (dx, dy)` must hold `kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatternEntry {
    pub dx: isize,
    pub dy: isize,
    pub kind: ObjectKind,
}

impl PatternEntry {
    pub fn new(dx: isize, dy: isize, kind: ObjectKind) -> Self {
        Self { dx, dy, kind }
    }
}

/// Index of a rule inside its [`RuleLibrary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleId(pub usize);

/// A registered rewrite. `pattern[0]` is the anchor at offset `(0, 0)` and
/// `replacement[i]` is what `pattern[i]`'s cell holds after the rule fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub name: String,
    pub pattern: Vec<PatternEntry>,
    pub replacement: Vec<ObjectKind>,
}

impl Rule {
    pub fn anchor_kind(&self) -> ObjectKind {
        self.pattern[0].kind
    }

    /// A rule whose replacement equals its pattern, i.e. staying still.
    pub fn is_identity(&self) -> bool {
        self.pattern
            .iter()
            .zip(&self.replacement)
            .all(|(entry, &kind)| entry.kind == kind)
    }

    /// Whether some anchor on a `width x height` board keeps every offset in bounds.
    pub fn fits(&self, width: usize, height: usize) -> bool {
        let (min_dx, max_dx, min_dy, max_dy) = self.extent();
        let span_x = (max_dx - min_dx) as usize;
        let span_y = (max_dy - min_dy) as usize;
        span_x < width && span_y < height
    }

    /// Fire the rule with its anchor on `anchor`. `None` when the pattern leaves
    /// the board or does not match `state`.
    pub fn apply(&self, state: &GridState, anchor: Cell) -> Option<GridState> {
        let cells: Vec<Cell> = self
            .pattern
            .iter()
            .map(|entry| anchor.offset(entry.dx, entry.dy, state.width, state.height))
            .collect::<Option<_>>()?;
        if cells
            .iter()
            .zip(&self.pattern)
            .any(|(&cell, entry)| state.get(cell) != Some(entry.kind))
        {
            return None;
        }

        let mut next = state.clone();
        for (&cell, &kind) in cells.iter().zip(&self.replacement) {
            next.set(cell, kind);
        }
        Some(next)
    }

    fn extent(&self) -> (isize, isize, isize, isize) {
        self.pattern.iter().fold((0, 0, 0, 0), |(lx, hx, ly, hy), e| {
            (lx.min(e.dx), hx.max(e.dx), ly.min(e.dy), hy.max(e.dy))
        })
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: [", self.name)?;
        for (i, entry) in self.pattern.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "({},{}) {}", entry.dx, entry.dy, entry.kind)?;
        }
        write!(f, "] -> [")?;
        for (i, kind) in self.replacement.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", kind)?;
        }
        write!(f, "]")
    }
}

/// Cardinal directions. North is `-y` because row 0 is the top row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] =
        [Direction::North, Direction::East, Direction::South, Direction::West];

    /// Unit vector of the direction.
    pub fn unit(self) -> (isize, isize) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }

    /// Rotate an east-facing offset so that `(1, 0)` maps onto [`Direction::unit`].
    pub fn transform(self, dx: isize, dy: isize) -> (isize, isize) {
        let (ux, uy) = self.unit();
        (dx * ux - dy * uy, dx * uy + dy * ux)
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Direction::North => "n",
            Direction::East => "e",
            Direction::South => "s",
            Direction::West => "w",
        }
    }
}

/// An east-facing rule body to be registered in every direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleTemplate {
    pub name: String,
    pub pattern: Vec<PatternEntry>,
    pub replacement: Vec<ObjectKind>,
}

impl RuleTemplate {
    pub fn new(
        name: impl Into<String>,
        pattern: Vec<PatternEntry>,
        replacement: Vec<ObjectKind>,
    ) -> Self {
        Self {
            name: name.into(),
            pattern,
            replacement,
        }
    }

    /// Player steps onto the background cell ahead of it.
    pub fn player_move() -> Self {
        Self::new(
            "move",
            vec![
                PatternEntry::new(0, 0, ObjectKind::Player),
                PatternEntry::new(1, 0, ObjectKind::Background),
            ],
            vec![ObjectKind::Background, ObjectKind::Player],
        )
    }

    /// Player pushes the crate ahead of it onto background.
    pub fn player_push() -> Self {
        Self::new(
            "push",
            vec![
                PatternEntry::new(0, 0, ObjectKind::Player),
                PatternEntry::new(1, 0, ObjectKind::Crate),
                PatternEntry::new(2, 0, ObjectKind::Background),
            ],
            vec![ObjectKind::Background, ObjectKind::Player, ObjectKind::Crate],
        )
    }

    /// Player stays in place. Direction-free.
    pub fn player_stay() -> Self {
        Self::new(
            "stay",
            vec![PatternEntry::new(0, 0, ObjectKind::Player)],
            vec![ObjectKind::Player],
        )
    }

    /// The template rotated to face `direction`.
    pub fn oriented(&self, direction: Direction) -> (Vec<PatternEntry>, String) {
        let pattern = self
            .pattern
            .iter()
            .map(|entry| {
                let (dx, dy) = direction.transform(entry.dx, entry.dy);
                PatternEntry::new(dx, dy, entry.kind)
            })
            .collect();
        (pattern, format!("{}-{}", self.name, direction.suffix()))
    }
}

/// How a step with no movement is modelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StayPolicy {
    /// Every step must fire a registered rule; no implicit no-op.
    #[default]
    Forbidden,
    /// Register a `stay` identity rule so standing still is an ordinary candidate.
    IdentityRule,
}

/// Ordered catalog of validated rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleLibrary {
    rules: Vec<Rule>,
}

impl RuleLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move and push in four directions, plus `stay` when the policy asks for it.
    pub fn standard(stay_policy: StayPolicy) -> PlanResult<Self> {
        let mut library = Self::new();
        library.register_directional(&RuleTemplate::player_move())?;
        library.register_directional(&RuleTemplate::player_push())?;
        library.apply_stay_policy(stay_policy)?;
        Ok(library)
    }

    /// Moves in four directions only, plus `stay` when the policy asks for it.
    pub fn moves_only(stay_policy: StayPolicy) -> PlanResult<Self> {
        let mut library = Self::new();
        library.register_directional(&RuleTemplate::player_move())?;
        library.apply_stay_policy(stay_policy)?;
        Ok(library)
    }

    pub fn apply_stay_policy(&mut self, stay_policy: StayPolicy) -> PlanResult<()> {
        if stay_policy == StayPolicy::IdentityRule && !self.rules.iter().any(Rule::is_identity) {
            let stay = RuleTemplate::player_stay();
            self.register_rule(stay.name, stay.pattern, stay.replacement)?;
        }
        Ok(())
    }

    /// Validate and append a rule.
    ///
    /// Fails when the lengths differ, the first entry is not the `(0, 0)` anchor,
    /// or two entries target the same offset.
    pub fn register_rule(
        &mut self,
        name: impl Into<String>,
        pattern: Vec<PatternEntry>,
        replacement: Vec<ObjectKind>,
    ) -> PlanResult<RuleId> {
        let name = name.into();
        if pattern.is_empty() {
            return Err(PlanError::configuration(format!("rule '{}' has an empty pattern", name)));
        }
        if pattern.len() != replacement.len() {
            return Err(PlanError::configuration(format!(
                "rule '{}' has {} pattern entries but {} replacements",
                name,
                pattern.len(),
                replacement.len()
            )));
        }
        if pattern[0].dx != 0 || pattern[0].dy != 0 {
            return Err(PlanError::configuration(format!(
                "rule '{}' must start with an anchor entry at (0, 0)",
                name
            )));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = pattern.iter().find(|e| !seen.insert((e.dx, e.dy))) {
            return Err(PlanError::configuration(format!(
                "rule '{}' lists offset ({}, {}) twice",
                name, dup.dx, dup.dy
            )));
        }
        if self.rules.iter().any(|r| r.name == name) {
            return Err(PlanError::configuration(format!("rule '{}' is already registered", name)));
        }

        let id = RuleId(self.rules.len());
        self.rules.push(Rule {
            id,
            name,
            pattern,
            replacement,
        });
        Ok(id)
    }

    /// Register `template` once per direction, named `<name>-<n|e|s|w>`.
    pub fn register_directional(&mut self, template: &RuleTemplate) -> PlanResult<Vec<RuleId>> {
        Direction::ALL
            .iter()
            .map(|&direction| {
                let (pattern, name) = template.oriented(direction);
                self.register_rule(name, pattern, template.replacement.clone())
            })
            .collect()
    }

    pub fn get(&self, id: RuleId) -> Option<&Rule> {
        self.rules.get(id.0)
    }

    pub fn find(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Check the library against a board before any constraint is built.
    pub fn validate_for_board(&self, width: usize, height: usize) -> PlanResult<()> {
        if self.rules.is_empty() {
            return Err(PlanError::configuration("rule library is empty"));
        }
        if let Some(rule) = self.rules.iter().find(|r| !r.fits(width, height)) {
            return Err(PlanError::configuration(format!(
                "rule '{}' does not fit anywhere on a {}x{} board",
                rule.name, width, height
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_rejects_length_mismatch() {
        let mut library = RuleLibrary::new();
        let err = library
            .register_rule(
                "broken",
                vec![PatternEntry::new(0, 0, ObjectKind::Player)],
                vec![ObjectKind::Player, ObjectKind::Background],
            )
            .unwrap_err();
        assert!(matches!(err, PlanError::Configuration(_)));
    }

    #[test]
    fn test_register_requires_anchor_first() {
        let mut library = RuleLibrary::new();
        let result = library.register_rule(
            "no-anchor",
            vec![PatternEntry::new(1, 0, ObjectKind::Player)],
            vec![ObjectKind::Player],
        );
        assert!(result.is_err());
        assert!(library.is_empty());
    }

    #[test]
    fn test_register_rejects_duplicate_offsets() {
        let mut library = RuleLibrary::new();
        let result = library.register_rule(
            "dup",
            vec![
                PatternEntry::new(0, 0, ObjectKind::Player),
                PatternEntry::new(0, 0, ObjectKind::Crate),
            ],
            vec![ObjectKind::Player, ObjectKind::Crate],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_direction_transform_rotates_unit_vector() {
        for direction in Direction::ALL {
            assert_eq!(direction.transform(1, 0), direction.unit());
            assert_eq!(direction.transform(0, 0), (0, 0));
        }
        assert_eq!(Direction::West.transform(2, 0), (-2, 0));
        assert_eq!(Direction::North.transform(2, 0), (0, -2));
    }

    #[test]
    fn test_directional_registration_builds_four_rules() {
        let mut library = RuleLibrary::new();
        let ids = library.register_directional(&RuleTemplate::player_push()).unwrap();
        assert_eq!(ids.len(), 4);

        let south = library.find("push-s").unwrap();
        assert_eq!(south.pattern[1], PatternEntry::new(0, 1, ObjectKind::Crate));
        assert_eq!(south.pattern[2], PatternEntry::new(0, 2, ObjectKind::Background));
        assert_eq!(
            south.replacement,
            vec![ObjectKind::Background, ObjectKind::Player, ObjectKind::Crate]
        );
    }

    #[test]
    fn test_standard_library_and_stay_policy() {
        let forbidden = RuleLibrary::standard(StayPolicy::Forbidden).unwrap();
        assert_eq!(forbidden.len(), 8);
        assert!(!forbidden.iter().any(Rule::is_identity));

        let with_stay = RuleLibrary::standard(StayPolicy::IdentityRule).unwrap();
        assert_eq!(with_stay.len(), 9);
        assert!(with_stay.find("stay").unwrap().is_identity());
    }

    #[test]
    fn test_board_too_small_for_rule() {
        let library = RuleLibrary::standard(StayPolicy::Forbidden).unwrap();
        // push needs three cells in a row
        assert!(library.validate_for_board(2, 2).is_err());
        assert!(library.validate_for_board(3, 3).is_ok());
    }

    #[test]
    fn test_apply_push() {
        let library = RuleLibrary::standard(StayPolicy::Forbidden).unwrap();
        let state = crate::game::Level::new(5, 1)
            .with(0, 0, ObjectKind::Player)
            .unwrap()
            .with(1, 0, ObjectKind::Crate)
            .unwrap()
            .initial_state();

        let push_e = library.find("push-e").unwrap();
        let next = push_e.apply(&state, Cell::new(0, 0)).unwrap();
        assert_eq!(next.kind_at(1, 0), Some(ObjectKind::Player));
        assert_eq!(next.kind_at(2, 0), Some(ObjectKind::Crate));
        assert_eq!(state.diff(&next).len(), 3);

        // pattern does not match, or would leave the board
        assert!(library.find("move-e").unwrap().apply(&state, Cell::new(0, 0)).is_none());
        assert!(library.find("push-w").unwrap().apply(&state, Cell::new(0, 0)).is_none());
    }
}
