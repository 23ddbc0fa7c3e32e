//! Goal predicates over a single grid snapshot

use super::{Cell, GridState, ObjectKind};
use crate::error::{PlanError, PlanResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Serialised as a single-key map: `object_at: {x, y, kind}`, `count: {kind, exactly}`
/// or `all: [...]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "GoalClause", into = "GoalClause")]
pub enum GoalCondition {
    /// Cell `(x, y)` holds `kind`.
    ObjectAt { x: usize, y: usize, kind: ObjectKind },
    /// Exactly `exactly` cells hold `kind`.
    Count { kind: ObjectKind, exactly: usize },
    /// Every sub-goal holds.
    All(Vec<GoalCondition>),
}

impl GoalCondition {
    pub fn object_at(x: usize, y: usize, kind: ObjectKind) -> Self {
        GoalCondition::ObjectAt { x, y, kind }
    }

    pub fn count(kind: ObjectKind, exactly: usize) -> Self {
        GoalCondition::Count { kind, exactly }
    }

    /// Conjunction of `goals`, flattened when there is only one.
    pub fn all(mut goals: Vec<GoalCondition>) -> Self {
        if goals.len() == 1 {
            goals.remove(0)
        } else {
            GoalCondition::All(goals)
        }
    }

    pub fn is_satisfied_by(&self, state: &GridState) -> bool {
        match self {
            GoalCondition::ObjectAt { x, y, kind } => state.kind_at(*x, *y) == Some(*kind),
            GoalCondition::Count { kind, exactly } => state.count(*kind) == *exactly,
            GoalCondition::All(goals) => goals.iter().all(|g| g.is_satisfied_by(state)),
        }
    }

    /// Reject goals that name cells outside the board or counts above its size.
    pub fn validate(&self, width: usize, height: usize) -> PlanResult<()> {
        match self {
            GoalCondition::ObjectAt { x, y, .. } => {
                if *x >= width || *y >= height {
                    return Err(PlanError::configuration(format!(
                        "goal cell {} is outside the {}x{} board",
                        Cell::new(*x, *y),
                        width,
                        height
                    )));
                }
            }
            GoalCondition::Count { kind, exactly } => {
                if *exactly > width * height {
                    return Err(PlanError::configuration(format!(
                        "goal asks for {} {} cells on a board of {}",
                        exactly,
                        kind,
                        width * height
                    )));
                }
            }
            GoalCondition::All(goals) => {
                for goal in goals {
                    goal.validate(width, height)?;
                }
            }
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct GoalClause {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    object_at: Option<ObjectAtClause>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    count: Option<CountClause>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    all: Option<Vec<GoalCondition>>,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ObjectAtClause {
    x: usize,
    y: usize,
    kind: ObjectKind,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct CountClause {
    kind: ObjectKind,
    exactly: usize,
}

impl TryFrom<GoalClause> for GoalCondition {
    type Error = String;

    fn try_from(clause: GoalClause) -> Result<Self, Self::Error> {
        match (clause.object_at, clause.count, clause.all) {
            (Some(ObjectAtClause { x, y, kind }), None, None) => {
                Ok(GoalCondition::ObjectAt { x, y, kind })
            }
            (None, Some(CountClause { kind, exactly }), None) => {
                Ok(GoalCondition::Count { kind, exactly })
            }
            (None, None, Some(goals)) => Ok(GoalCondition::All(goals)),
            _ => Err(
                "a goal clause needs exactly one of `object_at`, `count` or `all`".to_string(),
            ),
        }
    }
}

impl From<GoalCondition> for GoalClause {
    fn from(goal: GoalCondition) -> Self {
        let mut clause = GoalClause {
            object_at: None,
            count: None,
            all: None,
        };
        match goal {
            GoalCondition::ObjectAt { x, y, kind } => {
                clause.object_at = Some(ObjectAtClause { x, y, kind })
            }
            GoalCondition::Count { kind, exactly } => {
                clause.count = Some(CountClause { kind, exactly })
            }
            GoalCondition::All(goals) => clause.all = Some(goals),
        }
        clause
    }
}

impl fmt::Display for GoalCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GoalCondition::ObjectAt { x, y, kind } => write!(f, "{} at ({}, {})", kind, x, y),
            GoalCondition::Count { kind, exactly } => write!(f, "exactly {} {}", exactly, kind),
            GoalCondition::All(goals) => {
                if goals.is_empty() {
                    return write!(f, "anything");
                }
                for (i, goal) in goals.iter().enumerate() {
                    if i > 0 {
                        write!(f, " and ")?;
                    }
                    write!(f, "{}", goal)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Level;

    fn sample_state() -> GridState {
        Level::new(5, 5)
            .with_border_walls()
            .with(1, 1, ObjectKind::Player)
            .unwrap()
            .with(2, 2, ObjectKind::Crate)
            .unwrap()
            .initial_state()
    }

    #[test]
    fn test_object_at() {
        let state = sample_state();
        assert!(GoalCondition::object_at(1, 1, ObjectKind::Player).is_satisfied_by(&state));
        assert!(!GoalCondition::object_at(3, 3, ObjectKind::Player).is_satisfied_by(&state));
    }

    #[test]
    fn test_count_and_conjunction() {
        let state = sample_state();
        let goal = GoalCondition::all(vec![
            GoalCondition::count(ObjectKind::Crate, 1),
            GoalCondition::object_at(2, 2, ObjectKind::Crate),
        ]);
        assert!(goal.is_satisfied_by(&state));
        assert!(!GoalCondition::count(ObjectKind::Crate, 2).is_satisfied_by(&state));
    }

    #[test]
    fn test_validate_bounds() {
        assert!(GoalCondition::object_at(5, 0, ObjectKind::Player).validate(5, 5).is_err());
        assert!(GoalCondition::count(ObjectKind::Crate, 26).validate(5, 5).is_err());
        assert!(GoalCondition::object_at(4, 4, ObjectKind::Player).validate(5, 5).is_ok());
    }

    #[test]
    fn test_yaml_shape() {
        let yaml = "- object_at: {x: 3, y: 3, kind: player}\n- count: {kind: crate, exactly: 1}\n";
        let goals: Vec<GoalCondition> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(goals[0], GoalCondition::object_at(3, 3, ObjectKind::Player));
        assert_eq!(goals[1], GoalCondition::count(ObjectKind::Crate, 1));
    }

    #[test]
    fn test_yaml_round_trip_keeps_map_shape() {
        let goal = GoalCondition::all(vec![
            GoalCondition::object_at(5, 4, ObjectKind::Crate),
            GoalCondition::count(ObjectKind::Crate, 1),
        ]);
        let yaml = serde_yaml::to_string(&goal).unwrap();
        assert!(yaml.contains("object_at:"));
        assert!(!yaml.contains('!'));

        let parsed: GoalCondition = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, goal);

        let json = serde_json::to_string(&goal).unwrap();
        assert_eq!(serde_json::from_str::<GoalCondition>(&json).unwrap(), goal);
    }

    #[test]
    fn test_yaml_rejects_ambiguous_clause() {
        let both = "object_at: {x: 1, y: 1, kind: player}\ncount: {kind: crate, exactly: 1}\n";
        assert!(serde_yaml::from_str::<GoalCondition>(both).is_err());
        assert!(serde_yaml::from_str::<GoalCondition>("{}").is_err());
        assert!(serde_yaml::from_str::<GoalCondition>("near: {x: 1}").is_err());
    }
}
