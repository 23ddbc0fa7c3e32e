//! Closed vocabulary of cell contents

use crate::error::{PlanError, PlanResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a cell holds at one timestep. Every cell holds exactly one kind.
///
/// Codes are dense and stable: new kinds are appended, never reordered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    #[default]
    Background,
    Wall,
    Player,
    Crate,
    Target,
}

impl ObjectKind {
    /// Every kind in code order.
    pub const ALL: [ObjectKind; 5] = [
        ObjectKind::Background,
        ObjectKind::Wall,
        ObjectKind::Player,
        ObjectKind::Crate,
        ObjectKind::Target,
    ];

    /// Number of kinds, `K`.
    pub const COUNT: usize = Self::ALL.len();

    /// Integer code in `0..K`.
    #[inline]
    pub fn code(self) -> usize {
        self as usize
    }

    pub fn from_code(code: usize) -> PlanResult<Self> {
        Self::ALL
            .get(code)
            .copied()
            .ok_or_else(|| {
                PlanError::encoding(format!("object code {} outside 0..{}", code, Self::COUNT))
            })
    }

    /// Character used by the level text format.
    pub fn symbol(self) -> char {
        match self {
            ObjectKind::Background => '.',
            ObjectKind::Wall => '#',
            ObjectKind::Player => 'P',
            ObjectKind::Crate => 'C',
            ObjectKind::Target => 'T',
        }
    }

    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '.' | ' ' => Some(ObjectKind::Background),
            '#' => Some(ObjectKind::Wall),
            'P' | 'p' | '@' => Some(ObjectKind::Player),
            'C' | 'c' | '$' => Some(ObjectKind::Crate),
            'T' | 't' => Some(ObjectKind::Target),
            _ => None,
        }
    }

    /// Hex colour handed to external renderers.
    pub fn color(self) -> &'static str {
        match self {
            ObjectKind::Background => "#FFFFFF",
            ObjectKind::Wall => "#404040",
            ObjectKind::Player => "#1E90FF",
            ObjectKind::Crate => "#A0522D",
            ObjectKind::Target => "#32CD32",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectKind::Background => "background",
            ObjectKind::Wall => "wall",
            ObjectKind::Player => "player",
            ObjectKind::Crate => "crate",
            ObjectKind::Target => "target",
        };
        f.write_str(name)
    }
}
