//! Board coordinates, grid snapshots and the initial level

use super::ObjectKind;
use crate::error::{PlanError, PlanResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A coordinate inside `[0, width) x [0, height)`. `y` grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub x: usize,
    pub y: usize,
}

impl Cell {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    /// Shift by `(dx, dy)`, returning `None` when the result leaves the board.
    pub fn offset(self, dx: isize, dy: isize, width: usize, height: usize) -> Option<Cell> {
        let x = self.x as isize + dx;
        let y = self.y as isize + dy;
        if x >= 0 && y >= 0 && (x as usize) < width && (y as usize) < height {
            Some(Cell::new(x as usize, y as usize))
        } else {
            None
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A total mapping from every cell to an object kind, valid at one timestep.
///
/// Snapshots after `t = 0` are only produced by decoding a solver witness.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "GridStateWire")]
pub struct GridState {
    pub width: usize,
    pub height: usize,
    cells: Vec<ObjectKind>,
}

/// Unchecked form read from plan files
#[derive(Deserialize)]
struct GridStateWire {
    width: usize,
    height: usize,
    cells: Vec<ObjectKind>,
}

impl TryFrom<GridStateWire> for GridState {
    type Error = PlanError;

    fn try_from(wire: GridStateWire) -> PlanResult<Self> {
        GridState::from_kinds(wire.width, wire.height, wire.cells)
    }
}

impl GridState {
    pub(crate) fn from_kinds(
        width: usize,
        height: usize,
        cells: Vec<ObjectKind>,
    ) -> PlanResult<Self> {
        if cells.len() != width * height {
            return Err(PlanError::encoding(format!(
                "grid of {}x{} needs {} cells, got {}",
                width,
                height,
                width * height,
                cells.len()
            )));
        }
        Ok(Self { width, height, cells })
    }

    #[inline]
    fn index(&self, cell: Cell) -> usize {
        cell.y * self.width + cell.x
    }

    /// Overwrite one cell. Only rule application produces new snapshots.
    pub(crate) fn set(&mut self, cell: Cell, kind: ObjectKind) {
        let index = self.index(cell);
        self.cells[index] = kind;
    }

    pub fn contains(&self, cell: Cell) -> bool {
        cell.x < self.width && cell.y < self.height
    }

    /// Kind at `cell`, or `None` outside the board.
    pub fn get(&self, cell: Cell) -> Option<ObjectKind> {
        if self.contains(cell) {
            Some(self.cells[self.index(cell)])
        } else {
            None
        }
    }

    pub fn kind_at(&self, x: usize, y: usize) -> Option<ObjectKind> {
        self.get(Cell::new(x, y))
    }

    /// Iterate over `(cell, kind)` in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (Cell, ObjectKind)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, &kind)| (Cell::new(i % self.width, i / self.width), kind))
    }

    pub fn cells_with(&self, kind: ObjectKind) -> Vec<Cell> {
        self.iter().filter(|&(_, k)| k == kind).map(|(c, _)| c).collect()
    }

    pub fn count(&self, kind: ObjectKind) -> usize {
        self.cells.iter().filter(|&&k| k == kind).count()
    }

    /// Cells whose kind differs between `self` and `other`.
    pub fn diff(&self, other: &GridState) -> Vec<Cell> {
        self.iter()
            .zip(other.iter())
            .filter(|((_, a), (_, b))| a != b)
            .map(|((cell, _), _)| cell)
            .collect()
    }
}

impl fmt::Display for GridState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for y in 0..self.height {
            for x in 0..self.width {
                let kind = self.cells[y * self.width + x];
                write!(f, "{}", kind.symbol())?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// The initial layout: a concrete `(x, y) -> ObjectKind` map over a fixed board.
///
/// Cells that are never set hold `Background`. The caller places border walls,
/// the player and any crates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub width: usize,
    pub height: usize,
    placements: BTreeMap<Cell, ObjectKind>,
}

impl Level {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            placements: BTreeMap::new(),
        }
    }

    /// Place `kind` at `(x, y)`, replacing whatever was set before.
    pub fn set(&mut self, x: usize, y: usize, kind: ObjectKind) -> PlanResult<()> {
        if x >= self.width || y >= self.height {
            return Err(PlanError::configuration(format!(
                "cell ({}, {}) out of bounds for {}x{} board",
                x, y, self.width, self.height
            )));
        }
        self.placements.insert(Cell::new(x, y), kind);
        Ok(())
    }

    pub fn with(mut self, x: usize, y: usize, kind: ObjectKind) -> PlanResult<Self> {
        self.set(x, y, kind)?;
        Ok(self)
    }

    /// Put a wall on every boundary cell.
    pub fn with_border_walls(mut self) -> Self {
        for cell in boundary_cells(self.width, self.height) {
            self.placements.insert(cell, ObjectKind::Wall);
        }
        self
    }

    pub fn get(&self, cell: Cell) -> ObjectKind {
        self.placements.get(&cell).copied().unwrap_or_default()
    }

    /// Check the board invariants: non-empty, walled border.
    pub fn validate(&self) -> PlanResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(PlanError::configuration("board dimensions must be positive"));
        }
        if let Some(cell) = boundary_cells(self.width, self.height)
            .into_iter()
            .find(|&cell| self.get(cell) != ObjectKind::Wall)
        {
            return Err(PlanError::configuration(format!(
                "boundary cell {} holds {} instead of a wall",
                cell,
                self.get(cell)
            )));
        }
        Ok(())
    }

    /// The snapshot at `t = 0`.
    pub fn initial_state(&self) -> GridState {
        let cells = (0..self.height)
            .flat_map(|y| (0..self.width).map(move |x| Cell::new(x, y)))
            .map(|cell| self.get(cell))
            .collect();
        GridState {
            width: self.width,
            height: self.height,
            cells,
        }
    }
}

fn boundary_cells(width: usize, height: usize) -> Vec<Cell> {
    let mut cells = Vec::new();
    for y in 0..height {
        for x in 0..width {
            if x == 0 || y == 0 || x + 1 == width || y + 1 == height {
                cells.push(Cell::new(x, y));
            }
        }
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_respects_bounds() {
        let cell = Cell::new(0, 2);
        assert_eq!(cell.offset(1, 0, 3, 3), Some(Cell::new(1, 2)));
        assert_eq!(cell.offset(-1, 0, 3, 3), None);
        assert_eq!(cell.offset(0, 1, 3, 3), None);
    }

    #[test]
    fn test_level_defaults_to_background() {
        let level = Level::new(4, 3).with(1, 1, ObjectKind::Player).unwrap();
        let state = level.initial_state();
        assert_eq!(state.kind_at(1, 1), Some(ObjectKind::Player));
        assert_eq!(state.kind_at(2, 1), Some(ObjectKind::Background));
        assert_eq!(state.count(ObjectKind::Background), 11);
        assert_eq!(state.kind_at(4, 0), None);
    }

    #[test]
    fn test_level_rejects_out_of_bounds_placement() {
        let mut level = Level::new(3, 3);
        assert!(level.set(3, 0, ObjectKind::Crate).is_err());
    }

    #[test]
    fn test_border_validation() {
        let open = Level::new(4, 4);
        assert!(matches!(open.validate(), Err(PlanError::Configuration(_))));

        let walled = Level::new(4, 4).with_border_walls();
        assert!(walled.validate().is_ok());
        assert_eq!(walled.initial_state().count(ObjectKind::Wall), 12);
    }

    #[test]
    fn test_deserialize_checks_cell_count() {
        let state = Level::new(3, 2).with(1, 1, ObjectKind::Crate).unwrap().initial_state();
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(serde_json::from_str::<GridState>(&json).unwrap(), state);

        let truncated = r#"{"width":5,"height":5,"cells":["wall"]}"#;
        assert!(serde_json::from_str::<GridState>(truncated).is_err());
        let empty_row = r#"{"width":0,"height":3,"cells":["wall"]}"#;
        assert!(serde_json::from_str::<GridState>(empty_row).is_err());
    }

    #[test]
    fn test_diff_lists_changed_cells() {
        let a = Level::new(3, 1).with(0, 0, ObjectKind::Player).unwrap().initial_state();
        let b = Level::new(3, 1).with(1, 0, ObjectKind::Player).unwrap().initial_state();
        assert_eq!(a.diff(&b), vec![Cell::new(0, 0), Cell::new(1, 0)]);
    }

    #[test]
    fn test_display_uses_level_symbols() {
        let state = Level::new(3, 3)
            .with_border_walls()
            .with(1, 1, ObjectKind::Player)
            .unwrap()
            .initial_state();
        assert_eq!(state.to_string(), "###\n#P#\n###\n");
    }
}
