//! File I/O for levels
//!
//! Format: one line per row, one character per cell. `#` wall, `.` background,
//! `P` player, `C` crate, `T` target.

use super::{GridState, Level, ObjectKind};
use anyhow::{Context, Result};
use std::path::Path;

/// Load a level from a text file
pub fn load_level_from_file<P: AsRef<Path>>(path: P) -> Result<Level> {
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read level file: {}", path.as_ref().display()))?;

    parse_level_from_string(&content)
        .with_context(|| format!("Failed to parse level from file: {}", path.as_ref().display()))
}

/// Parse a level from its text representation
pub fn parse_level_from_string(content: &str) -> Result<Level> {
    let lines: Vec<&str> = content
        .lines()
        .map(|line| line.trim_end())
        .filter(|line| !line.is_empty())
        .collect();

    if lines.is_empty() {
        anyhow::bail!("Level is empty or contains no valid rows");
    }

    let height = lines.len();
    let width = lines[0].chars().count();

    let mut level = Level::new(width, height);
    for (y, line) in lines.iter().enumerate() {
        let row_len = line.chars().count();
        if row_len != width {
            anyhow::bail!(
                "Row {} has length {}, expected {} (all rows must have the same length)",
                y,
                row_len,
                width
            );
        }

        for (x, ch) in line.chars().enumerate() {
            let kind = ObjectKind::from_symbol(ch).with_context(|| {
                format!("Invalid character '{}' at position ({}, {})", ch, x, y)
            })?;
            if kind != ObjectKind::Background {
                level.set(x, y, kind)?;
            }
        }
    }

    Ok(level)
}

/// Save a level to a text file
pub fn save_level_to_file<P: AsRef<Path>>(level: &Level, path: P) -> Result<()> {
    let content = state_to_string(&level.initial_state());

    if let Some(parent) = path.as_ref().parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write level to file: {}", path.as_ref().display()))?;

    Ok(())
}

/// Render a snapshot in the level text format
pub fn state_to_string(state: &GridState) -> String {
    state.to_string()
}

/// Create example level files for testing
pub fn create_example_levels<P: AsRef<Path>>(output_dir: P) -> Result<()> {
    let dir = output_dir.as_ref();
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    // Player walks from (1,1) to (3,3)
    let walk = "#####\n#P..#\n#...#\n#...#\n#####\n";
    std::fs::write(dir.join("walk.txt"), walk).context("Failed to write walk.txt")?;

    // Crate at (3,2) pushed to (5,4)
    let push = "#######\n#.....#\n#.PC..#\n#.....#\n#.....#\n#.....#\n#######\n";
    std::fs::write(dir.join("push.txt"), push).context("Failed to write push.txt")?;

    // Player walled in
    let enclosed = "#######\n#.....#\n#..#..#\n#.#P#.#\n#..#..#\n#.....#\n#######\n";
    std::fs::write(dir.join("enclosed.txt"), enclosed).context("Failed to write enclosed.txt")?;

    Ok(())
}
