//! Fences and map-grid geometry.
//!
//! A fence is an immutable configuration entity describing a permitted
//! region for one team, plus a predicate over the current session deciding
//! whether the fence applies to the active map. Regions are expressed on
//! the map's reporting grid (`"A1"` through `"J10"`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::rcon::types::{DEFAULT_WORLD_EXTENT, SessionInfo, WorldPosition};

/// Number of grid cells per axis on the reporting grid.
pub const GRID_CELLS: u8 = 10;

// ============================================================================
// Grid
// ============================================================================

/// A cell on the map's reporting grid. Zero-based internally; displayed as
/// letter+number (`"B4"` = column 1, row 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Grid {
    pub column: u8,
    pub row: u8,
}

impl Grid {
    /// Projects a world position onto the session's reporting grid.
    ///
    /// The world is a square of `world_extent` metres centred on the
    /// origin, divided into [`GRID_CELLS`] cells per axis. Positions beyond
    /// the edge clamp to the border cells.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn project(position: &WorldPosition, session: &SessionInfo) -> Self {
        let extent = if session.world_extent > 0.0 {
            session.world_extent
        } else {
            DEFAULT_WORLD_EXTENT
        };
        let cell = extent / f64::from(GRID_CELLS);
        let half = extent / 2.0;
        let to_cell =
            |v: f64| ((v + half) / cell).floor().clamp(0.0, f64::from(GRID_CELLS - 1)) as u8;
        Self {
            column: to_cell(position.x),
            row: to_cell(position.y),
        }
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", char::from(b'A' + self.column), self.row + 1)
    }
}

// ============================================================================
// GridRect
// ============================================================================

/// An inclusive rectangular region of grid cells, parsed from `"A1"` or
/// `"A1-D4"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridRect {
    min: Grid,
    max: Grid,
}

impl GridRect {
    /// Creates a rectangle spanning the two cells, in either order.
    #[must_use]
    pub fn new(a: Grid, b: Grid) -> Self {
        Self {
            min: Grid {
                column: a.column.min(b.column),
                row: a.row.min(b.row),
            },
            max: Grid {
                column: a.column.max(b.column),
                row: a.row.max(b.row),
            },
        }
    }

    /// Whether the cell lies within the rectangle.
    #[must_use]
    pub const fn contains(&self, grid: Grid) -> bool {
        grid.column >= self.min.column
            && grid.column <= self.max.column
            && grid.row >= self.min.row
            && grid.row <= self.max.row
    }
}

fn parse_cell(input: &str) -> Result<Grid, ConfigError> {
    let invalid = |expected: &str| ConfigError::InvalidValue {
        field: "region".to_string(),
        value: input.to_string(),
        expected: expected.to_string(),
    };

    let mut chars = input.chars();
    let letter = chars
        .next()
        .filter(char::is_ascii_alphabetic)
        .ok_or_else(|| invalid("a grid cell like 'B4'"))?;
    let column = (letter.to_ascii_uppercase() as u32)
        .checked_sub(u32::from(b'A'))
        .and_then(|c| u8::try_from(c).ok())
        .filter(|c| *c < GRID_CELLS)
        .ok_or_else(|| invalid("a column letter between 'A' and 'J'"))?;

    let row: u8 = chars
        .as_str()
        .parse()
        .ok()
        .filter(|r| (1..=GRID_CELLS).contains(r))
        .ok_or_else(|| invalid("a row number between 1 and 10"))?;

    Ok(Grid {
        column,
        row: row - 1,
    })
}

impl FromStr for GridRect {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('-') {
            Some((a, b)) => Ok(Self::new(parse_cell(a.trim())?, parse_cell(b.trim())?)),
            None => {
                let cell = parse_cell(s.trim())?;
                Ok(Self::new(cell, cell))
            }
        }
    }
}

impl fmt::Display for GridRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min == self.max {
            write!(f, "{}", self.min)
        } else {
            write!(f, "{}-{}", self.min, self.max)
        }
    }
}

impl Serialize for GridRect {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for GridRect {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Fence
// ============================================================================

/// A permitted region for one team, applicable on matching maps.
///
/// Team affiliation is positional: a fence belongs to the side whose
/// configuration list it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Fence {
    /// The permitted region on the reporting grid.
    pub region: GridRect,

    /// Map matchers; empty means the fence applies to every map. A matcher
    /// matches when it is a case-insensitive substring of the map identifier.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub maps: Vec<String>,
}

impl Fence {
    /// Whether this fence applies to the session's current map.
    #[must_use]
    pub fn matches(&self, session: &SessionInfo) -> bool {
        if self.maps.is_empty() {
            return true;
        }
        let map = session.map_name.to_lowercase();
        self.maps.iter().any(|m| map.contains(&m.to_lowercase()))
    }

    /// Whether the grid cell lies within the permitted region.
    #[must_use]
    pub const fn includes(&self, grid: Grid) -> bool {
        self.region.contains(grid)
    }
}

/// Filters fences down to the subset applicable to the session's map.
#[must_use]
pub fn applicable(fences: &[Fence], session: &SessionInfo) -> Vec<Fence> {
    fences.iter().filter(|f| f.matches(session)).cloned().collect()
}

// ============================================================================
// Tests
// ============================================================================
