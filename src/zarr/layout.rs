use crate::utils::error::{HcsError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Multi-well plate format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum PlateLayout {
    #[default]
    I96,
    I384,
}

impl PlateLayout {
    pub fn well_count(&self) -> u32 {
        match self {
            PlateLayout::I96 => 96,
            PlateLayout::I384 => 384,
        }
    }

    fn row_count(&self) -> usize {
        match self {
            PlateLayout::I96 => 8,
            PlateLayout::I384 => 16,
        }
    }

    fn column_count(&self) -> usize {
        match self {
            PlateLayout::I96 => 12,
            PlateLayout::I384 => 24,
        }
    }

    /// Row names, `A` to `H` or `A` to `P`.
    pub fn rows(&self) -> Vec<String> {
        (b'A'..)
            .take(self.row_count())
            .map(|c| (c as char).to_string())
            .collect()
    }

    /// Column names, `1` to `12` or `1` to `24`.
    pub fn columns(&self) -> Vec<String> {
        (1..=self.column_count()).map(|c| c.to_string()).collect()
    }

    /// Position of a well id such as `C05` on this plate.
    pub fn well_position(&self, well: &str) -> Result<WellPosition> {
        let (row, column) = split_well(well)?;
        let out_of_layout = || HcsError::WellOutOfLayoutError {
            well: well.to_string(),
            layout: self.well_count(),
        };
        let row_index = self
            .rows()
            .iter()
            .position(|r| *r == row)
            .ok_or_else(out_of_layout)?;
        let column_index = self
            .columns()
            .iter()
            .position(|c| *c == column)
            .ok_or_else(out_of_layout)?;
        Ok(WellPosition {
            row,
            column,
            row_index,
            column_index,
        })
    }
}

impl TryFrom<u32> for PlateLayout {
    type Error = HcsError;

    fn try_from(wells: u32) -> Result<Self> {
        match wells {
            96 => Ok(PlateLayout::I96),
            384 => Ok(PlateLayout::I384),
            other => Err(HcsError::UnsupportedLayoutError(other.to_string())),
        }
    }
}

impl From<PlateLayout> for u32 {
    fn from(layout: PlateLayout) -> u32 {
        layout.well_count()
    }
}

impl FromStr for PlateLayout {
    type Err = HcsError;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<u32>()
            .map_err(|_| HcsError::UnsupportedLayoutError(s.to_string()))
            .and_then(PlateLayout::try_from)
    }
}

impl fmt::Display for PlateLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.well_count())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WellPosition {
    pub row: String,
    pub column: String,
    pub row_index: usize,
    pub column_index: usize,
}

impl WellPosition {
    /// Group path of the well inside the plate, e.g. `C/5`.
    pub fn path(&self) -> String {
        format!("{}/{}", self.row, self.column)
    }
}

/// Splits `C05` into row `C` and column `5`.
pub fn split_well(well: &str) -> Result<(String, String)> {
    let invalid = || HcsError::InvalidMetadataError {
        key: "well".to_string(),
        value: well.to_string(),
        reason: "expected a row letter followed by a column number".to_string(),
    };
    let split = well
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(invalid)?;
    let (row, column) = well.split_at(split);
    if row.is_empty() || !row.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(invalid());
    }
    let column: u32 = column.parse().map_err(|_| invalid())?;
    Ok((row.to_string(), column.to_string()))
}
