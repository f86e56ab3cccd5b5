//! Cell coordinates and ranges in A1 notation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest column SpreadsheetML allows (`XFD`).
pub const MAX_COLUMN: u32 = 16_384;

/// Largest row SpreadsheetML allows.
pub const MAX_ROW: u32 = 1_048_576;

/// A 1-based cell coordinate.
///
/// Serializes as its A1 display form (`"B7"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellRef {
    /// Row number, starting at 1
    pub row: u32,
    /// Column number, starting at 1 (`A` = 1)
    pub column: u32,
}

/// Error returned when an A1 reference cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCellRefError(pub String);

impl fmt::Display for ParseCellRefError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid cell reference '{}'", self.0)
    }
}

impl std::error::Error for ParseCellRefError {}

impl CellRef {
    /// Create a coordinate. Both parts are 1-based.
    pub fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }

    /// Parse an A1 reference, tolerating `$` anchors (`$B$7`).
    pub fn parse(s: &str) -> Result<Self, ParseCellRefError> {
        let err = || ParseCellRefError(s.to_string());
        let (column, rest) = split_column(s.trim_start_matches('$')).ok_or_else(err)?;
        let rest = rest.strip_prefix('$').unwrap_or(rest);
        if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        let row: u32 = rest.parse().map_err(|_| err())?;
        if row == 0 || row > MAX_ROW {
            return Err(err());
        }
        Ok(Self { row, column })
    }

    /// The column letters (`A`, `Z`, `AA`, ...).
    pub fn column_name(&self) -> String {
        column_name(self.column)
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_name(self.column), self.row)
    }
}

impl FromStr for CellRef {
    type Err = ParseCellRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for CellRef {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CellRef {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        CellRef::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// A rectangular range between two corners, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRange {
    /// Top-left corner
    pub start: CellRef,
    /// Bottom-right corner
    pub end: CellRef,
}

impl CellRange {
    /// Create a range. Corners are normalized so `start` is top-left.
    pub fn new(a: CellRef, b: CellRef) -> Self {
        Self {
            start: CellRef::new(a.row.min(b.row), a.column.min(b.column)),
            end: CellRef::new(a.row.max(b.row), a.column.max(b.column)),
        }
    }

    /// Parse `A1:C3`, or a single cell `B2` as a one-cell range.
    pub fn parse(s: &str) -> Result<Self, ParseCellRefError> {
        match s.split_once(':') {
            Some((a, b)) => Ok(Self::new(CellRef::parse(a)?, CellRef::parse(b)?)),
            None => {
                let cell = CellRef::parse(s)?;
                Ok(Self::new(cell, cell))
            }
        }
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

impl Serialize for CellRange {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CellRange {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        CellRange::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Column letters for a 1-based column number.
pub fn column_name(mut column: u32) -> String {
    let mut letters = Vec::with_capacity(3);
    while column > 0 {
        let rem = (column - 1) % 26;
        letters.push(b'A' + rem as u8);
        column = (column - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Split leading column letters from `s`, returning the 1-based column.
pub(crate) fn split_column(s: &str) -> Option<(u32, &str)> {
    let letters = s.bytes().take_while(|b| b.is_ascii_alphabetic()).count();
    if letters == 0 || letters > 3 {
        return None;
    }
    let column = s[..letters].bytes().fold(0u32, |acc, b| {
        acc * 26 + u32::from(b.to_ascii_uppercase() - b'A' + 1)
    });
    if column > MAX_COLUMN {
        return None;
    }
    Some((column, &s[letters..]))
}
