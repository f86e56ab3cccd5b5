//! Formula records and shared-formula translation.
//!
//! Formula text is never evaluated. The only rewriting done here is for
//! shared formulas: SpreadsheetML stores the text once on the anchor cell
//! and leaves followers empty, so a follower's text is the anchor's with
//! every relative reference moved by the follower's offset.

use crate::cell::{column_name, split_column, CellRef, MAX_COLUMN, MAX_ROW};
use serde::{Deserialize, Serialize};

/// How a formula was stored in the worksheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FormulaKind {
    /// Ordinary cell formula
    #[default]
    Normal,
    /// Member of a shared-formula group
    Shared,
    /// Array (CSE) formula
    Array,
    /// What-if data table
    DataTable,
}

impl FormulaKind {
    /// Parse the `t` attribute of `<f>`.
    pub fn from_attr(value: &str) -> Self {
        match value {
            "shared" => FormulaKind::Shared,
            "array" => FormulaKind::Array,
            "dataTable" => FormulaKind::DataTable,
            _ => FormulaKind::Normal,
        }
    }
}

/// A formula found in a worksheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulaRecord {
    /// Cell holding the formula
    pub coordinate: CellRef,
    /// Formula text as shown in the formula bar, with its leading `=`
    pub raw_formula_text: String,
    /// Storage kind
    #[serde(default)]
    pub kind: FormulaKind,
}

impl FormulaRecord {
    /// Build a record from the text stored in `<f>`, which has no `=`.
    ///
    /// Empty stored text (a data-table cell, an unresolved shared follower)
    /// stays empty.
    pub fn new(coordinate: CellRef, stored_text: &str, kind: FormulaKind) -> Self {
        let raw_formula_text = if stored_text.is_empty() || stored_text.starts_with('=') {
            stored_text.to_string()
        } else {
            format!("={stored_text}")
        };
        Self {
            coordinate,
            raw_formula_text,
            kind,
        }
    }
}

/// Move every relative A1 reference in `formula` by the offset from
/// `anchor` to `target`.
///
/// Single cells, cell ranges and whole-column or whole-row ranges (`A:C`,
/// `3:5`) are moved. `$`-anchored rows and columns stay put. String literals
/// and quoted sheet names are copied untouched. A reference pushed off the
/// grid becomes `#REF!`, as Excel does; for a range the whole range does.
pub fn translate(formula: &str, anchor: CellRef, target: CellRef) -> String {
    let row_delta = i64::from(target.row) - i64::from(anchor.row);
    let col_delta = i64::from(target.column) - i64::from(anchor.column);
    if row_delta == 0 && col_delta == 0 {
        return formula.to_string();
    }

    let chars: Vec<char> = formula.chars().collect();
    let mut out = String::with_capacity(formula.len() + 8);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' | '\'' => {
                let end = quoted_end(&chars, i);
                out.extend(&chars[i..end]);
                i = end;
            }
            c if is_token_char(c) => {
                let end = token_end(&chars, i);
                let token: String = chars[i..end].iter().collect();
                if chars.get(end) == Some(&'(') {
                    out.push_str(&token);
                    i = end;
                    continue;
                }

                if let Some((range, range_end)) = range_at(&chars, &token, end) {
                    out.push_str(&range.shift(row_delta, col_delta));
                    i = range_end;
                    continue;
                }

                match Bound::parse(&token) {
                    Some(cell @ Bound::Cell(_)) => {
                        out.push_str(&cell.shift(row_delta, col_delta).unwrap_or_else(ref_error))
                    }
                    _ => out.push_str(&token),
                }
                i = end;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

/// Index one past the closing quote of a literal starting at `start`.
/// A doubled quote inside the literal is an escaped quote.
fn quoted_end(chars: &[char], start: usize) -> usize {
    let quote = chars[start];
    let mut i = start + 1;
    while i < chars.len() {
        if chars[i] == quote {
            if chars.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    chars.len()
}

fn is_token_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '\\' | '$')
}

fn token_end(chars: &[char], start: usize) -> usize {
    let mut end = start;
    while end < chars.len() && is_token_char(chars[end]) {
        end += 1;
    }
    end
}

fn ref_error() -> String {
    "#REF!".to_string()
}

/// A `first:last` pair starting with `first`, whose text ends at `end`.
/// Returns the range and the index just past it.
fn range_at(chars: &[char], first: &str, end: usize) -> Option<(Range, usize)> {
    if chars.get(end) != Some(&':') {
        return None;
    }
    let second_end = token_end(chars, end + 1);
    if second_end == end + 1 || chars.get(second_end) == Some(&'(') {
        return None;
    }
    let second: String = chars[end + 1..second_end].iter().collect();
    let range = Range {
        first: Bound::parse(first)?,
        last: Bound::parse(&second)?,
    };
    range.is_consistent().then_some((range, second_end))
}

/// Two bounds of the same shape joined by `:`.
struct Range {
    first: Bound,
    last: Bound,
}

impl Range {
    fn is_consistent(&self) -> bool {
        matches!(
            (&self.first, &self.last),
            (Bound::Cell(_), Bound::Cell(_))
                | (Bound::Column { .. }, Bound::Column { .. })
                | (Bound::Row { .. }, Bound::Row { .. })
        )
    }

    fn shift(&self, row_delta: i64, col_delta: i64) -> String {
        match (
            self.first.shift(row_delta, col_delta),
            self.last.shift(row_delta, col_delta),
        ) {
            (Some(first), Some(last)) => format!("{first}:{last}"),
            _ => ref_error(),
        }
    }
}

/// One end of a reference: a cell, a bare column, or a bare row.
///
/// Bare columns and rows only count as references inside a range; on their
/// own they are names or numbers.
enum Bound {
    Cell(Reference),
    Column { index: u32, fixed: bool },
    Row { index: u32, fixed: bool },
}

impl Bound {
    fn parse(token: &str) -> Option<Self> {
        if let Some(cell) = Reference::parse(token) {
            return Some(Bound::Cell(cell));
        }
        let (fixed, rest) = match token.strip_prefix('$') {
            Some(rest) => (true, rest),
            None => (false, token),
        };
        if let Some((index, "")) = split_column(rest) {
            return Some(Bound::Column { index, fixed });
        }
        parse_row(rest).map(|index| Bound::Row { index, fixed })
    }

    /// Shifted text, or `None` when the result leaves the grid.
    fn shift(&self, row_delta: i64, col_delta: i64) -> Option<String> {
        match self {
            Bound::Cell(cell) => cell.shift(row_delta, col_delta),
            Bound::Column { index, fixed } => {
                let index = moved(*index, *fixed, col_delta, MAX_COLUMN)?;
                Some(format!("{}{}", dollar(*fixed), column_name(index)))
            }
            Bound::Row { index, fixed } => {
                let index = moved(*index, *fixed, row_delta, MAX_ROW)?;
                Some(format!("{}{}", dollar(*fixed), index))
            }
        }
    }
}

fn dollar(fixed: bool) -> &'static str {
    if fixed {
        "$"
    } else {
        ""
    }
}

/// Apply `delta` unless `fixed`, keeping the result within `1..=max`.
fn moved(index: u32, fixed: bool, delta: i64, max: u32) -> Option<u32> {
    if fixed {
        return Some(index);
    }
    let shifted = i64::from(index) + delta;
    if (1..=i64::from(max)).contains(&shifted) {
        u32::try_from(shifted).ok()
    } else {
        None
    }
}

fn parse_row(digits: &str) -> Option<u32> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let row: u32 = digits.parse().ok()?;
    (1..=MAX_ROW).contains(&row).then_some(row)
}

/// A single-cell reference with its anchoring flags.
struct Reference {
    column: u32,
    row: u32,
    column_fixed: bool,
    row_fixed: bool,
}

impl Reference {
    fn parse(token: &str) -> Option<Self> {
        let (column_fixed, rest) = match token.strip_prefix('$') {
            Some(rest) => (true, rest),
            None => (false, token),
        };
        let (column, rest) = split_column(rest)?;
        let (row_fixed, digits) = match rest.strip_prefix('$') {
            Some(digits) => (true, digits),
            None => (false, rest),
        };
        Some(Self {
            column,
            row: parse_row(digits)?,
            column_fixed,
            row_fixed,
        })
    }

    fn shift(&self, row_delta: i64, col_delta: i64) -> Option<String> {
        let column = moved(self.column, self.column_fixed, col_delta, MAX_COLUMN)?;
        let row = moved(self.row, self.row_fixed, row_delta, MAX_ROW)?;
        Some(format!(
            "{}{}{}{}",
            dollar(self.column_fixed),
            column_name(column),
            dollar(self.row_fixed),
            row
        ))
    }
}
