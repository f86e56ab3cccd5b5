//! Streaming worksheet scanner.
//!
//! A worksheet part is read event by event; no cell grid is built. The scan
//! keeps running row/column maxima, the formula list, and only as many cell
//! values as the preview needs.

use crate::cell::{CellRange, CellRef};
use crate::error::{Error, Result};
use crate::formula::{translate, FormulaKind, FormulaRecord};
use crate::report::{ScanWarning, SheetStatus, WorksheetSummary};
use crate::shared_strings::SharedStringTable;
use quick_xml::events::{BytesStart, Event};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

/// Bounds on the preview captured for display.
///
/// These only size `header_row` and `sample_rows`; extents and formulas
/// always cover the whole sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewLimits {
    /// Widest header/sample row kept
    pub max_columns: usize,
    /// Number of rows after the header kept as samples
    pub sample_rows: usize,
}

impl Default for PreviewLimits {
    fn default() -> Self {
        Self {
            max_columns: 20,
            sample_rows: 5,
        }
    }
}

impl PreviewLimits {
    /// Create limits with the defaults (20 columns, 5 sample rows).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the preview width.
    pub fn with_max_columns(mut self, max_columns: usize) -> Self {
        self.max_columns = max_columns;
        self
    }

    /// Set the number of sample rows.
    pub fn with_sample_rows(mut self, sample_rows: usize) -> Self {
        self.sample_rows = sample_rows;
        self
    }

    /// Last sheet row that belongs in the preview.
    fn last_preview_row(&self) -> u32 {
        u32::try_from(self.sample_rows)
            .unwrap_or(u32::MAX)
            .saturating_add(1)
    }
}

/// What a cell holds, decided once from its type attribute and children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellKind {
    /// `t="inlineStr"` with an `<is>` child
    InlineString(String),
    /// `t="s"`: index into the shared string table
    SharedString(usize),
    /// Cell with an `<f>` child
    Formula(FormulaRecord),
    /// Number, boolean, error, date or cached formula string
    Literal(String),
    /// No value at all
    Empty,
}

impl CellKind {
    /// Text shown for this cell.
    ///
    /// Formula cells show their formula. A shared-string index past the end
    /// of the table is an [`Error::BrokenStringReference`].
    pub fn display<'a>(
        &'a self,
        cell: CellRef,
        shared: &'a SharedStringTable,
    ) -> Result<Cow<'a, str>> {
        match self {
            CellKind::InlineString(s) | CellKind::Literal(s) => Ok(Cow::Borrowed(s)),
            CellKind::Formula(record) => Ok(Cow::Borrowed(&record.raw_formula_text)),
            CellKind::Empty => Ok(Cow::Borrowed("")),
            CellKind::SharedString(index) => {
                shared
                    .get(*index)
                    .map(Cow::Borrowed)
                    .ok_or_else(|| Error::BrokenStringReference {
                        cell: cell.to_string(),
                        index: *index,
                        len: shared.len(),
                    })
            }
        }
    }
}

/// Scan one worksheet part.
///
/// `part` names the archive entry for error messages.
///
/// # Errors
///
/// [`Error::MalformedXml`] when the part is not well-formed or a row/cell
/// reference cannot be parsed. Broken shared-string references are not
/// errors; they are recorded as warnings on the summary.
pub fn scan_worksheet(
    xml: &str,
    sheet_name: &str,
    part: &str,
    shared: &SharedStringTable,
    limits: &PreviewLimits,
) -> Result<WorksheetSummary> {
    let mut scan = Scan::new(sheet_name, shared, limits);
    let mut reader = quick_xml::Reader::from_str(xml);

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => scan.start(&e, false, part)?,
            Ok(Event::Empty(e)) => scan.start(&e, true, part)?,
            Ok(Event::Text(e)) => {
                if scan.capturing() {
                    let text = e.unescape().map_err(|err| Error::malformed(part, err))?;
                    scan.text(&text);
                }
            }
            Ok(Event::CData(e)) => {
                if scan.capturing() {
                    scan.text(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::End(e)) => scan.end(e.local_name().as_ref()),
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::malformed(part, e)),
            _ => {}
        }
    }

    let summary = scan.finish();
    log::debug!(
        "{sheet_name}: {} rows, {} cells, {} formulas, {} warnings",
        summary.row_count,
        summary.cell_count,
        summary.formulas.len(),
        summary.warnings.len()
    );
    Ok(summary)
}

/// Text sink currently receiving character data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capture {
    None,
    Value,
    Formula,
    Inline,
}

/// Attributes and text collected for the cell being read.
#[derive(Debug, Default)]
struct PendingCell {
    at: Option<CellRef>,
    cell_type: String,
    value: String,
    inline: Option<String>,
    formula: Option<PendingFormula>,
}

#[derive(Debug, Default)]
struct PendingFormula {
    kind: FormulaKind,
    group: Option<String>,
    text: String,
}

struct Scan<'a> {
    sheet_name: &'a str,
    shared: &'a SharedStringTable,
    limits: &'a PreviewLimits,

    current_row: u32,
    last_column: u32,
    row_has_cells: bool,
    cell: Option<PendingCell>,
    capture: Capture,
    in_inline: bool,
    phonetic_depth: usize,

    min: Option<CellRef>,
    max_row: u32,
    max_column: u32,
    row_count: usize,
    cell_count: usize,
    declared_dimension: Option<String>,
    preview: BTreeMap<u32, Vec<(u32, String)>>,
    formulas: Vec<FormulaRecord>,
    shared_groups: HashMap<String, (CellRef, String)>,
    warnings: Vec<ScanWarning>,
}

impl<'a> Scan<'a> {
    fn new(
        sheet_name: &'a str,
        shared: &'a SharedStringTable,
        limits: &'a PreviewLimits,
    ) -> Self {
        Self {
            sheet_name,
            shared,
            limits,
            current_row: 0,
            last_column: 0,
            row_has_cells: false,
            cell: None,
            capture: Capture::None,
            in_inline: false,
            phonetic_depth: 0,
            min: None,
            max_row: 0,
            max_column: 0,
            row_count: 0,
            cell_count: 0,
            declared_dimension: None,
            preview: BTreeMap::new(),
            formulas: Vec::new(),
            shared_groups: HashMap::new(),
            warnings: Vec::new(),
        }
    }

    fn capturing(&self) -> bool {
        self.capture != Capture::None
    }

    fn start(&mut self, e: &BytesStart<'_>, is_empty: bool, part: &str) -> Result<()> {
        match e.local_name().as_ref() {
            b"dimension" => {
                self.declared_dimension = attr(e, b"ref", part)?;
            }
            b"row" => {
                self.current_row = match attr(e, b"r", part)? {
                    Some(r) => parse_row(&r).ok_or_else(|| {
                        Error::malformed(part, format!("invalid row number '{r}'"))
                    })?,
                    None => self.current_row + 1,
                };
                self.last_column = 0;
                self.row_has_cells = false;
            }
            b"c" => {
                let at = match attr(e, b"r", part)? {
                    Some(r) => CellRef::parse(&r).map_err(|err| Error::malformed(part, err))?,
                    None => CellRef::new(self.current_row.max(1), self.last_column + 1),
                };
                self.last_column = at.column;
                let pending = PendingCell {
                    at: Some(at),
                    cell_type: attr(e, b"t", part)?.unwrap_or_default(),
                    ..Default::default()
                };
                if is_empty {
                    self.finish_cell(pending);
                } else {
                    self.cell = Some(pending);
                }
            }
            b"v" if self.cell.is_some() && !is_empty => self.capture = Capture::Value,
            b"f" => {
                if let Some(cell) = self.cell.as_mut() {
                    cell.formula = Some(PendingFormula {
                        kind: FormulaKind::from_attr(
                            attr(e, b"t", part)?.as_deref().unwrap_or_default(),
                        ),
                        group: attr(e, b"si", part)?,
                        text: String::new(),
                    });
                    if !is_empty {
                        self.capture = Capture::Formula;
                    }
                }
            }
            b"is" if self.cell.is_some() && !is_empty => {
                self.in_inline = true;
                if let Some(cell) = self.cell.as_mut() {
                    cell.inline.get_or_insert_with(String::new);
                }
            }
            b"rPh" if self.in_inline && !is_empty => self.phonetic_depth += 1,
            b"t" if self.in_inline && self.phonetic_depth == 0 && !is_empty => {
                self.capture = Capture::Inline;
            }
            _ => {}
        }
        Ok(())
    }

    fn text(&mut self, text: &str) {
        let Some(cell) = self.cell.as_mut() else {
            return;
        };
        match self.capture {
            Capture::Value => cell.value.push_str(text),
            Capture::Formula => {
                if let Some(f) = cell.formula.as_mut() {
                    f.text.push_str(text);
                }
            }
            Capture::Inline => {
                if let Some(s) = cell.inline.as_mut() {
                    s.push_str(text);
                }
            }
            Capture::None => {}
        }
    }

    fn end(&mut self, name: &[u8]) {
        match name {
            b"v" | b"f" | b"t" => self.capture = Capture::None,
            b"rPh" => self.phonetic_depth = self.phonetic_depth.saturating_sub(1),
            b"is" => self.in_inline = false,
            b"c" => {
                if let Some(pending) = self.cell.take() {
                    self.finish_cell(pending);
                }
                self.capture = Capture::None;
                self.in_inline = false;
            }
            b"row" => {
                if self.row_has_cells {
                    self.row_count += 1;
                }
            }
            _ => {}
        }
    }

    fn finish_cell(&mut self, pending: PendingCell) {
        let Some(at) = pending.at else {
            return;
        };

        self.cell_count += 1;
        self.row_has_cells = true;
        self.max_row = self.max_row.max(at.row);
        self.max_column = self.max_column.max(at.column);
        self.min = Some(match self.min {
            Some(min) => CellRef::new(min.row.min(at.row), min.column.min(at.column)),
            None => at,
        });

        let kind = self.classify(at, pending);
        if let CellKind::Formula(record) = &kind {
            self.formulas.push(record.clone());
        }

        if !self.in_preview(at) {
            return;
        }
        // broken references were reported by classify
        let shown = kind
            .display(at, self.shared)
            .map(Cow::into_owned)
            .unwrap_or_default();
        self.preview.entry(at.row).or_default().push((at.column, shown));
    }

    /// Decide the cell kind, recording warnings for unresolvable strings
    /// and shared formulas.
    fn classify(&mut self, at: CellRef, pending: PendingCell) -> CellKind {
        if let Some(formula) = pending.formula {
            return CellKind::Formula(self.formula_record(at, formula));
        }

        match pending.cell_type.as_str() {
            "s" => match pending.value.trim().parse::<usize>() {
                Ok(index) => {
                    let kind = CellKind::SharedString(index);
                    if let Err(err) = kind.display(at, self.shared) {
                        log::warn!("{}: {err}", self.sheet_name);
                        self.warnings.push(ScanWarning::BrokenStringReference {
                            cell: at,
                            index,
                            table_len: self.shared.len(),
                        });
                    }
                    kind
                }
                Err(_) => {
                    log::warn!(
                        "{}: {at} holds '{}' where a shared string index belongs",
                        self.sheet_name,
                        pending.value
                    );
                    self.warnings.push(ScanWarning::InvalidStringIndex {
                        cell: at,
                        raw: pending.value,
                    });
                    CellKind::Empty
                }
            },
            "inlineStr" => CellKind::InlineString(pending.inline.unwrap_or(pending.value)),
            "b" => CellKind::Literal(
                match pending.value.trim() {
                    "1" | "true" => "TRUE",
                    _ => "FALSE",
                }
                .to_string(),
            ),
            _ if pending.value.is_empty() => match pending.inline {
                Some(inline) => CellKind::InlineString(inline),
                None => CellKind::Empty,
            },
            _ => CellKind::Literal(pending.value),
        }
    }

    fn formula_record(&mut self, at: CellRef, formula: PendingFormula) -> FormulaRecord {
        if formula.kind != FormulaKind::Shared {
            return FormulaRecord::new(at, &formula.text, formula.kind);
        }

        let group = formula.group.unwrap_or_default();
        if !formula.text.is_empty() {
            self.shared_groups
                .insert(group, (at, formula.text.clone()));
            return FormulaRecord::new(at, &formula.text, FormulaKind::Shared);
        }

        match self.shared_groups.get(&group) {
            Some((anchor, text)) => {
                FormulaRecord::new(at, &translate(text, *anchor, at), FormulaKind::Shared)
            }
            None => {
                log::warn!(
                    "{}: {at}: shared formula group {group} has no anchor",
                    self.sheet_name
                );
                self.warnings.push(ScanWarning::UnresolvedSharedFormula { cell: at, group });
                FormulaRecord::new(at, "", FormulaKind::Shared)
            }
        }
    }

    fn in_preview(&self, at: CellRef) -> bool {
        at.row <= self.limits.last_preview_row()
            && usize::try_from(at.column).is_ok_and(|c| c <= self.limits.max_columns)
    }

    fn finish(self) -> WorksheetSummary {
        let width = (self.max_column as usize).min(self.limits.max_columns);
        let mut preview = self.preview;
        let mut row_values = |row: u32| -> Vec<String> {
            let mut values = vec![String::new(); width];
            for (column, text) in preview.remove(&row).unwrap_or_default() {
                if let Some(slot) = values.get_mut(column as usize - 1) {
                    *slot = text;
                }
            }
            values
        };

        let header_row = if self.max_row >= 1 { row_values(1) } else { Vec::new() };
        let last_sample = self.max_row.min(self.limits.last_preview_row());
        let sample_rows = (2..=last_sample).map(&mut row_values).collect();

        WorksheetSummary {
            sheet_name: self.sheet_name.to_string(),
            status: SheetStatus::Scanned,
            visibility: Default::default(),
            dimensions: self
                .min
                .map(|min| CellRange::new(min, CellRef::new(self.max_row, self.max_column))),
            declared_dimension: self.declared_dimension,
            max_row: self.max_row,
            max_column: self.max_column,
            row_count: self.row_count,
            cell_count: self.cell_count,
            header_row,
            sample_rows,
            formulas: self.formulas,
            warnings: self.warnings,
        }
    }
}

fn attr(e: &BytesStart<'_>, name: &[u8], part: &str) -> Result<Option<String>> {
    match e
        .try_get_attribute(name)
        .map_err(|err| Error::malformed(part, err))?
    {
        Some(a) => Ok(Some(
            a.unescape_value()
                .map_err(|err| Error::malformed(part, err))?
                .into_owned(),
        )),
        None => Ok(None),
    }
}

fn parse_row(r: &str) -> Option<u32> {
    r.trim()
        .parse::<u32>()
        .ok()
        .filter(|&row| (1..=crate::cell::MAX_ROW).contains(&row))
}
