//! In-memory workbook builder shared by the integration tests.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

enum SheetPart {
    Worksheet(String),
    Chartsheet,
    Missing,
}

struct SheetEntry {
    name: String,
    state: Option<&'static str>,
    part: SheetPart,
}

/// Assembles a minimal but well-formed SpreadsheetML package.
pub struct WorkbookBuilder {
    sheets: Vec<SheetEntry>,
    shared_strings: Option<String>,
    manifest: bool,
    content_types: bool,
    namespace: &'static str,
}

impl Default for WorkbookBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkbookBuilder {
    pub fn new() -> Self {
        Self {
            sheets: Vec::new(),
            shared_strings: None,
            manifest: true,
            content_types: true,
            namespace: MAIN_NS,
        }
    }

    /// Add a worksheet whose `<sheetData>` holds `rows`.
    pub fn sheet(mut self, name: &str, rows: &str) -> Self {
        self.sheets.push(SheetEntry {
            name: name.to_string(),
            state: None,
            part: SheetPart::Worksheet(rows.to_string()),
        });
        self
    }

    /// Add a worksheet with a `state` attribute.
    pub fn sheet_with_state(mut self, name: &str, state: &'static str, rows: &str) -> Self {
        self.sheets.push(SheetEntry {
            name: name.to_string(),
            state: Some(state),
            part: SheetPart::Worksheet(rows.to_string()),
        });
        self
    }

    /// Add a chartsheet entry.
    pub fn chartsheet(mut self, name: &str) -> Self {
        self.sheets.push(SheetEntry {
            name: name.to_string(),
            state: None,
            part: SheetPart::Chartsheet,
        });
        self
    }

    /// Add a sheet whose relationship points at a part that is not in the archive.
    pub fn missing_sheet(mut self, name: &str) -> Self {
        self.sheets.push(SheetEntry {
            name: name.to_string(),
            state: None,
            part: SheetPart::Missing,
        });
        self
    }

    pub fn shared_strings(mut self, items: &[&str]) -> Self {
        let body: String = items.iter().map(|s| format!("<si><t>{s}</t></si>")).collect();
        self.shared_strings = Some(format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="{MAIN_NS}" count="{0}" uniqueCount="{0}">{body}</sst>"#,
            items.len()
        ));
        self
    }

    /// Store `xml` verbatim as the shared strings part.
    pub fn shared_strings_part(mut self, xml: &str) -> Self {
        self.shared_strings = Some(xml.to_string());
        self
    }

    pub fn without_manifest(mut self) -> Self {
        self.manifest = false;
        self
    }

    pub fn without_content_types(mut self) -> Self {
        self.content_types = false;
        self
    }

    pub fn namespace(mut self, namespace: &'static str) -> Self {
        self.namespace = namespace;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        let put = |zip: &mut ZipWriter<Cursor<Vec<u8>>>, name: &str, body: &str| {
            zip.start_file(name, options).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        };

        if self.content_types {
            put(
                &mut zip,
                "[Content_Types].xml",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
</Types>"#,
            );
        }

        put(
            &mut zip,
            "_rels/.rels",
            &format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="{REL_NS}/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#
            ),
        );

        let mut sheets_xml = String::new();
        let mut rels_xml = String::new();
        for (i, sheet) in self.sheets.iter().enumerate() {
            let n = i + 1;
            let state = sheet
                .state
                .map(|s| format!(r#" state="{s}""#))
                .unwrap_or_default();
            sheets_xml.push_str(&format!(
                r#"<sheet name="{}" sheetId="{n}"{state} r:id="rId{n}"/>"#,
                sheet.name
            ));
            let (kind, target) = match sheet.part {
                SheetPart::Chartsheet => ("chartsheet", format!("chartsheets/sheet{n}.xml")),
                _ => ("worksheet", format!("worksheets/sheet{n}.xml")),
            };
            rels_xml.push_str(&format!(
                r#"<Relationship Id="rId{n}" Type="{REL_NS}/{kind}" Target="{target}"/>"#
            ));
        }
        if self.shared_strings.is_some() {
            rels_xml.push_str(&format!(
                r#"<Relationship Id="rIdSst" Type="{REL_NS}/sharedStrings" Target="sharedStrings.xml"/>"#
            ));
        }

        if self.manifest {
            put(
                &mut zip,
                "xl/workbook.xml",
                &format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="{}" xmlns:r="{REL_NS}"><sheets>{sheets_xml}</sheets></workbook>"#,
                    self.namespace
                ),
            );
        }

        put(
            &mut zip,
            "xl/_rels/workbook.xml.rels",
            &format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{rels_xml}</Relationships>"#
            ),
        );

        if let Some(xml) = &self.shared_strings {
            put(&mut zip, "xl/sharedStrings.xml", xml);
        }

        for (i, sheet) in self.sheets.iter().enumerate() {
            let n = i + 1;
            match &sheet.part {
                SheetPart::Worksheet(rows) => put(
                    &mut zip,
                    &format!("xl/worksheets/sheet{n}.xml"),
                    &format!(
                        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="{MAIN_NS}"><sheetData>{rows}</sheetData></worksheet>"#
                    ),
                ),
                SheetPart::Chartsheet => put(
                    &mut zip,
                    &format!("xl/chartsheets/sheet{n}.xml"),
                    &format!(r#"<chartsheet xmlns="{MAIN_NS}"/>"#),
                ),
                SheetPart::Missing => {}
            }
        }

        zip.finish().unwrap().into_inner()
    }
}

/// A row of numeric cells starting at column A.
pub fn numeric_row(row: u32, values: &[i64]) -> String {
    let cells: String = values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let at = sheetscan::CellRef::new(row, i as u32 + 1);
            format!(r#"<c r="{at}"><v>{v}</v></c>"#)
        })
        .collect();
    format!(r#"<row r="{row}">{cells}</row>"#)
}
