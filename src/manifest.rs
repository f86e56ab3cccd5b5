//! Workbook manifest (`xl/workbook.xml`) parsing.
//!
//! The manifest's `<sheet>` elements are the sheet inventory. Their document
//! order is the workbook's tab order and is kept as-is.

use crate::error::{Error, Result};
use quick_xml::events::{BytesStart, Event};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Conventional manifest location, used when the package relationships
/// do not name one.
pub const DEFAULT_MANIFEST_PART: &str = "xl/workbook.xml";

const TRANSITIONAL_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const STRICT_NS: &str = "http://purl.oclc.org/ooxml/spreadsheetml/main";

/// SpreadsheetML schema flavour declared by the manifest root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SchemaVersion {
    /// ECMA-376 transitional (what Excel writes by default)
    Transitional,
    /// ISO/IEC 29500 strict
    Strict,
}

impl SchemaVersion {
    /// Recognize a root namespace URI.
    pub fn from_namespace(ns: &str) -> Option<Self> {
        match ns {
            TRANSITIONAL_NS => Some(SchemaVersion::Transitional),
            STRICT_NS => Some(SchemaVersion::Strict),
            _ => None,
        }
    }

    /// The namespace URI for this version.
    pub fn namespace(&self) -> &'static str {
        match self {
            SchemaVersion::Transitional => TRANSITIONAL_NS,
            SchemaVersion::Strict => STRICT_NS,
        }
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaVersion::Transitional => f.write_str("transitional"),
            SchemaVersion::Strict => f.write_str("strict"),
        }
    }
}

/// Sheet tab visibility from the `state` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SheetVisibility {
    #[default]
    Visible,
    Hidden,
    VeryHidden,
}

/// One `<sheet>` entry of the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetDescriptor {
    /// Sheet tab name
    pub name: String,
    /// `sheetId` attribute, empty when absent
    pub sheet_id: String,
    /// `r:id` attribute linking to the worksheet part, empty when absent
    pub relationship_id: String,
    /// Position in the manifest, starting at 0
    pub declared_order: usize,
    /// Tab visibility
    #[serde(default)]
    pub visibility: SheetVisibility,
}

/// The parsed manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Schema flavour of the root element
    pub schema: SchemaVersion,
    /// Sheets in declared order
    pub sheets: Vec<SheetDescriptor>,
}

impl Manifest {
    /// Sheet names in declared order.
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }
}

/// Parse a workbook manifest.
///
/// `part` names the archive entry for error messages.
///
/// # Errors
///
/// - [`Error::MalformedXml`] for unparseable XML, a `<sheet>` without a
///   `name`, or a repeated sheet name or relationship id.
/// - [`Error::UnsupportedSchema`] when the root namespace is not a
///   recognized SpreadsheetML version.
pub fn parse_manifest(xml: &str, part: &str) -> Result<Manifest> {
    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut schema = None;
    let mut sheets = Vec::new();
    let mut in_sheets = false;
    let mut seen_names = HashSet::new();
    let mut seen_rel_ids = HashSet::new();

    loop {
        let (element, is_empty) = match reader.read_event() {
            Ok(Event::Start(e)) => (e, false),
            Ok(Event::Empty(e)) => (e, true),
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"sheets" {
                    in_sheets = false;
                }
                continue;
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::malformed(part, e)),
            _ => continue,
        };

        if schema.is_none() {
            schema = Some(root_schema(&element, part)?);
            continue;
        }

        match element.local_name().as_ref() {
            b"sheets" => in_sheets = !is_empty,
            b"sheet" if in_sheets => {
                let sheet = read_sheet(&element, sheets.len(), part)?;

                if !seen_names.insert(sheet.name.to_lowercase()) {
                    return Err(Error::malformed(
                        part,
                        format!("duplicate sheet name '{}'", sheet.name),
                    ));
                }
                if !sheet.relationship_id.is_empty()
                    && !seen_rel_ids.insert(sheet.relationship_id.clone())
                {
                    return Err(Error::malformed(
                        part,
                        format!("duplicate relationship id '{}'", sheet.relationship_id),
                    ));
                }

                sheets.push(sheet);
            }
            _ => {}
        }
    }

    let schema = schema.ok_or_else(|| Error::malformed(part, "document has no root element"))?;
    Ok(Manifest { schema, sheets })
}

/// Validate the root element and resolve its namespace.
fn root_schema(root: &BytesStart<'_>, part: &str) -> Result<SchemaVersion> {
    if root.local_name().as_ref() != b"workbook" {
        return Err(Error::malformed(
            part,
            format!(
                "root element is <{}>, expected <workbook>",
                String::from_utf8_lossy(root.name().as_ref())
            ),
        ));
    }

    let ns_attr = match root.name().prefix() {
        Some(prefix) => format!("xmlns:{}", String::from_utf8_lossy(prefix.as_ref())),
        None => "xmlns".to_string(),
    };

    let mut namespace = None;
    for attr in root.attributes().flatten() {
        if attr.key.as_ref() == ns_attr.as_bytes() {
            let value = attr.unescape_value().map_err(|e| Error::malformed(part, e))?;
            namespace = Some(value.into_owned());
        }
    }

    let namespace = namespace.unwrap_or_default();
    SchemaVersion::from_namespace(&namespace).ok_or_else(|| {
        Error::UnsupportedSchema(if namespace.is_empty() {
            "(no namespace)".to_string()
        } else {
            namespace
        })
    })
}

fn read_sheet(e: &BytesStart<'_>, declared_order: usize, part: &str) -> Result<SheetDescriptor> {
    let mut name = None;
    let mut sheet_id = String::new();
    let mut relationship_id = String::new();
    let mut visibility = SheetVisibility::Visible;

    for attr in e.attributes() {
        let attr = attr.map_err(|err| Error::malformed(part, err))?;
        let value = attr
            .unescape_value()
            .map_err(|err| Error::malformed(part, err))?
            .into_owned();

        match (attr.key.prefix(), attr.key.local_name().as_ref()) {
            (None, b"name") => name = Some(value),
            (None, b"sheetId") => sheet_id = value,
            (None, b"state") => {
                visibility = match value.as_str() {
                    "hidden" => SheetVisibility::Hidden,
                    "veryHidden" => SheetVisibility::VeryHidden,
                    _ => SheetVisibility::Visible,
                }
            }
            // r:id, whatever prefix the producer bound the relationships namespace to
            (Some(_), b"id") => relationship_id = value,
            _ => {}
        }
    }

    let name = name.ok_or_else(|| {
        Error::malformed(
            part,
            format!("sheet #{} has no name attribute", declared_order + 1),
        )
    })?;

    Ok(SheetDescriptor {
        name,
        sheet_id,
        relationship_id,
        declared_order,
        visibility,
    })
}
