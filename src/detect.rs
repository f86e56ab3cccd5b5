//! Package flavour detection from `[Content_Types].xml`.

use crate::container::Package;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::{Read, Seek};

/// Location of the content types part.
pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

const WORKBOOK_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml";
const TEMPLATE_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.template.main+xml";
const MACRO_WORKBOOK_CONTENT_TYPE: &str = "application/vnd.ms-excel.sheet.macroEnabled.main+xml";
const MACRO_TEMPLATE_CONTENT_TYPE: &str =
    "application/vnd.ms-excel.template.macroEnabled.main+xml";

/// Kind of spreadsheet package, as declared by its workbook content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PackageKind {
    /// Regular workbook (.xlsx)
    Workbook,
    /// Macro-enabled workbook (.xlsm)
    MacroEnabledWorkbook,
    /// Template (.xltx)
    Template,
    /// Macro-enabled template (.xltm)
    MacroEnabledTemplate,
    /// No content types part, or no recognizable workbook override
    #[default]
    Unknown,
}

impl PackageKind {
    /// Returns the conventional file extension for this kind.
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            PackageKind::Workbook => Some("xlsx"),
            PackageKind::MacroEnabledWorkbook => Some("xlsm"),
            PackageKind::Template => Some("xltx"),
            PackageKind::MacroEnabledTemplate => Some("xltm"),
            PackageKind::Unknown => None,
        }
    }

    fn from_content_type(content_type: &str) -> Option<Self> {
        match content_type {
            WORKBOOK_CONTENT_TYPE => Some(PackageKind::Workbook),
            MACRO_WORKBOOK_CONTENT_TYPE => Some(PackageKind::MacroEnabledWorkbook),
            TEMPLATE_CONTENT_TYPE => Some(PackageKind::Template),
            MACRO_TEMPLATE_CONTENT_TYPE => Some(PackageKind::MacroEnabledTemplate),
            _ => None,
        }
    }
}

impl std::fmt::Display for PackageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PackageKind::Workbook => "Excel Workbook",
            PackageKind::MacroEnabledWorkbook => "Excel Macro-Enabled Workbook",
            PackageKind::Template => "Excel Template",
            PackageKind::MacroEnabledTemplate => "Excel Macro-Enabled Template",
            PackageKind::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// Classify a package from its content types part.
///
/// A package without `[Content_Types].xml` is still analyzed; it is
/// reported as [`PackageKind::Unknown`].
pub fn detect_package_kind<R: Read + Seek>(package: &Package<R>) -> Result<PackageKind> {
    match package.read_xml_opt(CONTENT_TYPES_PART)? {
        Some(xml) => parse_content_types(&xml),
        None => Ok(PackageKind::Unknown),
    }
}

/// Find the workbook content type among the `Override` entries.
pub fn parse_content_types(xml: &str) -> Result<PackageKind> {
    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(quick_xml::events::Event::Empty(e)) | Ok(quick_xml::events::Event::Start(e))
                if e.local_name().as_ref() == b"Override" =>
            {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"ContentType" {
                        let value = attr
                            .unescape_value()
                            .map_err(|err| Error::malformed(CONTENT_TYPES_PART, err))?;
                        if let Some(kind) = PackageKind::from_content_type(&value) {
                            return Ok(kind);
                        }
                    }
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(Error::malformed(CONTENT_TYPES_PART, e)),
            _ => {}
        }
    }

    Ok(PackageKind::Unknown)
}
