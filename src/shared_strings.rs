//! Shared string table parsing.

use crate::error::{Error, Result};
use quick_xml::events::Event;
use serde::{Deserialize, Serialize};

/// Conventional location of the shared string part.
pub const DEFAULT_SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";

/// Shared strings table, addressed by 0-based index.
///
/// Never mutated after parsing, so worksheet scans on several threads can
/// share one table by reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SharedStringTable {
    strings: Vec<String>,
}

impl SharedStringTable {
    /// Parse the shared string part; an absent part yields an empty table.
    pub fn parse_opt(xml: Option<&str>, part: &str) -> Result<Self> {
        match xml {
            Some(xml) => Self::parse(xml, part),
            None => Ok(Self::default()),
        }
    }

    /// Parse shared strings from XML content.
    ///
    /// Each `<si>` item becomes one entry. Rich-text runs are concatenated;
    /// phonetic hints (`<rPh>`) are skipped. Whitespace inside `<t>` is kept
    /// as written.
    pub fn parse(xml: &str, part: &str) -> Result<Self> {
        let mut strings = Vec::new();
        let mut reader = quick_xml::Reader::from_str(xml);

        let mut in_si = false;
        let mut in_t = false;
        let mut phonetic_depth = 0usize;
        let mut current = String::new();

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => match e.local_name().as_ref() {
                    b"si" => {
                        in_si = true;
                        current.clear();
                    }
                    b"rPh" if in_si => phonetic_depth += 1,
                    b"t" if in_si && phonetic_depth == 0 => in_t = true,
                    _ => {}
                },
                Ok(Event::Empty(e)) if e.local_name().as_ref() == b"si" => {
                    strings.push(String::new());
                }
                Ok(Event::Text(e)) if in_t => {
                    let text = e.unescape().map_err(|err| Error::malformed(part, err))?;
                    current.push_str(&text);
                }
                Ok(Event::CData(e)) if in_t => {
                    current.push_str(&String::from_utf8_lossy(&e));
                }
                Ok(Event::End(e)) => match e.local_name().as_ref() {
                    b"si" => {
                        strings.push(std::mem::take(&mut current));
                        in_si = false;
                    }
                    b"rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                    b"t" => in_t = false,
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(Error::malformed(part, e)),
                _ => {}
            }
        }

        log::debug!("{part}: {} shared strings", strings.len());
        Ok(Self { strings })
    }

    /// Get a string by index.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.strings.get(index).map(String::as_str)
    }

    /// Get the count of shared strings.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl FromIterator<String> for SharedStringTable {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            strings: iter.into_iter().collect(),
        }
    }
}
