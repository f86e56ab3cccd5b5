//! ZIP package access for SpreadsheetML workbooks.
//!
//! [`Package`] owns the archive handle for the duration of an analysis. Entry
//! reads go through a mutex so a single handle can feed several worksheet
//! scans running on different threads; decompression is the only part that
//! holds the lock, XML parsing happens on the caller's side.

use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek};
use std::path::{Component, Path};

/// Local file header signature: `PK\x03\x04`.
const LOCAL_HEADER_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

/// End-of-central-directory signature, the first bytes of an empty archive.
const EMPTY_ARCHIVE_MAGIC: [u8; 4] = [0x50, 0x4B, 0x05, 0x06];

/// A relationship entry from a `.rels` part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    /// Relationship ID (e.g., "rId1")
    pub id: String,
    /// Relationship type URI
    pub rel_type: String,
    /// Target path (relative or absolute)
    pub target: String,
    /// Whether the target lives outside the package
    pub external: bool,
}

impl Relationship {
    /// The last segment of the type URI, e.g. `worksheet` or `sharedStrings`.
    ///
    /// Transitional and Strict documents use different URI prefixes for the
    /// same relationship kinds, so callers match on this suffix.
    pub fn kind(&self) -> &str {
        self.rel_type.rsplit('/').next().unwrap_or_default()
    }
}

/// Relationships parsed from one `.rels` part, in document order.
#[derive(Debug, Clone, Default)]
pub struct Relationships {
    entries: Vec<Relationship>,
    by_id: HashMap<String, usize>,
}

impl Relationships {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `.rels` part.
    pub fn parse(xml: &str, part: &str) -> Result<Self> {
        let mut rels = Relationships::new();
        if xml.trim().is_empty() {
            return Ok(rels);
        }

        let mut reader = quick_xml::Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        loop {
            match reader.read_event() {
                Ok(quick_xml::events::Event::Empty(e))
                | Ok(quick_xml::events::Event::Start(e))
                    if e.local_name().as_ref() == b"Relationship" =>
                {
                    let mut rel = Relationship {
                        id: String::new(),
                        rel_type: String::new(),
                        target: String::new(),
                        external: false,
                    };

                    for attr in e.attributes().flatten() {
                        let value = attr
                            .unescape_value()
                            .map_err(|err| Error::malformed(part, err))?;
                        match attr.key.as_ref() {
                            b"Id" => rel.id = value.into_owned(),
                            b"Type" => rel.rel_type = value.into_owned(),
                            b"Target" => rel.target = value.into_owned(),
                            b"TargetMode" => rel.external = value.eq_ignore_ascii_case("external"),
                            _ => {}
                        }
                    }

                    if !rel.id.is_empty() {
                        rels.add(rel);
                    }
                }
                Ok(quick_xml::events::Event::Eof) => break,
                Err(e) => return Err(Error::malformed(part, e)),
                _ => {}
            }
        }

        Ok(rels)
    }

    /// Get a relationship by ID.
    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.by_id.get(id).map(|&i| &self.entries[i])
    }

    /// First relationship whose type URI ends with `kind`.
    pub fn find_kind(&self, kind: &str) -> Option<&Relationship> {
        self.entries.iter().find(|r| r.kind() == kind)
    }

    /// Add a relationship. A repeated ID keeps the first occurrence.
    pub fn add(&mut self, rel: Relationship) {
        if self.by_id.contains_key(&rel.id) {
            return;
        }
        self.by_id.insert(rel.id.clone(), self.entries.len());
        self.entries.push(rel);
    }

    /// Number of relationships.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate in document order.
    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.entries.iter()
    }
}

/// Decode an XML part to a string, honouring UTF-8 and UTF-16 byte order marks.
///
/// After a UTF-16 part is decoded the declaration still names UTF-16, which
/// quick-xml would then try to honour; the declaration is rewritten to UTF-8.
pub fn decode_xml_bytes(bytes: &[u8]) -> Result<String> {
    let invalid = |e: std::string::FromUtf8Error| {
        Error::Io(io::Error::new(io::ErrorKind::InvalidData, e))
    };

    match bytes {
        [0xEF, 0xBB, 0xBF, rest @ ..] => String::from_utf8(rest.to_vec()).map_err(invalid),
        [0xFF, 0xFE, rest @ ..] => decode_utf16(rest, u16::from_le_bytes).map(declare_utf8),
        [0xFE, 0xFF, rest @ ..] => decode_utf16(rest, u16::from_be_bytes).map(declare_utf8),
        _ => match String::from_utf8(bytes.to_vec()) {
            Ok(s) => Ok(s),
            // ASCII markup in UTF-16 leaves every other byte zero
            Err(_) if bytes.len() >= 4 && bytes[1] == 0 && bytes[3] == 0 => {
                decode_utf16(bytes, u16::from_le_bytes).map(declare_utf8)
            }
            Err(_) if bytes.len() >= 4 && bytes[0] == 0 && bytes[2] == 0 => {
                decode_utf16(bytes, u16::from_be_bytes).map(declare_utf8)
            }
            Err(e) => Err(invalid(e)),
        },
    }
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> Result<String> {
    let units = bytes.chunks_exact(2).map(|pair| unit([pair[0], pair[1]]));
    char::decode_utf16(units)
        .collect::<std::result::Result<String, _>>()
        .map_err(|e| Error::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
}

fn declare_utf8(content: String) -> String {
    if !content.starts_with("<?xml") {
        return content;
    }
    let Some(end) = content.find("?>") else {
        return content;
    };
    let (decl, rest) = content.split_at(end);
    let decl = ["\"UTF-16\"", "'UTF-16'", "\"utf-16\"", "'utf-16'"]
        .iter()
        .fold(decl.to_string(), |d, from| d.replace(from, "\"UTF-8\""));
    format!("{decl}{rest}")
}

/// An opened workbook package.
///
/// Dropping the package releases the underlying file handle, on success and
/// error paths alike.
pub struct Package<R = BufReader<File>> {
    archive: Mutex<zip::ZipArchive<R>>,
    entries: Vec<String>,
}

impl Package<BufReader<File>> {
    /// Open a package from a file path.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use sheetscan::container::Package;
    ///
    /// let package = Package::open("budget.xlsx")?;
    /// println!("{} entries", package.list_entries().len());
    /// # Ok::<(), sheetscan::Error>(())
    /// ```
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::NotFound(path.to_path_buf()),
            _ => Error::Io(e),
        })?;
        if !file.metadata()?.is_file() {
            return Err(Error::InvalidArchive(format!(
                "{} is not a regular file",
                path.display()
            )));
        }
        log::debug!("opening package {}", path.display());
        Self::from_reader(BufReader::new(file))
    }
}

impl Package<Cursor<Vec<u8>>> {
    /// Create a package from an in-memory byte vector.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_reader(Cursor::new(data))
    }
}

impl<R: Read + Seek> Package<R> {
    /// Create a package from any seekable reader.
    pub fn from_reader(mut reader: R) -> Result<Self> {
        check_signature(&mut reader)?;

        let archive = zip::ZipArchive::new(reader).map_err(|e| match e {
            zip::result::ZipError::Io(io) => Error::InvalidArchive(io.to_string()),
            other => Error::InvalidArchive(other.to_string()),
        })?;
        let entries = archive.file_names().map(String::from).collect();

        Ok(Self {
            archive: Mutex::new(archive),
            entries,
        })
    }

    /// All entry names in central-directory order.
    pub fn list_entries(&self) -> &[String] {
        &self.entries
    }

    /// Check if an entry exists.
    pub fn contains(&self, name: &str) -> bool {
        self.locate(name).is_some()
    }

    /// Read the decompressed bytes of an entry.
    ///
    /// Lookup is exact first, then ASCII case-insensitive; some producers
    /// disagree with their own relationship targets about casing.
    pub fn read_entry(&self, name: &str) -> Result<Vec<u8>> {
        let stored = self
            .locate(name)
            .ok_or_else(|| Error::EntryNotFound(name.to_string()))?;

        let mut archive = self.archive.lock();
        let mut file = archive.by_name(stored).map_err(|e| match e {
            zip::result::ZipError::FileNotFound => Error::EntryNotFound(name.to_string()),
            other => Error::from(other),
        })?;

        let mut data = Vec::with_capacity(file.size().min(64 * 1024 * 1024) as usize);
        file.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Read an XML entry as a string.
    pub fn read_xml(&self, name: &str) -> Result<String> {
        let bytes = self.read_entry(name)?;
        decode_xml_bytes(&bytes)
    }

    /// Read an XML entry if it exists.
    pub fn read_xml_opt(&self, name: &str) -> Result<Option<String>> {
        match self.read_xml(name) {
            Ok(xml) => Ok(Some(xml)),
            Err(Error::EntryNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Relationships declared for `part_path` (`""` for the package itself).
    ///
    /// A missing `.rels` part yields an empty collection.
    pub fn read_relationships(&self, part_path: &str) -> Result<Relationships> {
        let rels_path = rels_path_for(part_path);
        match self.read_xml_opt(&rels_path)? {
            Some(xml) => Relationships::parse(&xml, &rels_path),
            None => Ok(Relationships::new()),
        }
    }

    fn locate(&self, name: &str) -> Option<&str> {
        let name = name.trim_start_matches('/');
        self.entries
            .iter()
            .find(|e| e.as_str() == name)
            .or_else(|| self.entries.iter().find(|e| e.eq_ignore_ascii_case(name)))
            .map(String::as_str)
    }
}

impl<R> std::fmt::Debug for Package<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Package")
            .field("entries", &self.entries.len())
            .finish()
    }
}

fn check_signature<R: Read + Seek>(reader: &mut R) -> Result<()> {
    let mut magic = [0u8; 4];
    let read = reader.read(&mut magic)?;
    reader.rewind()?;

    if read < 4 || (magic != LOCAL_HEADER_MAGIC && magic != EMPTY_ARCHIVE_MAGIC) {
        return Err(Error::InvalidArchive(
            "missing ZIP local file header signature".to_string(),
        ));
    }
    Ok(())
}

/// The `.rels` part holding relationships for `part_path`.
pub(crate) fn rels_path_for(part_path: &str) -> String {
    let part_path = part_path.trim_start_matches('/');
    if part_path.is_empty() {
        return "_rels/.rels".to_string();
    }
    match part_path.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part_path}.rels"),
    }
}

/// Resolve a relationship target against the directory of the part `base`.
pub fn resolve_path(base: &str, relative: &str) -> String {
    if let Some(absolute) = relative.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = match base.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').filter(|s| !s.is_empty()).collect(),
        None => Vec::new(),
    };
    for component in Path::new(relative).components() {
        match component {
            Component::ParentDir => {
                segments.pop();
            }
            Component::Normal(c) => segments.push(c.to_str().unwrap_or_default()),
            _ => {}
        }
    }
    segments.join("/")
}
