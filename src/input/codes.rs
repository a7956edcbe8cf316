//! Event code table: symbolic names <-> numeric codes
//!
//! The table is read from a text file of `NAME CODE` lines, for example
//!
//! ```text
//! # keys
//! KEY_VOLUMEDOWN 114
//! KEY_VOLUMEUP   115   # inline comment
//! SW_LID         0x00
//! ```
//!
//! Names starting with `SW_` are switch codes, everything else is a key code.
//! When several names share a code, the first one is used for display.

use super::{EventClass, EventCode};
use log::{debug, info};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type for loading the code table
#[derive(Debug, Error)]
pub enum CodeTableError {
    /// The table file could not be read
    #[error("cannot read event code table {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The file contained no usable `NAME CODE` line
    #[error("event code table {0} has no entries")]
    Empty(PathBuf),
}

/// Bidirectional mapping between symbolic event names and codes
#[derive(Debug, Clone, Default)]
pub struct EventCodeTable {
    by_name: HashMap<String, EventCode>,
    by_code: HashMap<EventCode, String>,
}

impl EventCodeTable {
    /// Load a table from a file. Nothing is kept on failure.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CodeTableError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| CodeTableError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let table = Self::parse(&contents);
        if table.is_empty() {
            return Err(CodeTableError::Empty(path.to_path_buf()));
        }

        info!("Loaded {} event names from {}", table.len(), path.display());
        Ok(table)
    }

    /// Build a table from file contents, skipping lines that don't parse
    pub fn parse(contents: &str) -> Self {
        let mut table = Self::default();

        for (index, line) in contents.lines().enumerate() {
            let line = strip_comment(line);
            let mut fields = line.split_whitespace();
            let (Some(name), Some(code)) = (fields.next(), fields.next()) else {
                if !line.trim().is_empty() {
                    debug!("code table line {}: expected NAME CODE", index + 1);
                }
                continue;
            };

            match parse_code(code) {
                Some(code) => table.insert(name, code),
                None => debug!("code table line {}: bad code {:?}", index + 1, code),
            }
        }

        table
    }

    /// Add one entry; the class follows from the name
    pub fn insert(&mut self, name: &str, code: u16) {
        let code = EventCode::new(EventClass::for_name(name), code);
        self.by_name.insert(name.to_string(), code);
        self.by_code.entry(code).or_insert_with(|| name.to_string());
    }

    /// Resolve a symbolic name
    pub fn resolve(&self, name: &str) -> Option<EventCode> {
        self.by_name.get(name).copied()
    }

    /// Display name of a code
    pub fn name_of(&self, code: EventCode) -> Option<&str> {
        self.by_code.get(&code).map(String::as_str)
    }

    /// Number of names in the table
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Everything before the first `#`
pub(crate) fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(pos) => &line[..pos],
        None => line,
    }
}

fn parse_code(text: &str) -> Option<u16> {
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "\
# media keys
KEY_VOLUMEDOWN 114
KEY_VOLUMEUP   115   # louder

KEY_MUTE 113
KEY_MIN_INTERESTING 113
SW_LID 0x00
BROKEN
KEY_BAD notanumber
";

    #[test]
    fn parse_resolves_names() {
        let table = EventCodeTable::parse(SAMPLE);
        assert_eq!(table.resolve("KEY_VOLUMEUP"), Some(EventCode::key(115)));
        assert_eq!(table.resolve("KEY_VOLUMEDOWN"), Some(EventCode::key(114)));
        assert_eq!(table.resolve("SW_LID"), Some(EventCode::switch(0)));
        assert_eq!(table.resolve("KEY_BAD"), None);
        assert_eq!(table.resolve("BROKEN"), None);
        assert_eq!(table.len(), 5);
    }

    #[test]
    fn name_of_prefers_first_alias() {
        let table = EventCodeTable::parse(SAMPLE);
        assert_eq!(table.name_of(EventCode::key(113)), Some("KEY_MUTE"));
        assert_eq!(table.resolve("KEY_MIN_INTERESTING"), Some(EventCode::key(113)));
    }

    #[test]
    fn name_of_respects_class() {
        let table = EventCodeTable::parse(SAMPLE);
        assert_eq!(table.name_of(EventCode::switch(0)), Some("SW_LID"));
        assert_eq!(table.name_of(EventCode::key(0)), None);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let table = EventCodeTable::load(file.path()).unwrap();
        assert_eq!(table.resolve("KEY_MUTE"), Some(EventCode::key(113)));
    }

    #[test]
    fn load_missing_file_fails() {
        let result = EventCodeTable::load("/nonexistent/evtrigger/codes");
        assert!(matches!(result, Err(CodeTableError::Io { .. })));
    }

    #[test]
    fn load_file_without_entries_fails() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"# nothing here\n\nJUNK\n").unwrap();

        let result = EventCodeTable::load(file.path());
        assert!(matches!(result, Err(CodeTableError::Empty(_))));
    }

    #[test]
    fn strip_comment_keeps_prefix() {
        assert_eq!(strip_comment("KEY_A 30 # note"), "KEY_A 30 ");
        assert_eq!(strip_comment("# all comment"), "");
        assert_eq!(strip_comment("KEY_A 30"), "KEY_A 30");
    }
}
