//! Loading rule files into a fresh [`HandlerTable`]

use super::{parse_rules, HandlerTable};
use crate::input::EventCodeTable;
use log::{debug, info, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Error type for rule loading
#[derive(Debug, Error)]
pub enum RuleError {
    /// The rule path (file or directory) could not be read
    #[error("cannot read rules at {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// A single rule file could not be read
    #[error("cannot read rule file {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Whether a directory entry name is a rule file.
///
/// Only visible `*.conf` names count, so editor backups (`x.conf~`) and
/// package manager leftovers (`x.conf.dpkg-old`, `x.conf.rpmnew`) are never
/// loaded.
pub fn is_rule_file(name: &str) -> bool {
    !name.starts_with('.') && name.ends_with(".conf")
}

/// Reads a rule file or directory of rule files, resolving names through a
/// code table.
#[derive(Debug, Clone)]
pub struct RuleLoader {
    path: PathBuf,
    codes: Arc<EventCodeTable>,
}

impl RuleLoader {
    pub fn new(path: impl Into<PathBuf>, codes: Arc<EventCodeTable>) -> Self {
        Self {
            path: path.into(),
            codes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Build a new table from the configured path.
    ///
    /// Fails only if the path itself is unreadable. A rule file that cannot
    /// be read contributes nothing; bad lines inside a readable file are
    /// skipped with a warning.
    pub fn load(&self) -> Result<HandlerTable, RuleError> {
        let unreadable = |source| RuleError::Unreadable {
            path: self.path.clone(),
            source,
        };

        let files = if fs::metadata(&self.path).map_err(unreadable)?.is_dir() {
            self.rule_files().map_err(unreadable)?
        } else {
            vec![self.path.clone()]
        };

        let mut table = HandlerTable::new();
        let mut loaded_files = 0;
        for file in &files {
            match self.load_file(file, &mut table) {
                Ok(count) => {
                    debug!("{}: {} rules", file.display(), count);
                    loaded_files += 1;
                }
                Err(e) => warn!("{}", e),
            }
        }

        info!(
            "Loaded {} rules from {} file(s) in {}",
            table.len(),
            loaded_files,
            self.path.display()
        );
        Ok(table)
    }

    /// Parse one file and register its rules into `table`.
    ///
    /// Rules are only registered once the whole file has been read.
    pub fn load_file(&self, file: &Path, table: &mut HandlerTable) -> Result<usize, RuleError> {
        let contents = fs::read_to_string(file).map_err(|source| RuleError::File {
            path: file.to_path_buf(),
            source,
        })?;

        let rules = parse_rules(&contents, &self.codes, &file.display().to_string());
        let count = rules.len();
        table.extend(rules);
        Ok(count)
    }

    fn rule_files(&self) -> io::Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = fs::read_dir(&self.path)?
            .flatten()
            .filter(|entry| entry.file_type().map(|t| !t.is_dir()).unwrap_or(false))
            .filter(|entry| entry.file_name().to_str().is_some_and(is_rule_file))
            .map(|entry| entry.path())
            .collect();
        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::EventCode;

    fn codes() -> Arc<EventCodeTable> {
        Arc::new(EventCodeTable::parse(
            "KEY_VOLUMEUP 115\nKEY_VOLUMEDOWN 114\nKEY_SLEEP 142\n",
        ))
    }

    #[test]
    fn rule_file_names() {
        assert!(is_rule_file("audio.conf"));
        assert!(!is_rule_file("audio.conf~"));
        assert!(!is_rule_file(".audio.conf"));
        assert!(!is_rule_file("audio.conf.disabled"));
        assert!(!is_rule_file("audio.conf.dpkg-old"));
        assert!(!is_rule_file("audio.conf.rpmnew"));
        assert!(!is_rule_file("audio.bak"));
        assert!(!is_rule_file(".conf"));
        assert!(!is_rule_file("README"));
    }

    #[test]
    fn loads_directory_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("20-sleep.conf"), "KEY_SLEEP 1 second\n").unwrap();
        fs::write(dir.path().join("10-sleep.conf"), "KEY_SLEEP 1 first\n").unwrap();
        fs::write(dir.path().join("10-sleep.conf~"), "KEY_SLEEP 1 backup\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "KEY_SLEEP 1 notes\n").unwrap();

        let table = RuleLoader::new(dir.path(), codes()).load().unwrap();
        let rules = table.rules_for(EventCode::key(142));
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].command_line(), "first");
        assert_eq!(rules[1].command_line(), "second");
    }

    #[test]
    fn loads_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("rules.txt");
        fs::write(&file, "KEY_VOLUMEUP 1,2 up\nKEY_VOLUMEDOWN 1,2 down\n").unwrap();

        let table = RuleLoader::new(&file, codes()).load().unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn bad_line_does_not_drop_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("media.conf"),
            "KEY_VOLUMEUP 1 up\nKEY_UNKNOWN 1 nope\nKEY_VOLUMEDOWN 1 down\n",
        )
        .unwrap();

        let table = RuleLoader::new(dir.path(), codes()).load().unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn missing_path_is_an_error() {
        let result = RuleLoader::new("/nonexistent/evtrigger/rules.d", codes()).load();
        assert!(matches!(result, Err(RuleError::Unreadable { .. })));
    }

    #[test]
    fn empty_directory_gives_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let table = RuleLoader::new(dir.path(), codes()).load().unwrap();
        assert!(table.is_empty());
    }
}
