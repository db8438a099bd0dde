//! Raw values collected by one parse: command line occurrences and the
//! config files that were read, in order.

use super::sources::dir_config_files;
use crate::ini::IniDocument;
use crate::opt::Opt;
use crate::{OsloError, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// `(group, dest)` of a registered option.
pub(crate) type OptKey = (String, String);

/// Where a raw file value was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FileHit {
    pub values: Vec<String>,
    /// Set when the value came from a deprecated `(group, name)`.
    pub deprecated: Option<(String, String)>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Namespace {
    /// Raw command line values.
    cli: BTreeMap<OptKey, Vec<String>>,
    /// Config files in the order they were read.
    files: Vec<(PathBuf, IniDocument)>,
    files_not_found: Vec<PathBuf>,
    files_permission_denied: Vec<PathBuf>,
}

impl Namespace {
    pub fn with_cli(cli: BTreeMap<OptKey, Vec<String>>) -> Self {
        Self {
            cli,
            ..Self::default()
        }
    }

    pub fn cli(&self) -> &BTreeMap<OptKey, Vec<String>> {
        &self.cli
    }

    pub fn cli_values(&self, key: &OptKey) -> Option<&[String]> {
        self.cli.get(key).map(Vec::as_slice)
    }

    /// Read and parse one config file.
    ///
    /// Missing and unreadable files are recorded, not raised, so that every
    /// problem can be reported at once.
    pub fn read_file(&mut self, path: &Path) -> Result<()> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                self.files_not_found.push(path.to_path_buf());
                return Ok(());
            }
            Err(err) if err.kind() == ErrorKind::PermissionDenied => {
                self.files_permission_denied.push(path.to_path_buf());
                return Ok(());
            }
            Err(source) => {
                return Err(OsloError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let document = IniDocument::parse(&text).map_err(|source| OsloError::ConfigFileParse {
            file: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(file = %path.display(), "parsed config file");
        self.files.push((path.to_path_buf(), document));
        Ok(())
    }

    /// Read every `*.conf` file of a directory.
    pub fn read_dir(&mut self, dir: &Path, must_exist: bool) -> Result<()> {
        if !dir.is_dir() {
            if must_exist {
                return Err(OsloError::ConfigDirNotFound {
                    dir: dir.to_path_buf(),
                });
            }
            return Ok(());
        }
        let files = dir_config_files(dir).map_err(|source| OsloError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        for file in files {
            self.read_file(&file)?;
        }
        Ok(())
    }

    /// Fail if any requested file was missing or unreadable.
    pub fn check_files(&self) -> Result<()> {
        if !self.files_not_found.is_empty() {
            return Err(OsloError::ConfigFilesNotFound {
                files: self.files_not_found.clone(),
            });
        }
        if !self.files_permission_denied.is_empty() {
            return Err(OsloError::ConfigFilesPermissionDenied {
                files: self.files_permission_denied.clone(),
            });
        }
        Ok(())
    }

    pub fn file_paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|(path, _)| path.clone()).collect()
    }

    /// Section names across every file, as written.
    pub fn sections(&self) -> BTreeSet<String> {
        self.files
            .iter()
            .flat_map(|(_, doc)| doc.section_names().map(str::to_string))
            .collect()
    }

    /// Every file folded into one document.
    pub fn merged(&self) -> IniDocument {
        let mut merged = IniDocument::default();
        for (_, doc) in &self.files {
            merged.merge(doc);
        }
        merged
    }

    /// Raw values of `key` in `section` across files.
    ///
    /// Multi options get every value of every file; others get the last.
    fn lookup(&self, section: &str, key: &str, multi: bool) -> Option<Vec<String>> {
        let mut found: Option<Vec<String>> = None;
        for (_, doc) in &self.files {
            if let Some(values) = doc.values(section, key) {
                if multi {
                    if let Some(acc) = found.as_mut() {
                        acc.extend(values.iter().cloned());
                        continue;
                    }
                }
                found = Some(values.to_vec());
            }
        }
        if multi {
            found
        } else {
            found.and_then(|values| values.last().cloned().map(|last| vec![last]))
        }
    }

    /// Raw file values for an option, trying deprecated names last.
    pub fn file_values(&self, group: &str, opt: &Opt) -> Option<FileHit> {
        let multi = opt.is_multi();
        let mut names = vec![opt.dest_name()];
        if opt.name() != opt.dest_name() {
            names.push(opt.name());
        }
        for name in names {
            if let Some(values) = self.lookup(group, name, multi) {
                return Some(FileHit {
                    values,
                    deprecated: None,
                });
            }
        }

        for old in opt.deprecated_opts() {
            let old_group = old.group.as_deref().unwrap_or(group);
            let old_name = old.name.as_deref().unwrap_or(opt.dest_name());
            if let Some(values) = self.lookup(old_group, old_name, multi) {
                return Some(FileHit {
                    values,
                    deprecated: Some((old_group.to_string(), old_name.to_string())),
                });
            }
        }
        None
    }
}

// =============================================================================
// TESTS
// =============================================================================
