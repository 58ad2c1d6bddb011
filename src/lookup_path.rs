use crate::common::LookupError;
use crate::format::BinaryFormat;
use crate::query::LookupQuery;
use fs_err as fs;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Directory to be searched, and relative metadata
#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub enum LookupPathEntry {
    /// Directory where the root executable sits
    ExecutableDir(PathBuf),
    /// Additional search directories specified by the user
    UserPath(PathBuf),
    /// Directory where the OS (or the cross toolchain) keeps its libraries
    SystemDir(PathBuf),
}

impl LookupPathEntry {
    pub fn is_system(&self) -> bool {
        matches!(self, Self::SystemDir(_))
    }

    pub fn get_path(&self) -> &Path {
        match self {
            Self::ExecutableDir(p) | Self::UserPath(p) | Self::SystemDir(p) => p,
        }
    }
}

/// Full location of a library found during lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupResult {
    pub location: LookupPathEntry,
    pub fullpath: PathBuf,
}

/// Sorted list of directories to be looked up when searching for a library
///
/// Precedence: executable directory (if enabled), then the user directories in the order
/// given, then the system directories of the format of the binary declaring the dependency.
pub struct LookupPath {
    prefix: Vec<LookupPathEntry>,
    system: HashMap<BinaryFormat, Vec<LookupPathEntry>>,
    fs_cache: RefCell<FileSystemCache>,
}

impl LookupPath {
    pub fn new(query: &LookupQuery) -> Self {
        let exe_dir_entry = if query.parameters.include_exe_dir {
            vec![LookupPathEntry::ExecutableDir(query.target.app_dir.clone())]
        } else {
            vec![]
        };
        let user_entries = query
            .target
            .user_path
            .iter()
            .map(|p| LookupPathEntry::UserPath(p.clone()))
            .collect::<Vec<_>>();

        let system = BinaryFormat::ALL
            .iter()
            .map(|&f| {
                let entries = query
                    .system_dirs
                    .for_format(f)
                    .iter()
                    .map(|p| LookupPathEntry::SystemDir(p.clone()))
                    .collect();
                (f, entries)
            })
            .collect();

        Self {
            prefix: [exe_dir_entry, user_entries].concat(),
            system,
            fs_cache: RefCell::new(FileSystemCache::new()),
        }
    }

    /// All the entries searched for a library declared by a binary of the given format, in order
    pub fn entries(&self, format: BinaryFormat) -> impl Iterator<Item = &LookupPathEntry> {
        self.prefix
            .iter()
            .chain(self.system.get(&format).into_iter().flatten())
    }

    // linearize the lookup path into a single vector of directories
    pub fn search_path(&self, format: BinaryFormat) -> Vec<PathBuf> {
        self.entries(format).map(|e| e.get_path().to_owned()).collect()
    }

    /// Look for a library by name; the first directory containing it as a regular file wins
    ///
    /// PE names are matched ignoring ASCII case, ELF names exactly. A name that is not a plain
    /// file name (absolute, or with directory components) is never found.
    pub fn search_library(
        &self,
        library: &str,
        format: BinaryFormat,
    ) -> Result<Option<LookupResult>, LookupError> {
        if !is_plain_file_name(library) {
            log::debug!("\"{library}\": not a plain file name");
            return Ok(None);
        }
        for e in self.entries(format) {
            let found = if format.traits().case_insensitive {
                self.fs_cache
                    .borrow_mut()
                    .test_file_in_folder_case_insensitive(library, e.get_path())?
            } else {
                Some(e.get_path().join(library)).filter(|p| p.is_file())
            };
            if let Some(fullpath) = found {
                return Ok(Some(LookupResult {
                    location: e.clone(),
                    fullpath,
                }));
            }
        }
        Ok(None)
    }
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

/// Caches the content of already scanned directories, to avoid repeated expensive filesystem access
pub(crate) struct FileSystemCache {
    files_in_dirs: HashMap<PathBuf, HashMap<String, PathBuf>>,
}

impl FileSystemCache {
    pub(crate) fn new() -> Self {
        Self {
            files_in_dirs: HashMap::new(),
        }
    }

    pub(crate) fn test_file_in_folder_case_insensitive(
        &mut self,
        filename: &str,
        folder: &Path,
    ) -> Result<Option<PathBuf>, LookupError> {
        if !self.files_in_dirs.contains_key(folder) {
            self.scan_folder(folder)?;
        }
        Ok(self
            .files_in_dirs
            .get(folder)
            .and_then(|dir| dir.get(&filename.to_ascii_lowercase()))
            .map(|actual| folder.join(actual)))
    }

    /// List the regular files in the folder; a missing folder is treated as empty
    pub(crate) fn scan_folder(&mut self, folder: &Path) -> Result<(), LookupError> {
        if let std::collections::hash_map::Entry::Vacant(e) =
            self.files_in_dirs.entry(folder.to_owned())
        {
            let matching_entries: HashMap<String, PathBuf> = match fs::read_dir(folder) {
                Ok(entries) => entries
                    .filter_map(|entry| entry.ok())
                    .filter(|entry| {
                        // follow symlinks, like the ELF lookup does
                        fs::metadata(entry.path()).map_or(false, |m| m.is_file())
                    })
                    .filter_map(|entry| {
                        entry
                            .file_name()
                            .to_str()
                            .map(|s| (s.to_ascii_lowercase(), entry.file_name().into()))
                    })
                    .collect(),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    log::debug!("skipping missing search directory {}", folder.display());
                    HashMap::new()
                }
                Err(err) => return Err(err.into()),
            };
            e.insert(matching_entries);
        }
        Ok(())
    }
}
