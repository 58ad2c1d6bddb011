//! Data structures that must be filled with the input and the parameters for the dependency scan

use crate::common::{verify_dir, verify_file, LookupError};
use crate::format::BinaryFormat;
use crate::inspect::InspectorKind;
use fs_err as fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug)]
pub struct LookupTarget {
    /// Path to the target executable
    pub target_exe: PathBuf,
    /// Parent directory of target_exe, cached for performance purposes
    pub app_dir: PathBuf,
    /// Directory the dependencies are copied to
    pub target_dir: PathBuf,
    /// Additional library search path set by the user, in precedence order
    pub user_path: Vec<PathBuf>,
}

/// What to do when a dependency can't be found on the search path
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WalkMode {
    /// Record the failure and keep walking, so that every failure is reported at once
    #[default]
    Lenient,
    /// Abort the walk on the first unresolved dependency
    Strict,
}

#[derive(Clone, Debug, Default)]
pub struct LookupParameters {
    /// Only report the dependencies, don't copy anything
    pub dry_run: bool,
    /// Search the directory of the executable before anything else
    pub include_exe_dir: bool,
    /// Never overwrite files already present in the target directory
    pub no_clobber: bool,
    pub walk_mode: WalkMode,
}

/// User-supplied regular expressions, matched against the whole library name
#[derive(Clone, Debug, Default)]
pub struct PatternLists {
    /// Names that must never be resolved nor copied
    pub blacklist: Vec<String>,
    /// Names that must always be resolved and copied; takes precedence over any blacklist
    pub whitelist: Vec<String>,
}

/// Per-format system library directories, searched after the user ones
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SystemDirs {
    pub elf32: Vec<PathBuf>,
    pub elf64: Vec<PathBuf>,
    pub pe32: Vec<PathBuf>,
    pub pe64: Vec<PathBuf>,
}

impl Default for SystemDirs {
    fn default() -> Self {
        let dirs = |f: BinaryFormat| -> Vec<PathBuf> {
            f.traits().system_dirs.iter().map(PathBuf::from).collect()
        };
        Self {
            elf32: dirs(BinaryFormat::Elf32),
            elf64: dirs(BinaryFormat::Elf64),
            pe32: dirs(BinaryFormat::Pe32),
            pe64: dirs(BinaryFormat::Pe64),
        }
    }
}

impl SystemDirs {
    /// No system directory at all; only the user-specified ones are searched
    pub fn empty() -> Self {
        Self {
            elf32: Vec::new(),
            elf64: Vec::new(),
            pe32: Vec::new(),
            pe64: Vec::new(),
        }
    }

    pub fn for_format(&self, format: BinaryFormat) -> &[PathBuf] {
        match format {
            BinaryFormat::Elf32 => &self.elf32,
            BinaryFormat::Elf64 => &self.elf64,
            BinaryFormat::Pe32 => &self.pe32,
            BinaryFormat::Pe64 => &self.pe64,
        }
    }

    pub fn for_format_mut(&mut self, format: BinaryFormat) -> &mut Vec<PathBuf> {
        match format {
            BinaryFormat::Elf32 => &mut self.elf32,
            BinaryFormat::Elf64 => &mut self.elf64,
            BinaryFormat::Pe32 => &mut self.pe32,
            BinaryFormat::Pe64 => &mut self.pe64,
        }
    }
}

/// Everything needed to walk and bundle the dependencies of one executable
#[derive(Clone, Debug)]
pub struct LookupQuery {
    pub target: LookupTarget,
    pub parameters: LookupParameters,
    pub patterns: PatternLists,
    pub system_dirs: SystemDirs,
    pub inspector: InspectorKind,
}

impl LookupQuery {
    /// builds a query with sensible defaults
    ///
    /// The target directory will be set to the one containing the executable (i.e. the app_dir)
    pub fn deduce_from_executable_location<P: AsRef<Path>>(
        target_exe: P,
    ) -> Result<Self, LookupError> {
        verify_file(&target_exe)?;
        let target_exe = fs::canonicalize(target_exe.as_ref())?;
        let app_dir = target_exe
            .parent()
            .ok_or_else(|| {
                LookupError::ContextDeductionError(format!(
                    "Could not find application directory for given executable {}",
                    target_exe.display()
                ))
            })?
            .to_owned();
        Ok(Self {
            target: LookupTarget {
                target_exe,
                target_dir: app_dir.clone(),
                app_dir,
                user_path: Vec::new(),
            },
            parameters: LookupParameters::default(),
            patterns: PatternLists::default(),
            system_dirs: SystemDirs::default(),
            inspector: InspectorKind::default(),
        })
    }

    /// Copy the dependencies to this directory instead of the one of the executable
    pub fn set_target_dir<P: AsRef<Path>>(&mut self, dir: P) -> Result<(), LookupError> {
        verify_dir(&dir)?;
        self.target.target_dir = fs::canonicalize(dir.as_ref())?;
        Ok(())
    }

    /// Append a directory to the user search path
    pub fn add_search_dir<P: AsRef<Path>>(&mut self, dir: P) -> Result<(), LookupError> {
        verify_dir(&dir)?;
        self.target.user_path.push(fs::canonicalize(dir.as_ref())?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_query() -> Result<(), LookupError> {
        let dir = tempfile::tempdir()?;
        let exe_path = dir.path().join("app");
        fs::write(&exe_path, b"")?;

        let query = LookupQuery::deduce_from_executable_location(&exe_path)?;
        let canonical_dir = fs::canonicalize(dir.path())?;
        assert_eq!(query.target.app_dir, canonical_dir);
        assert_eq!(query.target.target_dir, canonical_dir);
        assert_eq!(query.target.target_exe, canonical_dir.join("app"));
        assert!(query.target.user_path.is_empty());
        assert!(!query.parameters.dry_run);
        assert!(!query.parameters.include_exe_dir);
        assert_eq!(query.parameters.walk_mode, WalkMode::Lenient);
        assert_eq!(query.inspector, InspectorKind::Goblin);
        assert_eq!(query.system_dirs, SystemDirs::default());
        Ok(())
    }

    #[test]
    fn reject_bad_paths() -> Result<(), LookupError> {
        let dir = tempfile::tempdir()?;
        assert!(matches!(
            LookupQuery::deduce_from_executable_location(dir.path().join("missing")),
            Err(LookupError::FileNotFound(_))
        ));
        assert!(matches!(
            LookupQuery::deduce_from_executable_location(dir.path()),
            Err(LookupError::NotAFile(_))
        ));

        let exe_path = dir.path().join("app");
        fs::write(&exe_path, b"")?;
        let mut query = LookupQuery::deduce_from_executable_location(&exe_path)?;
        assert!(matches!(
            query.set_target_dir(&exe_path),
            Err(LookupError::NotADirectory(_))
        ));
        assert!(matches!(
            query.add_search_dir(dir.path().join("nope")),
            Err(LookupError::DirectoryNotFound(_))
        ));
        Ok(())
    }

    #[test]
    fn search_dirs_keep_order() -> Result<(), LookupError> {
        let dir = tempfile::tempdir()?;
        let exe_path = dir.path().join("app");
        fs::write(&exe_path, b"")?;
        fs::create_dir(dir.path().join("b"))?;
        fs::create_dir(dir.path().join("a"))?;

        let mut query = LookupQuery::deduce_from_executable_location(&exe_path)?;
        query.add_search_dir(dir.path().join("b"))?;
        query.add_search_dir(dir.path().join("a"))?;
        let names: Vec<_> = query
            .target
            .user_path
            .iter()
            .map(|p| p.file_name().unwrap().to_owned())
            .collect();
        assert_eq!(names, vec!["b", "a"]);
        Ok(())
    }

    #[test]
    fn system_dirs_by_format() {
        let dirs = SystemDirs::default();
        assert_eq!(
            dirs.for_format(BinaryFormat::Pe64),
            &[PathBuf::from("/usr/x86_64-w64-mingw32/sys-root/mingw/bin/")]
        );
        assert_eq!(dirs.for_format(BinaryFormat::Elf64).len(), 3);
        assert!(SystemDirs::empty().for_format(BinaryFormat::Elf32).is_empty());
    }
}
