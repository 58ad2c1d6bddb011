//! Turns the result of a walk into a report or into files in the target directory

use crate::common::{LookupError, PROGRAM_NAME};
use crate::dependency::{Dependencies, Dependency, DependencyStatus};
use crate::query::LookupQuery;
use filetime::FileTime;
use fs_err as fs;
use std::io::Write;
use std::path::Path;

/// What happened to a single dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStatus {
    Blacklisted,
    ResolveError,
    /// The target directory already holds the library
    Skipped,
    Failed,
    Success,
}

/// Tally of a report or copy run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessingResult {
    pub failed_to_resolve: usize,
    pub failed_to_copy: usize,
    pub blacklisted: usize,
    pub skipped: usize,
    pub successful: usize,
}

impl ProcessingResult {
    fn record(&mut self, status: ProcessingStatus) {
        match status {
            ProcessingStatus::Blacklisted => self.blacklisted += 1,
            ProcessingStatus::ResolveError => self.failed_to_resolve += 1,
            ProcessingStatus::Skipped => self.skipped += 1,
            ProcessingStatus::Failed => self.failed_to_copy += 1,
            ProcessingStatus::Success => self.successful += 1,
        }
    }

    /// Every dependency that is not blacklisted was found and (when copying) copied
    pub fn is_success(&self) -> bool {
        self.failed_to_resolve == 0 && self.failed_to_copy == 0
    }

    /// One-line tally for the end of a run
    pub fn summary(&self, dry_run: bool) -> String {
        if dry_run {
            format!(
                "{} found, {} blacklisted, {} not found",
                self.successful, self.blacklisted, self.failed_to_resolve
            )
        } else {
            format!(
                "{} copied, {} already present, {} blacklisted, {} not found, {} failed to copy",
                self.successful,
                self.skipped,
                self.blacklisted,
                self.failed_to_resolve,
                self.failed_to_copy
            )
        }
    }
}

/// Processes the dependencies in discovery order, writing output lines and error lines to the
/// given streams
pub struct Bundler<'a, O: Write, E: Write> {
    query: &'a LookupQuery,
    out: O,
    err: E,
}

impl<'a, O: Write, E: Write> Bundler<'a, O, E> {
    pub fn new(query: &'a LookupQuery, out: O, err: E) -> Self {
        Self { query, out, err }
    }

    /// Copy or just report, depending on the dry-run setting of the query
    pub fn process(&mut self, deps: &Dependencies) -> Result<ProcessingResult, LookupError> {
        if self.query.parameters.dry_run {
            self.print_deps(deps)
        } else {
            self.copy_deps(deps)
        }
    }

    /// Print `"name": path` for every resolved library and `"name": (blacklisted)` for the
    /// blacklisted ones
    pub fn print_deps(&mut self, deps: &Dependencies) -> Result<ProcessingResult, LookupError> {
        let mut result = ProcessingResult::default();
        for dep in deps {
            let status = match &dep.status {
                DependencyStatus::Blacklisted => {
                    writeln!(self.out, "\"{}\": (blacklisted)", dep.name)?;
                    ProcessingStatus::Blacklisted
                }
                DependencyStatus::Resolved(path) => {
                    writeln!(self.out, "\"{}\": {}", dep.name, path.display())?;
                    ProcessingStatus::Success
                }
                DependencyStatus::Unresolved => self.report_unresolved(dep)?,
            };
            result.record(status);
        }
        Ok(result)
    }

    /// Copy every resolved library into the target directory
    ///
    /// A failing copy is reported and counted, and the remaining libraries are still processed.
    pub fn copy_deps(&mut self, deps: &Dependencies) -> Result<ProcessingResult, LookupError> {
        let mut result = ProcessingResult::default();
        for dep in deps {
            let status = match &dep.status {
                DependencyStatus::Blacklisted => {
                    log::info!("\"{}\": blacklisted, skipping", dep.name);
                    ProcessingStatus::Blacklisted
                }
                DependencyStatus::Unresolved => self.report_unresolved(dep)?,
                DependencyStatus::Resolved(source) => match self.copy_dep(&dep.name, source) {
                    Ok(status) => status,
                    Err(e) => {
                        writeln!(self.err, "{PROGRAM_NAME}: failed to copy \"{}\": {e}", dep.name)?;
                        ProcessingStatus::Failed
                    }
                },
            };
            result.record(status);
        }
        Ok(result)
    }

    fn report_unresolved(&mut self, dep: &Dependency) -> Result<ProcessingStatus, LookupError> {
        writeln!(self.err, "{PROGRAM_NAME}: failed to resolve \"{}\"", dep.name)?;
        Ok(ProcessingStatus::ResolveError)
    }

    fn copy_dep(&self, name: &str, source: &Path) -> Result<ProcessingStatus, LookupError> {
        let destination = self.query.target.target_dir.join(name);

        if destination.exists() {
            if self.query.parameters.no_clobber {
                log::info!(
                    "\"{name}\": already exists in the target directory and --no-clobber was specified"
                );
                return Ok(ProcessingStatus::Skipped);
            }
            // copying a file onto itself would truncate it
            if same_file::is_same_file(source, &destination)? {
                log::info!("\"{name}\": preferred version already present in target directory");
                return Ok(ProcessingStatus::Skipped);
            }
        }

        copy_preserving_mtime(source, &destination)?;
        log::info!(
            "\"{name}\": {} -> {}",
            source.display(),
            destination.display()
        );
        Ok(ProcessingStatus::Success)
    }
}

/// Duplicate the file and its modification time
pub fn copy_preserving_mtime(source: &Path, destination: &Path) -> Result<(), LookupError> {
    fs::copy(source, destination)?;
    let mtime = FileTime::from_last_modification_time(&fs::metadata(source)?);
    filetime::set_file_mtime(destination, mtime)?;
    Ok(())
}
