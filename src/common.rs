use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name used as prefix for every diagnostic message
pub const PROGRAM_NAME: &str = "depbundle";

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("File \"{}\" does not exist", .0.display())]
    FileNotFound(PathBuf),

    #[error("\"{}\" is not a regular file", .0.display())]
    NotAFile(PathBuf),

    #[error("Directory \"{}\" does not exist", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("\"{}\" is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("Error while processing {list} patterns: {source}")]
    InvalidPattern {
        list: &'static str,
        source: regex::Error,
    },

    #[error("could not run \"{program}\": {source}")]
    InspectorNotFound {
        program: String,
        source: std::io::Error,
    },

    #[error("\"{program}\" returned an error for \"{}\": {stderr}", .path.display())]
    InspectorFailed {
        program: String,
        path: PathBuf,
        stderr: String,
    },

    #[error("could not determine file format for \"{}\"", .path.display())]
    UndeterminedFormat { path: PathBuf },

    #[error("unrecognized file format \"{format}\" (file: \"{}\")", .path.display())]
    UnrecognizedFormat { format: String, path: PathBuf },

    #[error("File \"{}\" is an unsupported object type \"{kind}\"", .path.display())]
    UnsupportedObject { kind: String, path: PathBuf },

    #[error("Failed to parse file \"{}\": {source}", .path.display())]
    ParseError {
        path: PathBuf,
        source: goblin::error::Error,
    },

    #[error("failed to resolve \"{0}\"")]
    Unresolved(String),

    #[error("Lookup context building error: {0}")]
    ContextDeductionError(String),

    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error(transparent)]
    JSONError(#[from] serde_json::Error),
}

/// Path as a string, with any non UTF-8 sequence replaced
pub fn path_to_string<P: AsRef<Path>>(p: P) -> String {
    p.as_ref().to_string_lossy().into_owned()
}

/// Check that the path exists and is a regular file
pub fn verify_file<P: AsRef<Path>>(p: P) -> Result<(), LookupError> {
    let p = p.as_ref();
    if !p.exists() {
        return Err(LookupError::FileNotFound(p.to_owned()));
    }
    if !p.is_file() {
        return Err(LookupError::NotAFile(p.to_owned()));
    }
    Ok(())
}

/// Check that the path exists and is a directory
pub fn verify_dir<P: AsRef<Path>>(p: P) -> Result<(), LookupError> {
    let p = p.as_ref();
    if !p.exists() {
        return Err(LookupError::DirectoryNotFound(p.to_owned()));
    }
    if !p.is_dir() {
        return Err(LookupError::NotADirectory(p.to_owned()));
    }
    Ok(())
}
