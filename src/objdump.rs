//! Inspection through the text output of `objdump -x`

use crate::common::LookupError;
use crate::format::{BinaryFormat, DependencyLine};
use crate::inspect::{Inspection, Inspector};
use std::path::{Path, PathBuf};
use std::process::Command;

/// objdump prints the format declaration within the first few lines
const HEADER_LINES: usize = 5;
const FORMAT_MARKER: &str = " file format ";

pub struct ObjdumpInspector {
    program: String,
}

impl ObjdumpInspector {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_owned(),
        }
    }

    fn run(&self, path: &Path) -> Result<String, LookupError> {
        log::debug!("running {} -x {}", self.program, path.display());
        let output = Command::new(&self.program)
            .arg("-x")
            .arg(path)
            .output()
            .map_err(|source| LookupError::InspectorNotFound {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LookupError::InspectorFailed {
                program: self.program.clone(),
                path: path.to_owned(),
                stderr: stderr.lines().next().unwrap_or("").trim().to_owned(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Inspector for ObjdumpInspector {
    fn inspect(&self, path: &Path) -> Result<Inspection, LookupError> {
        let output = self.run(path)?;
        parse_objdump_output(path, &output)
    }
}

/// Split `objdump -x` output into header and body, and read both
pub fn parse_objdump_output(path: &Path, output: &str) -> Result<Inspection, LookupError> {
    let mut lines = output.lines();
    let header: Vec<&str> = lines.by_ref().take(HEADER_LINES).collect();
    let format = detect_format(path, &header)?;
    let dependencies = extract_dependencies(lines, format)
        .map(str::to_owned)
        .collect();
    Ok(Inspection {
        format,
        dependencies,
    })
}

/// Find the format declaration among the header lines
///
/// The first declaration found decides; an unknown format string is an error, as is the
/// absence of any declaration.
pub fn detect_format(path: &Path, header: &[&str]) -> Result<BinaryFormat, LookupError> {
    let format_str = header
        .iter()
        .find_map(|l| l.split_once(FORMAT_MARKER))
        .map(|(_, f)| f.trim())
        .ok_or_else(|| LookupError::UndeterminedFormat {
            path: path.to_owned(),
        })?;

    match format_str {
        f if f.starts_with("elf32-") => Ok(BinaryFormat::Elf32),
        f if f.starts_with("elf64-") => Ok(BinaryFormat::Elf64),
        "pei-i386" => Ok(BinaryFormat::Pe32),
        "pei-x86-64" => Ok(BinaryFormat::Pe64),
        other => Err(LookupError::UnrecognizedFormat {
            format: other.to_owned(),
            path: PathBuf::from(path),
        }),
    }
}

/// Lazily yield the library names declared in the body of the output, in order of appearance
pub fn extract_dependencies<'a, I>(lines: I, format: BinaryFormat) -> impl Iterator<Item = &'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let rule = format.traits().dependency_line;
    lines.into_iter().filter_map(move |line| match rule {
        DependencyLine::LastToken(marker) if line.contains(marker) => {
            line.split_whitespace().last()
        }
        DependencyLine::AfterMarker(marker) => line
            .split_once(marker)
            .map(|(_, name)| name.trim())
            .filter(|name| !name.is_empty()),
        _ => None,
    })
}
