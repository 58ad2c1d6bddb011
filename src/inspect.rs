//! Seam between the dependency walk and whatever reads the binaries

use crate::binary::GoblinInspector;
use crate::common::LookupError;
use crate::format::BinaryFormat;
use crate::objdump::ObjdumpInspector;
use std::path::Path;

/// What an inspector learned about a single binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inspection {
    pub format: BinaryFormat,
    /// Declared library names, in the order they appear in the file
    pub dependencies: Vec<String>,
}

/// Reads the format and the declared dependencies of a binary
///
/// Any error is fatal for the walk: a file whose format can't be determined can't be processed.
pub trait Inspector {
    fn inspect(&self, path: &Path) -> Result<Inspection, LookupError>;
}

/// Available inspection backends
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum InspectorKind {
    /// Parse the headers in-process
    #[default]
    Goblin,
    /// Run `objdump -x` with the given program and parse its output
    Objdump(String),
}

impl InspectorKind {
    pub fn build(&self) -> Box<dyn Inspector> {
        match self {
            Self::Goblin => Box::new(GoblinInspector),
            Self::Objdump(program) => Box::new(ObjdumpInspector::new(program)),
        }
    }
}
