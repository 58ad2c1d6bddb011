//! In-process inspection of ELF and PE files through the goblin library

use crate::common::LookupError;
use crate::format::BinaryFormat;
use crate::inspect::{Inspection, Inspector};
use fs_err as fs;
use goblin::pe::header::{machine_to_str, COFF_MACHINE_X86, COFF_MACHINE_X86_64};
use std::path::Path;

/// Reads the dynamic section of ELF files and the import table of PE files
pub struct GoblinInspector;

impl Inspector for GoblinInspector {
    fn inspect(&self, path: &Path) -> Result<Inspection, LookupError> {
        log::debug!("parsing {}", path.display());
        let content = fs::read(path)?;
        inspect_bytes(path, &content)
    }
}

/// Read format and declared dependencies from the content of a binary
///
/// `path` is only used in error messages.
pub fn inspect_bytes(path: &Path, content: &[u8]) -> Result<Inspection, LookupError> {
    let object = goblin::Object::parse(content).map_err(|source| LookupError::ParseError {
        path: path.to_owned(),
        source,
    })?;

    let unsupported = |kind: &str| LookupError::UnsupportedObject {
        kind: kind.to_owned(),
        path: path.to_owned(),
    };

    match object {
        goblin::Object::Elf(elf) => Ok(Inspection {
            format: if elf.is_64 {
                BinaryFormat::Elf64
            } else {
                BinaryFormat::Elf32
            },
            dependencies: elf.libraries.iter().map(|s| s.to_string()).collect(),
        }),
        goblin::Object::PE(pe) => {
            let format = match pe.header.coff_header.machine {
                COFF_MACHINE_X86 => BinaryFormat::Pe32,
                COFF_MACHINE_X86_64 => BinaryFormat::Pe64,
                machine => {
                    return Err(LookupError::UnrecognizedFormat {
                        format: format!("pei-{}", machine_to_str(machine).to_lowercase()),
                        path: path.to_owned(),
                    })
                }
            };
            Ok(Inspection {
                format,
                dependencies: pe_imports(&pe),
            })
        }
        goblin::Object::Mach(_) => Err(unsupported("Mach")),
        goblin::Object::Archive(_) => Err(unsupported("Archive")),
        goblin::Object::Unknown(magic) => {
            log::debug!("unknown magic {magic:#x} in {}", path.display());
            Err(LookupError::UndeterminedFormat {
                path: path.to_owned(),
            })
        }
        _ => Err(unsupported("COFF/TE")),
    }
}

/// Imported DLL names in import table order
///
/// `PE::libraries` is sorted, so it can't be used: the walk follows declaration order.
fn pe_imports(pe: &goblin::pe::PE) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for entry in pe.import_data.iter().flat_map(|d| d.import_data.iter()) {
        if !names.iter().any(|n| n.eq_ignore_ascii_case(entry.name)) {
            names.push(entry.name.to_owned());
        }
    }
    names
}
