//! Find the shared libraries needed by an ELF or PE executable, and bundle them with it.

pub mod binary;
pub mod bundle;
pub mod common;
pub mod dependency;
pub mod format;
pub mod inspect;
pub mod lookup_path;
pub mod objdump;
pub mod policy;
pub mod query;
pub mod runner;

pub use common::{path_to_string, LookupError, PROGRAM_NAME};
pub use dependency::{Dependencies, Dependency, DependencyStatus};
pub use format::BinaryFormat;
pub use inspect::{Inspection, Inspector, InspectorKind};
pub use lookup_path::LookupPath;
pub use query::LookupQuery;

/// Walk the dependencies of the executable of the query, with the inspector it selects
pub fn lookup(query: &LookupQuery) -> Result<Dependencies, LookupError> {
    let inspector = query.inspector.build();
    lookup_with(query, inspector.as_ref())
}

/// Walk the dependencies of the executable of the query, reading binaries with the given inspector
pub fn lookup_with(
    query: &LookupQuery,
    inspector: &dyn Inspector,
) -> Result<Dependencies, LookupError> {
    let lookup_path = LookupPath::new(query);
    runner::Runner::new(query, &lookup_path, inspector).run()
}
