use crate::common::{path_to_string, LookupError};
use crate::dependency::{Dependencies, Dependency, DependencyStatus};
use crate::format::BinaryFormat;
use crate::inspect::{Inspection, Inspector};
use crate::lookup_path::LookupPath;
use crate::policy::BlacklistPolicy;
use crate::query::{LookupQuery, WalkMode};

/// Names declared by one binary that still have to be visited
struct Frame {
    pending: std::vec::IntoIter<String>,
    format: BinaryFormat,
    depth: usize,
}

impl Frame {
    fn new(inspection: Inspection, depth: usize) -> Self {
        Self {
            pending: inspection.dependencies.into_iter(),
            format: inspection.format,
            depth,
        }
    }
}

/// Finds the dependencies of the specified executable within the given lookup path
///
/// The dependencies are resolved recursively, depth-first and in declaration order, with an
/// explicit stack instead of the call stack. Every name is processed once: later mentions,
/// including those closing a cycle, are skipped.
pub struct Runner<'a> {
    query: &'a LookupQuery,
    lookup_path: &'a LookupPath,
    inspector: &'a dyn Inspector,
}

impl<'a> Runner<'a> {
    pub fn new(
        query: &'a LookupQuery,
        lookup_path: &'a LookupPath,
        inspector: &'a dyn Inspector,
    ) -> Self {
        Self {
            query,
            lookup_path,
            inspector,
        }
    }

    pub fn run(&self) -> Result<Dependencies, LookupError> {
        let root = self.inspector.inspect(&self.query.target.target_exe)?;
        log::debug!(
            "{} is a {} binary declaring {} dependencies",
            path_to_string(&self.query.target.target_exe),
            root.format,
            root.dependencies.len()
        );
        let policy = BlacklistPolicy::new(&self.query.patterns, root.format.is_pe())?;
        log::debug!(
            "search path: {:?}",
            self.lookup_path.search_path(root.format)
        );

        let mut found = Dependencies::new();
        let mut stack = vec![Frame::new(root, 1)];

        while let Some(frame) = stack.last_mut() {
            let Some(name) = frame.pending.next() else {
                stack.pop();
                continue;
            };
            let (format, depth) = (frame.format, frame.depth);

            // don't process again a name we already met
            if found.contains(&name, format) {
                continue;
            }

            let status = self.lookup(&name, format, &policy)?;
            let to_walk = match &status {
                DependencyStatus::Resolved(path) => Some(path.clone()),
                DependencyStatus::Unresolved if self.query.parameters.walk_mode == WalkMode::Strict => {
                    return Err(LookupError::Unresolved(name));
                }
                _ => None,
            };

            found.insert(Dependency {
                name,
                format,
                depth_first_appearance: depth,
                status,
            });

            if let Some(path) = to_walk {
                let inspection = self.inspector.inspect(&path)?;
                stack.push(Frame::new(inspection, depth + 1));
            }
        }

        Ok(found)
    }

    fn lookup(
        &self,
        name: &str,
        format: BinaryFormat,
        policy: &BlacklistPolicy,
    ) -> Result<DependencyStatus, LookupError> {
        if policy.is_blacklisted(name, format) {
            log::debug!("\"{name}\": blacklisted");
            return Ok(DependencyStatus::Blacklisted);
        }
        match self.lookup_path.search_library(name, format)? {
            Some(r) => {
                log::debug!("\"{name}\": found at {}", r.fullpath.display());
                Ok(DependencyStatus::Resolved(r.fullpath))
            }
            None => {
                log::debug!("\"{name}\": not found");
                Ok(DependencyStatus::Unresolved)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SystemDirs;
    use fs_err as fs;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    /// Inspector answering from a table keyed by file name, recording every call
    struct ScriptedInspector {
        binaries: HashMap<String, Inspection>,
        calls: RefCell<Vec<PathBuf>>,
    }

    impl ScriptedInspector {
        fn new(format: BinaryFormat, binaries: &[(&str, &[&str])]) -> Self {
            Self {
                binaries: binaries
                    .iter()
                    .map(|(file, deps)| {
                        (
                            file.to_string(),
                            Inspection {
                                format,
                                dependencies: deps.iter().map(|s| s.to_string()).collect(),
                            },
                        )
                    })
                    .collect(),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl Inspector for ScriptedInspector {
        fn inspect(&self, path: &Path) -> Result<Inspection, LookupError> {
            self.calls.borrow_mut().push(path.to_owned());
            let file_name = path
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or_default();
            self.binaries
                .get(file_name)
                .cloned()
                .ok_or_else(|| LookupError::UndeterminedFormat {
                    path: path.to_owned(),
                })
        }
    }

    /// A root with an executable `app/app` and a `lib` search directory holding the given files
    struct Fixture {
        _dir: tempfile::TempDir,
        root: PathBuf,
        query: LookupQuery,
    }

    impl Fixture {
        fn new(libs: &[&str]) -> Result<Self, LookupError> {
            let dir = tempfile::tempdir()?;
            let root = fs::canonicalize(dir.path())?;
            fs::create_dir_all(root.join("app"))?;
            fs::create_dir_all(root.join("lib"))?;
            fs::write(root.join("app/app"), b"")?;
            for l in libs {
                fs::write(root.join("lib").join(l), l.as_bytes())?;
            }
            let mut query = LookupQuery::deduce_from_executable_location(root.join("app/app"))?;
            query.system_dirs = SystemDirs::empty();
            query.add_search_dir(root.join("lib"))?;
            Ok(Self {
                _dir: dir,
                root,
                query,
            })
        }

        fn run(&self, inspector: &ScriptedInspector) -> Result<Dependencies, LookupError> {
            let lookup_path = LookupPath::new(&self.query);
            Runner::new(&self.query, &lookup_path, inspector).run()
        }
    }

    fn names(deps: &Dependencies) -> Vec<&str> {
        deps.iter().map(|d| d.name.as_str()).collect()
    }

    #[test]
    fn no_dependencies() -> Result<(), LookupError> {
        let fixture = Fixture::new(&[])?;
        let inspector = ScriptedInspector::new(BinaryFormat::Elf64, &[("app", &[])]);
        let deps = fixture.run(&inspector)?;
        assert!(deps.is_empty());
        assert!(deps.is_complete());
        Ok(())
    }

    #[test]
    fn depth_first_in_declaration_order() -> Result<(), LookupError> {
        let fixture = Fixture::new(&["a.so", "b.so", "c.so", "d.so"])?;
        let inspector = ScriptedInspector::new(
            BinaryFormat::Elf64,
            &[
                ("app", &["a.so", "b.so"]),
                ("a.so", &["c.so"]),
                ("b.so", &["d.so"]),
                ("c.so", &[]),
                ("d.so", &[]),
            ],
        );
        let deps = fixture.run(&inspector)?;
        assert_eq!(names(&deps), vec!["a.so", "c.so", "b.so", "d.so"]);
        let depths: Vec<_> = deps.iter().map(|d| d.depth_first_appearance).collect();
        assert_eq!(depths, vec![1, 2, 1, 2]);
        Ok(())
    }

    #[test]
    fn cycles_terminate() -> Result<(), LookupError> {
        let fixture = Fixture::new(&["a.so", "b.so"])?;
        let inspector = ScriptedInspector::new(
            BinaryFormat::Elf64,
            &[("app", &["a.so"]), ("a.so", &["b.so"]), ("b.so", &["a.so"])],
        );
        let deps = fixture.run(&inspector)?;
        assert_eq!(names(&deps), vec!["a.so", "b.so"]);
        // app, a.so, b.so: each inspected once
        assert_eq!(inspector.calls.borrow().len(), 3);
        Ok(())
    }

    #[test]
    fn diamond_is_visited_once() -> Result<(), LookupError> {
        let fixture = Fixture::new(&["left.so", "right.so", "base.so"])?;
        let inspector = ScriptedInspector::new(
            BinaryFormat::Elf64,
            &[
                ("app", &["left.so", "right.so"]),
                ("left.so", &["base.so"]),
                ("right.so", &["base.so"]),
                ("base.so", &[]),
            ],
        );
        let deps = fixture.run(&inspector)?;
        assert_eq!(names(&deps), vec!["left.so", "base.so", "right.so"]);
        let base = deps.get("base.so", BinaryFormat::Elf64).unwrap();
        assert_eq!(base.resolved_path(), Some(fixture.root.join("lib/base.so").as_path()));
        let base_calls = inspector
            .calls
            .borrow()
            .iter()
            .filter(|p| p.ends_with("base.so"))
            .count();
        assert_eq!(base_calls, 1);
        Ok(())
    }

    #[test]
    fn blacklisted_are_not_walked() -> Result<(), LookupError> {
        let fixture = Fixture::new(&["ld-linux-x86-64.so.2", "libfoo.so.1"])?;
        let inspector = ScriptedInspector::new(
            BinaryFormat::Elf64,
            &[
                ("app", &["libfoo.so.1", "ld-linux-x86-64.so.2"]),
                ("libfoo.so.1", &[]),
                ("ld-linux-x86-64.so.2", &["libhidden.so"]),
            ],
        );
        let deps = fixture.run(&inspector)?;
        assert_eq!(names(&deps), vec!["libfoo.so.1", "ld-linux-x86-64.so.2"]);
        assert!(deps
            .get("ld-linux-x86-64.so.2", BinaryFormat::Elf64)
            .unwrap()
            .is_blacklisted());
        assert!(!inspector
            .calls
            .borrow()
            .iter()
            .any(|p| p.ends_with("ld-linux-x86-64.so.2")));
        assert!(deps.is_complete());
        Ok(())
    }

    #[test]
    fn whitelist_overrides_builtin_blacklist() -> Result<(), LookupError> {
        let mut fixture = Fixture::new(&["ld-linux-x86-64.so.2"])?;
        fixture.query.patterns.whitelist = vec![r"ld-linux-x86-64\.so\.2".to_owned()];
        let inspector = ScriptedInspector::new(
            BinaryFormat::Elf64,
            &[("app", &["ld-linux-x86-64.so.2"]), ("ld-linux-x86-64.so.2", &[])],
        );
        let deps = fixture.run(&inspector)?;
        let ld = deps.get("ld-linux-x86-64.so.2", BinaryFormat::Elf64).unwrap();
        assert!(!ld.is_blacklisted());
        assert!(ld.resolved_path().is_some());
        Ok(())
    }

    #[test]
    fn lenient_walk_keeps_going() -> Result<(), LookupError> {
        let fixture = Fixture::new(&["b.so"])?;
        let inspector = ScriptedInspector::new(
            BinaryFormat::Elf64,
            &[("app", &["missing.so", "b.so"]), ("b.so", &[])],
        );
        let deps = fixture.run(&inspector)?;
        assert_eq!(names(&deps), vec!["missing.so", "b.so"]);
        assert!(!deps.is_complete());
        assert!(deps.get("missing.so", BinaryFormat::Elf64).unwrap().is_failure());
        Ok(())
    }

    #[test]
    fn strict_walk_stops() -> Result<(), LookupError> {
        let mut fixture = Fixture::new(&["b.so"])?;
        fixture.query.parameters.walk_mode = WalkMode::Strict;
        let inspector = ScriptedInspector::new(
            BinaryFormat::Elf64,
            &[("app", &["missing.so", "b.so"]), ("b.so", &[])],
        );
        match fixture.run(&inspector) {
            Err(LookupError::Unresolved(name)) => assert_eq!(name, "missing.so"),
            r => panic!("unexpected result {r:?}"),
        }
        Ok(())
    }

    #[test]
    fn inspection_failure_is_fatal() -> Result<(), LookupError> {
        let fixture = Fixture::new(&["broken.so"])?;
        // no script for broken.so: the inspector can't tell its format
        let inspector = ScriptedInspector::new(BinaryFormat::Elf64, &[("app", &["broken.so"])]);
        assert!(matches!(
            fixture.run(&inspector),
            Err(LookupError::UndeterminedFormat { .. })
        ));
        Ok(())
    }

    #[test]
    fn pe_walk_ignores_case() -> Result<(), LookupError> {
        let mut fixture = Fixture::new(&["zlib1.dll"])?;
        fixture.query.patterns.blacklist = vec![r"libgcc_s_seh-1\.dll".to_owned()];
        let inspector = ScriptedInspector::new(
            BinaryFormat::Pe64,
            &[
                ("app", &["ZLIB1.dll", "KERNEL32.dll", "LIBGCC_S_SEH-1.DLL"]),
                ("zlib1.dll", &["kernel32.dll", "zlib1.DLL"]),
            ],
        );
        let deps = fixture.run(&inspector)?;
        assert_eq!(
            names(&deps),
            vec!["ZLIB1.dll", "KERNEL32.dll", "LIBGCC_S_SEH-1.DLL"]
        );
        assert_eq!(
            deps.get("zlib1.dll", BinaryFormat::Pe64).unwrap().resolved_path(),
            Some(fixture.root.join("lib/zlib1.dll").as_path())
        );
        assert!(deps
            .get("libgcc_s_seh-1.dll", BinaryFormat::Pe64)
            .unwrap()
            .is_blacklisted());
        Ok(())
    }
}
