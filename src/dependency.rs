use crate::format::BinaryFormat;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Outcome of the lookup of a dependency; decided once, never changed afterwards
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "path", rename_all = "lowercase")]
pub enum DependencyStatus {
    /// Excluded by the blacklist: not looked up, not walked into
    Blacklisted,
    /// Found at the given path
    Resolved(PathBuf),
    /// Not found anywhere on the search path
    Unresolved,
}

/// Information about a library that was mentioned by one of the walked binaries
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dependency {
    /// Name as it appears in the binary declaring it
    pub name: String,
    /// Format of the binary declaring it
    pub format: BinaryFormat,
    /// depth at which the library was first mentioned in the dependency tree (1 for direct dependencies)
    pub depth_first_appearance: usize,
    #[serde(flatten)]
    pub status: DependencyStatus,
}

impl Dependency {
    pub fn is_blacklisted(&self) -> bool {
        self.status == DependencyStatus::Blacklisted
    }

    pub fn resolved_path(&self) -> Option<&Path> {
        match &self.status {
            DependencyStatus::Resolved(p) => Some(p),
            _ => None,
        }
    }

    /// Not blacklisted, yet not found
    pub fn is_failure(&self) -> bool {
        self.status == DependencyStatus::Unresolved
    }
}

/// Collection of Dependency objects, result of a walk
///
/// Ordered by first discovery. Names are unique: PE names compare ignoring case.
#[derive(Debug, Clone, Default)]
pub struct Dependencies {
    arena: Vec<Dependency>,
    index: HashMap<String, usize>,
}

impl Dependencies {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(name: &str, format: BinaryFormat) -> String {
        format.normalize_name(name)
    }

    /// Add a dependency; returns false, leaving the set untouched, if the name was already present
    pub fn insert(&mut self, dep: Dependency) -> bool {
        let key = Self::key(&dep.name, dep.format);
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key, self.arena.len());
        self.arena.push(dep);
        true
    }

    pub fn get(&self, name: &str, format: BinaryFormat) -> Option<&Dependency> {
        self.index
            .get(&Self::key(name, format))
            .map(|&i| &self.arena[i])
    }

    pub fn contains(&self, name: &str, format: BinaryFormat) -> bool {
        self.index.contains_key(&Self::key(name, format))
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Dependencies in order of first discovery
    pub fn iter(&self) -> std::slice::Iter<'_, Dependency> {
        self.arena.iter()
    }

    /// Dependencies that were neither blacklisted nor found
    pub fn unresolved(&self) -> impl Iterator<Item = &Dependency> {
        self.arena.iter().filter(|d| d.is_failure())
    }

    /// True if every dependency that is not blacklisted was found
    pub fn is_complete(&self) -> bool {
        self.unresolved().next().is_none()
    }
}

impl<'a> IntoIterator for &'a Dependencies {
    type Item = &'a Dependency;
    type IntoIter = std::slice::Iter<'a, Dependency>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Serialize for Dependencies {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.arena.serialize(serializer)
    }
}
