//! Decides which dependencies are left out of the bundle

use crate::common::LookupError;
use crate::format::BinaryFormat;
use crate::query::PatternLists;
use regex::{RegexBuilder, RegexSet, RegexSetBuilder};

/// Compiled user whitelist and blacklist, plus the built-in per-format blacklists
#[derive(Debug, Clone)]
pub struct BlacklistPolicy {
    whitelist: RegexSet,
    blacklist: RegexSet,
}

impl BlacklistPolicy {
    /// Compile the user patterns
    ///
    /// Patterns must match the whole name. With `case_insensitive` (PE executables) they
    /// ignore case, as library names do on Windows.
    pub fn new(patterns: &PatternLists, case_insensitive: bool) -> Result<Self, LookupError> {
        Ok(Self {
            whitelist: compile("whitelist", &patterns.whitelist, case_insensitive)?,
            blacklist: compile("blacklist", &patterns.blacklist, case_insensitive)?,
        })
    }

    /// Whether the library should be skipped: neither resolved, nor copied, nor walked into
    pub fn is_blacklisted(&self, name: &str, format: BinaryFormat) -> bool {
        if self.whitelist.is_match(name) {
            return false;
        }
        if self.blacklist.is_match(name) {
            return true;
        }
        format.is_builtin_blacklisted(name)
    }
}

fn compile(
    list: &'static str,
    patterns: &[String],
    case_insensitive: bool,
) -> Result<RegexSet, LookupError> {
    let invalid = |source: regex::Error| LookupError::InvalidPattern { list, source };
    // each pattern must stand on its own, or it could close the anchoring group
    for p in patterns {
        RegexBuilder::new(p)
            .case_insensitive(case_insensitive)
            .build()
            .map_err(invalid)?;
    }
    RegexSetBuilder::new(patterns.iter().map(|p| format!("^(?:{p})$")))
        .case_insensitive(case_insensitive)
        .build()
        .map_err(invalid)
}
