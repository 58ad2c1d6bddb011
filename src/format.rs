//! Binary formats we know how to walk, and everything that differs between them

use serde::Serialize;
use std::fmt;

/// Executable file format of a binary, as detected by an inspector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BinaryFormat {
    Elf32,
    Elf64,
    Pe32,
    Pe64,
}

/// Entry of the built-in blacklist of a format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinPattern {
    /// Any name starting with this string
    Prefix(&'static str),
    /// Exactly this name
    Exact(&'static str),
}

/// How a dependency declaration looks in `objdump -x` output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyLine {
    /// The line contains the marker, the name is its last whitespace-separated token
    LastToken(&'static str),
    /// The line contains the marker, the name is the trimmed text following it
    AfterMarker(&'static str),
}

/// Per-format data driving resolution and parsing
#[derive(Debug)]
pub struct FormatTraits {
    /// Directories where the OS (or the cross toolchain) keeps its libraries, in lookup order
    pub system_dirs: &'static [&'static str],
    /// Libraries that are assumed to be present on the target system
    pub builtin_blacklist: &'static [BuiltinPattern],
    pub dependency_line: DependencyLine,
    /// Library names are matched ignoring ASCII case
    pub case_insensitive: bool,
}

const ELF_NEEDED: DependencyLine = DependencyLine::LastToken("  NEEDED  ");
const PE_DLL_NAME: DependencyLine = DependencyLine::AfterMarker("\tDLL Name: ");

const PE_BLACKLIST: &[BuiltinPattern] = &[
    BuiltinPattern::Exact("ADVAPI32.dll"),
    BuiltinPattern::Exact("CRYPT32.dll"),
    BuiltinPattern::Exact("GDI32.dll"),
    BuiltinPattern::Exact("IMM32.dll"),
    BuiltinPattern::Exact("KERNEL32.dll"),
    BuiltinPattern::Exact("msvcrt.dll"),
    BuiltinPattern::Exact("ole32.dll"),
    BuiltinPattern::Exact("OLEAUT32.dll"),
    BuiltinPattern::Exact("SETUPAPI.dll"),
    BuiltinPattern::Exact("SHELL32.dll"),
    BuiltinPattern::Exact("USER32.dll"),
    BuiltinPattern::Exact("VERSION.dll"),
    BuiltinPattern::Exact("WINMM.dll"),
    BuiltinPattern::Exact("WS2_32.dll"),
];

static ELF32: FormatTraits = FormatTraits {
    system_dirs: &["/lib/", "/usr/lib/", "/usr/local/lib/"],
    builtin_blacklist: &[BuiltinPattern::Prefix("ld-linux.so")],
    dependency_line: ELF_NEEDED,
    case_insensitive: false,
};

static ELF64: FormatTraits = FormatTraits {
    system_dirs: &["/lib64/", "/usr/lib64/", "/usr/local/lib64/"],
    builtin_blacklist: &[BuiltinPattern::Prefix("ld-linux-x86-64.so")],
    dependency_line: ELF_NEEDED,
    case_insensitive: false,
};

static PE32: FormatTraits = FormatTraits {
    system_dirs: &["/usr/i686-w64-mingw32/sys-root/mingw/bin/"],
    builtin_blacklist: PE_BLACKLIST,
    dependency_line: PE_DLL_NAME,
    case_insensitive: true,
};

static PE64: FormatTraits = FormatTraits {
    system_dirs: &["/usr/x86_64-w64-mingw32/sys-root/mingw/bin/"],
    builtin_blacklist: PE_BLACKLIST,
    dependency_line: PE_DLL_NAME,
    case_insensitive: true,
};

impl BinaryFormat {
    pub const ALL: [BinaryFormat; 4] = [Self::Elf32, Self::Elf64, Self::Pe32, Self::Pe64];

    pub fn traits(self) -> &'static FormatTraits {
        match self {
            Self::Elf32 => &ELF32,
            Self::Elf64 => &ELF64,
            Self::Pe32 => &PE32,
            Self::Pe64 => &PE64,
        }
    }

    pub fn is_pe(self) -> bool {
        matches!(self, Self::Pe32 | Self::Pe64)
    }

    /// Key under which a library name is stored in a dependency set
    pub fn normalize_name(self, name: &str) -> String {
        if self.traits().case_insensitive {
            name.to_ascii_lowercase()
        } else {
            name.to_owned()
        }
    }

    /// Check the name against the built-in blacklist of this format
    pub fn is_builtin_blacklisted(self, name: &str) -> bool {
        let case_insensitive = self.traits().case_insensitive;
        self.traits().builtin_blacklist.iter().any(|p| match *p {
            BuiltinPattern::Exact(s) if case_insensitive => s.eq_ignore_ascii_case(name),
            BuiltinPattern::Exact(s) => s == name,
            BuiltinPattern::Prefix(s) if case_insensitive => name
                .get(..s.len())
                .map(|head| head.eq_ignore_ascii_case(s))
                .unwrap_or(false),
            BuiltinPattern::Prefix(s) => name.starts_with(s),
        })
    }
}

impl fmt::Display for BinaryFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Elf32 => "32-bit ELF",
            Self::Elf64 => "64-bit ELF",
            Self::Pe32 => "i386 PE",
            Self::Pe64 => "x86-64 PE",
        };
        f.write_str(s)
    }
}
