extern crate depbundle;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use depbundle::bundle::Bundler;
use depbundle::path_to_string;
use depbundle::query::WalkMode;
use depbundle::{lookup, BinaryFormat, InspectorKind, LookupPath, LookupQuery, PROGRAM_NAME};
use fs_err as fs;
use log::LevelFilter;
use std::path::PathBuf;
use std::process::ExitCode;

const LONG_ABOUT: &str = "\
Finds and copies all .so / .dll files needed by a program to run.
This can be useful when you want to bundle an application
together with all its dependencies.

EXECUTABLE can be one of the following supported formats:
- 32-bit ELF
- 64-bit ELF
- i386 Microsoft Windows executable
- x86_64 Microsoft Windows executable

TARGET-DIR specifies the directory to copy the .so / .dll files to.
When omitted, defaults to the directory of the executable.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// Parse the binaries in-process
    Goblin,
    /// Parse the output of `objdump -x`
    Objdump,
}

#[derive(Parser, Debug)]
#[command(name = "depbundle", version, about, long_about = LONG_ABOUT)]
struct Args {
    /// Executable whose dependencies should be bundled
    #[arg(value_name = "EXECUTABLE")]
    executable: PathBuf,

    /// Directory to copy the dependencies to (default: directory of EXECUTABLE)
    #[arg(value_name = "TARGET-DIR")]
    target_dir: Option<PathBuf>,

    /// Print the list of dependencies without actually copying the .so / .dll files
    #[arg(long)]
    dry_run: bool,

    /// Include the directory of the executable in the resolve paths, with the highest precedence
    #[arg(long)]
    exedir: bool,

    /// Do not overwrite .so / .dll files already existing in the target directory
    #[arg(long)]
    no_clobber: bool,

    /// Print the names of the dependencies as they're being copied over
    #[arg(long)]
    verbose: bool,

    /// Add DIRECTORY to the paths searched when resolving names; user directories take precedence over system paths
    #[arg(long = "search-dir", value_name = "DIRECTORY")]
    search_dirs: Vec<PathBuf>,

    /// Names (regular expression matching the whole name) that should not be resolved nor copied over
    #[arg(long = "blacklist", visible_alias = "ignore", value_name = "PATTERN")]
    blacklist: Vec<String>,

    /// Names (regular expression matching the whole name) that should always be resolved and copied over; has precedence over the blacklist
    #[arg(long = "whitelist", visible_alias = "override", value_name = "PATTERN")]
    whitelist: Vec<String>,

    /// Abort at the first dependency that can't be resolved, instead of reporting all of them
    #[arg(long)]
    strict: bool,

    /// How to read the binaries
    #[arg(long, value_enum, default_value_t = Backend::Goblin)]
    inspector: Backend,

    /// objdump program to run with --inspector=objdump
    #[arg(long, value_name = "PROGRAM", default_value = "objdump")]
    objdump: String,

    /// System directory for i386 Windows libraries (default: the mingw32 sys-root)
    #[arg(long, value_name = "DIRECTORY")]
    win32_sysroot: Option<PathBuf>,

    /// System directory for x86_64 Windows libraries (default: the mingw64 sys-root)
    #[arg(long, value_name = "DIRECTORY")]
    win64_sysroot: Option<PathBuf>,

    /// Also write the list of dependencies to this file, in JSON format
    #[arg(long, value_name = "PATH")]
    output_json: Option<PathBuf>,
}

fn init_logging(verbose: bool) {
    let log_level = if verbose {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    };

    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level.as_str()),
    );

    // progress messages are program output, not diagnostics
    builder
        .target(env_logger::Target::Stdout)
        .format_timestamp(None)
        .format_level(false)
        .format_target(false);

    builder.init();
}

fn build_query(args: &Args) -> anyhow::Result<LookupQuery> {
    let mut query = LookupQuery::deduce_from_executable_location(&args.executable)?;

    if let Some(target_dir) = &args.target_dir {
        query.set_target_dir(target_dir)?;
    }
    for dir in &args.search_dirs {
        query.add_search_dir(dir)?;
    }

    query.parameters.dry_run = args.dry_run;
    query.parameters.include_exe_dir = args.exedir;
    query.parameters.no_clobber = args.no_clobber;
    if args.strict {
        query.parameters.walk_mode = WalkMode::Strict;
    }

    query.patterns.blacklist = args.blacklist.clone();
    query.patterns.whitelist = args.whitelist.clone();

    for (sysroot, format) in [
        (&args.win32_sysroot, BinaryFormat::Pe32),
        (&args.win64_sysroot, BinaryFormat::Pe64),
    ] {
        if let Some(dir) = sysroot {
            *query.system_dirs.for_format_mut(format) = vec![dir.clone()];
        }
    }

    query.inspector = match args.inspector {
        Backend::Goblin => InspectorKind::Goblin,
        Backend::Objdump => InspectorKind::Objdump(args.objdump.clone()),
    };

    Ok(query)
}

fn run(args: &Args) -> anyhow::Result<bool> {
    let query = build_query(args)?;

    log::debug!(
        "Looking for dependencies of {}",
        path_to_string(&query.target.target_exe)
    );
    if log::log_enabled!(log::Level::Debug) {
        let lookup_path = LookupPath::new(&query);
        for format in BinaryFormat::ALL {
            log::debug!("{format} search path: {:?}", lookup_path.search_path(format));
        }
    }

    let deps = lookup(&query)?;

    if let Some(json_output_path) = &args.output_json {
        let js = serde_json::to_string_pretty(&deps).context("Error serializing")?;
        fs::write(json_output_path, js)
            .with_context(|| format!("couldn't write to {}", json_output_path.display()))?;
    }

    let result = Bundler::new(&query, std::io::stdout(), std::io::stderr()).process(&deps)?;

    log::info!("{}", result.summary(query.parameters.dry_run));

    Ok(result.is_success())
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // help and version are not errors; anything else exits with 1
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    init_logging(args.verbose);

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{PROGRAM_NAME}: {e:#}");
            ExitCode::FAILURE
        }
    }
}
