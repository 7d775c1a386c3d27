// `floc` — compile one flo source file to NASM assembly, writing both the
// pre-optimization and post-optimization listings alongside it (spec.md §6,
// mirroring the reference driver's `_raw.asm` / `.asm` naming).

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

/// Compile a .flo source file to x86 NASM assembly.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the source file to compile.
    source: PathBuf,

    /// Override the output stem (defaults to the source file's stem); the
    /// pre-optimization listing is written to `<stem>_raw.asm`, the
    /// optimized listing to `<stem>.asm`.
    #[arg(short = 'o', long = "output")]
    output_stem: Option<PathBuf>,

    /// Print each pipeline stage's progress on stderr (equivalent to
    /// `RUST_LOG=info`; repeat for `RUST_LOG=debug`).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logger(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("floc: {message}");
            ExitCode::FAILURE
        }
    }
}

/// `-v` forces a minimum log level even when `RUST_LOG` is unset; an
/// explicit `RUST_LOG` always wins, matching `env_logger`'s usual precedence.
fn init_logger(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();
}

fn run(args: &Args) -> Result<(), String> {
    let source = fs::read_to_string(&args.source)
        .map_err(|e| format!("could not read {}: {e}", args.source.display()))?;

    let compiled = flo::pipeline::compile(&source).map_err(|e| format!("{}: {e}", args.source.display()))?;

    let stem = args.output_stem.clone().unwrap_or_else(|| source_stem(&args.source));
    let raw_path = stem_with_suffix(&stem, "_raw.asm");
    let optimized_path = stem_with_suffix(&stem, ".asm");

    fs::write(&raw_path, &compiled.raw_asm).map_err(|e| format!("could not write {}: {e}", raw_path.display()))?;
    fs::write(&optimized_path, &compiled.optimized_asm)
        .map_err(|e| format!("could not write {}: {e}", optimized_path.display()))?;

    Ok(())
}

/// The source file's path with its extension dropped, matching the
/// reference driver's `path.replace(".flo", suffix)` when no `-o` override
/// is given.
fn source_stem(source_path: &PathBuf) -> PathBuf {
    let stem = source_path.file_stem().unwrap_or_default().to_string_lossy().into_owned();
    source_path.with_file_name(stem)
}

fn stem_with_suffix(stem: &PathBuf, suffix: &str) -> PathBuf {
    let mut name = stem.file_name().unwrap_or_default().to_string_lossy().into_owned();
    name.push_str(suffix);
    stem.with_file_name(name)
}
