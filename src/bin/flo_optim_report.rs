// `flo-optim-report` — summarize the peephole optimizer's line-count
// reduction across every compiled sample in a directory, grounded on
// `optim_perf.py`: for each `<name>.flo`, compare `<name>_raw.asm` against
// `<name>.asm`, skipping the fixed header both files share.

use std::fs;
use std::path::PathBuf;

use clap::Parser;

const HEADER_LINES: usize = 7;

/// Report the peephole optimizer's line-count reduction for every compiled
/// sample in a directory.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory containing matched <name>.flo / <name>_raw.asm / <name>.asm files.
    #[arg(default_value = "input")]
    dir: PathBuf,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let mut names: Vec<String> = match fs::read_dir(&args.dir) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str().map(|s| s.to_string()))
            .filter_map(|name| name.strip_suffix(".flo").map(|s| s.to_string()))
            .collect(),
        Err(e) => {
            eprintln!("flo-optim-report: could not read {}: {e}", args.dir.display());
            std::process::exit(1);
        }
    };
    names.sort();

    let mut reductions = Vec::with_capacity(names.len());
    for name in &names {
        match report_one(&args.dir, name) {
            Ok(percent) => reductions.push(percent),
            Err(e) => eprintln!("flo-optim-report: skipping {name}: {e}"),
        }
    }

    if !reductions.is_empty() {
        let average = reductions.iter().sum::<f64>() / reductions.len() as f64;
        println!("Average reduction: {average:.2}%");
    }
}

fn report_one(dir: &PathBuf, name: &str) -> Result<f64, String> {
    let raw = body_lines(&dir.join(format!("{name}_raw.asm")))?;
    let optimized = body_lines(&dir.join(format!("{name}.asm")))?;
    let percent = (raw as f64 - optimized as f64) / raw as f64 * 100.0;
    println!("{name:20}: {raw:3} -> {optimized:3} lines: {percent:.2}% reduction");
    Ok(percent)
}

fn body_lines(path: &PathBuf) -> Result<usize, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("could not read {}: {e}", path.display()))?;
    Ok(text.lines().count().saturating_sub(HEADER_LINES))
}
