mod config;
mod jobs;
mod tileset;

use clap::Parser;
use std::path::PathBuf;
use std::process;
use std::time::Instant;

/// Run every synthesis job listed in an XML job file, writing the results
/// as PNGs under `output/`.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Path to the job file.
    job_file: PathBuf,
}

fn main() {
    env_logger::init();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            eprint!("{}", err);
            process::exit(1);
        }
    };

    let started = Instant::now();
    if let Err(err) = jobs::run_all(&cli.job_file) {
        eprintln!("error: {}", err);
        process::exit(1);
    }
    let elapsed = started.elapsed();
    println!("time = {}.{:03}s", elapsed.as_secs(), elapsed.subsec_millis());
}
