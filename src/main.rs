mod pipelines;
mod utils;
mod config;
mod cli;

use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Result;
use env_logger::Builder;
use log::{error, info, LevelFilter};

use crate::cli::parse;
use crate::config::defs::RunConfig;
use crate::utils::file::absolute_path;
use pipelines::genotyping;


#[tokio::main]
async fn main() -> Result<()> {
    let run_start = Instant::now();

    let args = parse();

    let log_level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    Builder::new()
        .filter_level(log_level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();

    println!("\n-------------\n HPV Genotyping\n-------------\n");

    let dir = env::current_dir()?;
    info!("The current directory is {:?}", dir);

    let out_dir = setup_output_dir(&args.out_dir, &dir)?;
    info!("Writing results to {:?}", out_dir);

    let run_config = RunConfig {
        cwd: dir,
        out_dir,
        args,
    };

    if let Err(e) = genotyping::run(&run_config).await {
        error!("Pipeline failed: {} at {} milliseconds.", e, run_start.elapsed().as_millis());
        std::process::exit(1);
    }

    println!("Run complete: {} milliseconds.", run_start.elapsed().as_millis());
    Ok(())
}


/// Sets up output directory
/// Resolves `out` against the working directory and ensures it exists.
///
/// # Arguments
/// * `out` - Output directory from args.
/// * `cwd` - The current working directory.
/// # Returns
/// path to the output directory.
fn setup_output_dir(out: &str, cwd: &Path) -> Result<PathBuf> {
    let out_dir = absolute_path(Path::new(out), cwd);
    fs::create_dir_all(&out_dir)?;
    Ok(out_dir)
}
