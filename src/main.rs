use anyhow::Result;
use clap::Parser;
use contribution_medians::contributions::pipeline::run_files;
use contribution_medians::logging;
use std::path::PathBuf;

/// Running median by zip code and median by date of individual contributions.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// pipe-delimited contributions file
    input: PathBuf,
    /// where to write the running median by zip code
    by_zip_output: PathBuf,
    /// where to write the median by date
    by_date_output: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::setup_logging()?;
    run_files(&args.input, &args.by_zip_output, &args.by_date_output)?;
    Ok(())
}
