use clap::Parser;
use log::{error, info, LevelFilter};
use mnist_csv::record::read_record_at;
use mnist_csv::{logger, Result};
use std::fs::File;
use std::path::PathBuf;
use std::process;

/// Render one record of a converted CSV file as a 28x28 grayscale image.
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    csv: PathBuf,
    /// zero based line number
    index: usize,
    /// output image, format picked from the extension
    image: PathBuf,
}

fn run(cli: &Cli) -> Result<()> {
    let record = read_record_at(File::open(&cli.csv)?, cli.index)?;
    record.to_image().save(&cli.image)?;
    info!("saved {}", cli.image.display());
    println!("record {}: label {}", cli.index, record.label);
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = logger::init_log(LevelFilter::Info) {
        eprintln!("{}", e);
        process::exit(1);
    }
    if let Err(e) = run(&cli) {
        error!("{}", e);
        process::exit(1);
    }
}
