use clap::Parser;
use log::{error, info, LevelFilter};
use mnist_csv::config::Config;
use mnist_csv::convert::convert_files;
use mnist_csv::download::download_extract;
use mnist_csv::{logger, Result};
use std::fs;
use std::path::PathBuf;
use std::process;
use std::time::Instant;

/// Download the MNIST IDX files and convert each split to CSV.
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// JSON file overriding the default MNIST layout
    #[arg(long)]
    config: Option<PathBuf>,
    /// Use the IDX files already in the data directory
    #[arg(long)]
    skip_download: bool,
    /// Skip the IDX headers without checking magic numbers and counts
    #[arg(long)]
    no_validate: bool,
    /// Formatting threads, 0 for one per physical core
    #[arg(long)]
    threads: Option<usize>,
    #[arg(short, long)]
    verbose: bool,
}

fn run(cli: &Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if cli.no_validate {
        config.validate_headers = false;
    }
    if let Some(threads) = cli.threads {
        config.threads = threads;
    }
    config.build_thread_pool()?;

    let start = Instant::now();
    if !cli.skip_download {
        for split in &config.splits {
            for url in split.urls(&config.base_url).iter() {
                download_extract(url, &config.data_dir, config.skip_existing)?;
            }
        }
        info!("download: {:?}", start.elapsed());
    }

    fs::create_dir_all(&config.out_dir)?;
    let opts = config.convert_options();
    for split in &config.splits {
        let paths = config.paths(split);
        info!("{} split", split.name);
        convert_files(
            &paths.images,
            &paths.labels,
            &paths.output,
            split.count,
            &opts,
        )?;
    }
    info!("full time: {:?}", start.elapsed());
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    if let Err(e) = logger::init_log(level) {
        eprintln!("{}", e);
        process::exit(1);
    }
    if let Err(e) = run(&cli) {
        error!("{}", e);
        process::exit(1);
    }
}
