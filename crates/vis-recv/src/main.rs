//! vis-recv — recover a file from a video of barcodes.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use vis_core::config::VisConfig;
use vis_engine::{receive, TransferOptions};

mod progress;
mod reader;
mod video;

#[derive(Parser, Debug)]
#[command(name = "vis-recv", version, about = "Receive a file sent as a barcode video")]
struct Cli {
    /// Video file to decode
    input: PathBuf,

    /// Where to write the received file
    #[arg(short, long)]
    output: PathBuf,

    /// Overwrite the output file if it exists
    #[arg(short, long)]
    force: bool,

    /// Per-frame diagnostics (-v) or full packet dumps (-vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file to use instead of the default location
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbosity: u8) {
    let default = match verbosity {
        0 => "warn",
        1 => "warn,vis_core=debug,vis_engine=debug,vis_recv=debug",
        _ => "warn,vis_core=trace,vis_engine=trace,vis_recv=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let config = VisConfig::load(cli.config.as_deref()).context("failed to load config")?;

    if !cli.input.is_file() {
        bail!("input {} does not exist or is not a file", cli.input.display());
    }
    let options = TransferOptions {
        output: cli.output.clone(),
        overwrite: cli.force,
        temp_suffix: config.output.temp_suffix.clone(),
        queue_capacity: config.pipeline.queue_capacity,
    };
    let decoder = reader::from_config(&config.decode);
    let source = video::GstFrameSource::open(&cli.input)
        .with_context(|| format!("failed to open {}", cli.input.display()))?;

    tracing::info!(
        input = %cli.input.display(),
        output = %cli.output.display(),
        symbology = ?config.decode.symbology,
        "receiving"
    );

    let mut reporter = progress::Reporter::new(cli.verbose);
    let result = receive(source, &decoder, &options, |p| reporter.report(p));
    reporter.finish();

    let summary = result?;
    tracing::debug!(
        frames = summary.frames_read,
        undecodable = summary.frames_undecodable,
        duplicates = summary.duplicates,
        "receive finished"
    );
    println!(
        "received {} bytes in {} packets to {} (sha3-256 {})",
        summary.bytes,
        summary.packets,
        summary.output.display(),
        hex::encode(summary.digest)
    );
    Ok(())
}
