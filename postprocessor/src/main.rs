use anyhow::Context;
use clap::Parser;
use generator::profile::{generate, GeneratorConfig};
use std::path::PathBuf;
use workflow::config::WorkflowConfig;
use workflow::runner::Runner;

mod generator;
mod ingest;
mod output;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Turns fitted DOAS scans into plume geometry, wind speeds and SO2 fluxes")]
struct Args {
    /// Load a workflow config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    /// Scan files to process; the configured input directories are listed when empty
    files: Vec<PathBuf>,
    /// Override the number of worker threads
    #[arg(long)]
    threads: Option<usize>,
    /// Skip scans the previous run rejected and reuse its archived evaluations
    #[arg(long, default_value_t = false)]
    continuation: bool,
    /// Write a synthetic network (workflow plus scans) into this directory and exit
    #[arg(long)]
    generate: Option<PathBuf>,
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    if let Some(directory) = args.generate {
        let config = GeneratorConfig {
            seed: args.seed,
            ..Default::default()
        };
        let generated = generate(&directory, &config)?;
        println!(
            "Generated {} scans; run with --workflow {}",
            generated.scans.len(),
            generated.workflow.display()
        );
        return Ok(());
    }

    let path = args
        .workflow
        .context("--workflow is required unless --generate is given")?;
    let mut config = WorkflowConfig::load(&path)?;
    if let Some(threads) = args.threads {
        config.settings.max_threads = threads;
    }
    if args.continuation {
        config.settings.continuation = true;
    }

    let runner = Runner::new(config);
    let files = if args.files.is_empty() {
        runner.input_files()?
    } else {
        args.files
    };
    if files.is_empty() {
        log::warn!("no scan files to process");
    }

    let summary = runner.execute(files)?;
    println!(
        "Run finished -> accepted {}, rejected {}, geometry {}, wind speeds {}, fluxes {}",
        summary.accepted,
        summary.rejected,
        summary.geometry.len(),
        summary.wind_speeds.len(),
        summary.fluxes.len()
    );
    println!(
        "Logs written to {}",
        runner.config().settings.output_directory.display()
    );
    Ok(())
}
