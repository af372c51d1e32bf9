use std::io::Write;
use std::path::PathBuf;

use adlib_pipeline::{inspect_file, Pipeline, PipelineConfig};
use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "adlib-cli")]
#[command(about = "Offline Ad Library export ranker")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Enrich the latest export and write the ranked outputs (default)
    Run(RunArgs),
    /// Print enriched records of one export as JSON lines
    Inspect {
        file: PathBuf,
    },
}

#[derive(Debug, Default, Args)]
struct RunArgs {
    /// Directory scanned for the newest .csv/.json/.jsonl export
    #[arg(long)]
    input_dir: Option<PathBuf>,
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Use this export instead of scanning the input directory
    #[arg(long)]
    file: Option<PathBuf>,
    /// Size of the USA ranking
    #[arg(long)]
    top_n: Option<usize>,
}

impl RunArgs {
    fn apply(self, config: &mut PipelineConfig) {
        if let Some(dir) = self.input_dir {
            config.input_dir = dir;
        }
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        if self.file.is_some() {
            config.input_file = self.file;
        }
        if let Some(n) = self.top_n {
            config.top_n = n;
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or_else(|| Commands::Run(RunArgs::default())) {
        Commands::Run(args) => {
            let mut config = PipelineConfig::load()?;
            args.apply(&mut config);
            tracing::debug!(?config, "resolved configuration");
            let summary = Pipeline::new(config).run_once()?;
            println!(
                "run complete: run_id={} source={} total={} usa={} top={} outputs={}",
                summary.run_id,
                summary.source_file,
                summary.total,
                summary.usa,
                summary.top_usa,
                summary.output_dir
            );
        }
        Commands::Inspect { file } => {
            let records = inspect_file(&file, Utc::now())?;
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            for record in &records {
                let line = serde_json::to_string(record)
                    .with_context(|| format!("serializing record {}", record.id()))?;
                writeln!(out, "{line}").context("writing to stdout")?;
            }
        }
    }

    Ok(())
}
