// Coastal Alert CLI - run the server or simulate readings offline

use anyhow::Result;
use clap::{Parser, Subcommand};
use coastal_core::{
    AlertEngine, Dispatcher, EvaluationResponse, InMemoryAlertLog, InMemoryDirectory,
    NotifierConfig, NotifierSet, Reading, ThresholdRegistry, ThresholdTable,
};
use coastal_web::WebConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "coastal")]
#[command(about = "Coastal threat alert evaluation and notification", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Port to listen on (overrides COASTAL_PORT / PORT)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Evaluate a single reading against an in-memory directory, using demo notifiers
    Evaluate {
        /// Metric name, e.g. water_level
        #[arg(long)]
        metric: String,

        /// Measured value
        #[arg(long, allow_hyphen_values = true)]
        value: f64,

        /// Region selector: empty for all regions, or "StateA|StateB"
        #[arg(long, default_value = "")]
        regions: String,

        /// JSON file with an array of contacts
        #[arg(long)]
        contacts: Option<PathBuf>,

        /// TOML file with a [thresholds] table
        #[arg(long)]
        thresholds: Option<PathBuf>,
    },

    /// Print the threshold table
    Thresholds {
        /// TOML file with a [thresholds] table
        #[arg(long)]
        thresholds: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("coastal=info,coastal_web=info,coastal_core=info")
            }),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Serve { port } => {
            let mut config = WebConfig::load()?;
            if let Some(port) = port {
                config.port = port;
            }
            info!("Starting coastal alert server on port {}", config.port);
            coastal_web::serve(config).await
        }

        Commands::Evaluate {
            metric,
            value,
            regions,
            contacts,
            thresholds,
        } => {
            let reading = Reading::new(metric, value, regions);
            match evaluate_offline(&reading, contacts.as_deref(), thresholds.as_deref()).await {
                Ok(response) => {
                    println!("{}", serde_json::to_string_pretty(&response)?);
                    Ok(())
                }
                Err(e) => {
                    error!("Evaluation failed: {}", e);
                    eprintln!("\n✗ Evaluation failed: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Thresholds { thresholds } => {
            let table = load_thresholds(thresholds.as_deref())?;
            println!("\nThresholds:");
            for (metric, threshold) in table.iter() {
                println!("  {:<14} {:>10.2}", metric.as_str(), threshold);
            }
            Ok(())
        }
    }
}

fn load_thresholds(path: Option<&Path>) -> Result<ThresholdTable> {
    match path {
        Some(path) => ThresholdTable::load_file(path),
        None => Ok(ThresholdTable::default()),
    }
}

/// Run one reading through a throwaway engine: contacts from a JSON file,
/// an in-memory log and log-only notifiers.
async fn evaluate_offline(
    reading: &Reading,
    contacts: Option<&Path>,
    thresholds: Option<&Path>,
) -> Result<EvaluationResponse> {
    let directory = match contacts {
        Some(path) => InMemoryDirectory::from_json_file(path)?,
        None => InMemoryDirectory::default(),
    };
    let table = load_thresholds(thresholds)?;

    let engine = AlertEngine::new(
        Arc::new(ThresholdRegistry::new(table)),
        Arc::new(directory),
        Arc::new(InMemoryAlertLog::new()),
        Dispatcher::new(NotifierSet::demo(), NotifierConfig::default().send_timeout()),
    );

    Ok(engine.evaluate(reading).await?)
}
