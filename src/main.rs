use anyhow::Context;
use clap::{Parser, Subcommand};
use ship_emissions::config::Config;
use ship_emissions::pipeline::{write_drop_log, Pipeline, PipelineReport};
use ship_emissions::server::{start_server, AppState};
use ship_emissions::storage::{load_interchange, LoadOutcome, ShipStore, SqliteShipStore};
use ship_emissions::{logging, metrics};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "ship-emissions")]
#[command(about = "Normalizes ship CO₂ emission reports and serves them as records")]
#[command(version)]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize the report spreadsheets into the interchange file
    Normalize {
        /// Directory holding the spreadsheets
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Interchange file to write
        #[arg(long)]
        output: Option<PathBuf>,
        /// Also write the dropped rows with their reasons to this CSV
        #[arg(long)]
        drop_log: Option<PathBuf>,
    },
    /// Load the interchange file into the record store, once
    Load {
        /// Interchange file to load
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Serve the record API
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
    /// Normalize, then load
    Run,
}

fn print_report(report: &PipelineReport) {
    println!("\n📊 Normalization results (run {}):", report.run_id);
    println!("   Files read:    {}", report.files_read);
    println!("   Rows read:     {}", report.rows_read);
    println!("   Rows written:  {}", report.rows_written);
    for (reason, count) in &report.drop_counts {
        println!("   Dropped ({reason}): {count}");
    }
    if report.missing_dates > 0 {
        println!("   Missing dates: {}", report.missing_dates);
    }
    println!("   Output file:   {}", report.output_file.display());
    println!("   SHA-256:       {}", report.checksum);
}

fn normalize(config: &Config, data_dir: &Path, output: &Path, drop_log: Option<&Path>) -> anyhow::Result<()> {
    let pipeline = Pipeline::from_config(&config.pipeline);
    let report = pipeline
        .run(data_dir, output)
        .with_context(|| format!("normalizing {}", data_dir.display()))?;
    if let Some(path) = drop_log {
        write_drop_log(&report.dropped, path)?;
        info!("Wrote {} dropped rows to {}", report.dropped.len(), path.display());
    }
    print_report(&report);
    Ok(())
}

fn open_store(config: &Config) -> anyhow::Result<Arc<dyn ShipStore>> {
    let path = config.database.sqlite_path();
    let store = SqliteShipStore::open(path)
        .with_context(|| format!("opening database {}", config.database.url))?;
    Ok(Arc::new(store))
}

async fn load(config: &Config, input: &Path) -> anyhow::Result<()> {
    let store = open_store(config)?;
    match load_interchange(store.as_ref(), input).await {
        Ok(LoadOutcome::Loaded { rows, .. }) => println!("✅ Loaded {rows} ships from {}", input.display()),
        Ok(LoadOutcome::Skipped { loaded_at, .. }) => {
            println!("⏭️  Data already loaded at {loaded_at}, nothing to do")
        }
        Err(e) => {
            error!("Bulk load failed: {}", e);
            return Err(e.into());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let _guard = logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Normalize {
            data_dir,
            output,
            drop_log,
        } => {
            let data_dir = data_dir.unwrap_or_else(|| config.pipeline.data_dir.clone());
            let output = output.unwrap_or_else(|| config.pipeline.output_file.clone());
            normalize(&config, &data_dir, &output, drop_log.as_deref())?;
        }
        Commands::Load { input } => {
            let input = input.unwrap_or_else(|| config.pipeline.output_file.clone());
            load(&config, &input).await?;
        }
        Commands::Serve { port } => {
            metrics::init_metrics();
            let store = open_store(&config)?;
            let port = port.unwrap_or(config.server.port);
            start_server(AppState::new(store, &config.server), port).await?;
        }
        Commands::Run => {
            let output = config.pipeline.output_file.clone();
            normalize(&config, &config.pipeline.data_dir, &output, None)?;
            load(&config, &output).await?;
        }
    }
    Ok(())
}
