mod acquirer;
mod config;
mod database;
mod errors;
mod loader;
mod models;
mod pipeline;
mod profile;
mod schema;
mod transform;
mod utils;
mod xml;

use std::path::PathBuf;

use acquirer::{Acquirer, FilesystemAcquirer};
use clap::{Parser, Subcommand};
use config::Config;
use errors::Error;
use models::LoadMode;
use pipeline::Pipeline;
use profile::Profile;
use tracing::error;
use tracing_subscriber::fmt::format::FmtSpan;

/// Bulk ETL engine for loading the UniProtKB protein knowledge base into a relational database.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file; defaults to ./uniprot_etl.toml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: transform the source XML and load it into the database.
    Run {
        /// "swissprot", "trembl", or "all"
        #[arg(long, default_value = "all")]
        dataset: String,
        /// "full" or "delta"
        #[arg(long, default_value = "full")]
        mode: String,
    },

    /// Transform a source XML file into scratch TSVs without touching the database.
    Transform {
        path: PathBuf,
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value = "standard")]
        profile: String,
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Print the release version currently loaded into production, if any.
    Version,
}

fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_level(false)
        .init();
    database::install_instrumentation();

    std::process::exit(run());
}

fn run() -> i32 {
    let cli = Cli::parse();

    match execute(&cli) {
        Ok(()) => 0,
        Err(err @ Error::Config(_))
        | Err(err @ Error::InvalidMode(_))
        | Err(err @ Error::InvalidDataset(_))
        | Err(err @ Error::SourceFileMissing(_)) => {
            error!(%err, "configuration error");
            1
        }
        Err(err) => {
            error!(%err, "pipeline failed");
            2
        }
    }
}

fn execute(cli: &Cli) -> Result<(), Error> {
    match &cli.command {
        Commands::Run { dataset, mode } => {
            let config = Config::load(cli.config.as_deref())?;
            let mode: LoadMode = mode.parse()?;
            let acquirer = FilesystemAcquirer::new(&config.data_dir);
            let pipeline = Pipeline::new(&config, &acquirer)?;
            pipeline.run(dataset, mode)
        }

        Commands::Transform { path, out, profile, workers } => {
            let profile: Profile = profile.parse().map_err(Error::Config)?;
            let workers = workers.unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1));
            transform::transform(path, out, profile, workers)?;
            Ok(())
        }

        Commands::Version => {
            let config = Config::load(cli.config.as_deref())?;
            let pool = database::get_pool(&config)?;
            let loader = loader::Loader::new(pool, &config);
            match loader.get_current_release_version()? {
                Some(version) => println!("{version}"),
                None => println!("no release currently loaded"),
            }
            Ok(())
        }
    }
}
