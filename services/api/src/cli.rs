use std::io::ErrorKind;
use std::path::PathBuf;

use crate::server;
use clap::{Args, Parser, Subcommand};
use terrarisk::config::AppConfig;
use terrarisk::dataset::DatasetAccessor;
use terrarisk::error::AppError;
use terrarisk::ranking::compute_platform_ranking;

#[derive(Parser, Debug)]
#[command(
    name = "TerraRisk Workshop Engine",
    about = "Run the TerraRisk municipal risk workshop service from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Print the platform ranking for a dataset and exit
    Rank(RankArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct RankArgs {
    /// Path to the municipal indicators CSV (defaults to the configured dataset)
    #[arg(long)]
    pub(crate) dataset: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Rank(args) => run_rank(args),
    }
}

fn run_rank(args: RankArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let path = args.dataset.unwrap_or(config.workshop.dataset_path);
    let dataset = DatasetAccessor::from_path(&path)?;
    let ranking = compute_platform_ranking(&dataset);
    let rendered = serde_json::to_string_pretty(&ranking)
        .map_err(|err| AppError::Io(std::io::Error::new(ErrorKind::InvalidData, err)))?;
    println!("{rendered}");
    Ok(())
}
