use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "leaf-disease-predictor",
    version,
    about = "Leaf disease severity from leaf temperature and wetness in InfluxDB",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one batch pass over every configured mapping.
    Run(RunArgs),
}

#[derive(Args)]
pub struct RunArgs {
    /// YAML configuration file.
    pub configuration_file: PathBuf,
}
