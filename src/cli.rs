use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Clone)]
#[command(version, about = "Estimates how complete a construction project is from two photographs")]
pub struct Cli {
    /// Enable verbose logging
    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        global = true,
        help = "Enable verbose logging (-v for debug, -vv for trace)"
    )]
    pub verbose: u8,

    /// Path to the YAML configuration file
    #[arg(
        short = 'c',
        long = "config",
        value_name = "CONFIG_PATH",
        default_value = "config.yaml",
        global = true,
        help = "Configuration file path"
    )]
    pub config_path: PathBuf,

    /// API key for the model, takes precedence over the configuration file
    #[arg(long = "api-key", env = "GEMINI_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Clone)]
pub enum Command {
    /// Estimate completion from a photo of the current state and one of the finished target
    Estimate {
        /// Photo of the project as it is now
        current: PathBuf,
        /// Photo or rendering of the completed project
        complete: PathBuf,
        /// Number of times the model is asked (defaults to the configured value)
        #[arg(short = 'n', long, value_parser = clap::value_parser!(u32).range(1..))]
        runs: Option<u32>,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Serve the estimator over HTTP
    Serve {
        /// Address to listen on (defaults to the configured value)
        #[arg(short = 'l', long)]
        listen: Option<SocketAddr>,
    },
}
