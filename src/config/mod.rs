pub mod flow_config;

#[cfg(feature = "cli")]
pub mod cli;

#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "small-flows")]
#[command(about = "Run a tabular data flow described in a TOML file")]
pub struct CliConfig {
    /// Path to the flow configuration file
    #[arg(short, long, default_value = "flow.toml")]
    pub config: String,

    /// Override `output.path` from the configuration
    #[arg(long)]
    pub output_path: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log system stats around each stage")]
    pub monitor: bool,

    #[arg(long, help = "Run the flow and print a summary without writing output")]
    pub dry_run: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,
}
