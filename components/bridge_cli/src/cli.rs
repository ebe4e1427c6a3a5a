//! Command line arguments

use clap::Parser;

/// Inspect how a JSON document crosses the value bridge
#[derive(Parser, Debug, Clone)]
#[command(name = "bridge-inspect", version, about)]
pub struct Cli {
    /// JSON document to bridge
    #[arg(short, long, conflicts_with = "eval")]
    pub file: Option<String>,

    /// Inline JSON document to bridge
    #[arg(short, long)]
    pub eval: Option<String>,

    /// Bridge configuration file (JSON)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Property write applied through the bridge after bridging, as KEY=JSON
    #[arg(short, long = "set", value_name = "KEY=JSON")]
    pub set: Vec<String>,

    /// Root the bridged document
    #[arg(short, long)]
    pub root: bool,

    /// Leak scan threshold in milliseconds (defaults to the configured value)
    #[arg(long, value_name = "MS")]
    pub leak_age_ms: Option<u64>,

    /// Pretty-print the report
    #[arg(short, long)]
    pub pretty: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Default log filter for the requested verbosity.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    }
}
