//! Bridge inspection CLI
//!
//! Entry point for `bridge-inspect`. Parses CLI arguments and delegates to
//! the Inspector.

use clap::Parser as ClapParser;
use std::time::Duration;

use bridge_cli::{Assignment, Cli, CliError, CliResult, Inspector};
use value_bridge::BridgeConfig;

fn run(cli: &Cli) -> CliResult<String> {
    let config = match &cli.config {
        Some(path) => BridgeConfig::from_json_file(path)?,
        None => BridgeConfig::default(),
    };

    let source = match (&cli.file, &cli.eval) {
        (Some(path), _) => std::fs::read_to_string(path)?,
        (None, Some(inline)) => inline.clone(),
        (None, None) => return Err(CliError::NoInput),
    };
    let document: serde_json::Value = serde_json::from_str(&source)?;

    let assignments = cli
        .set
        .iter()
        .map(|arg| Assignment::parse(arg))
        .collect::<CliResult<Vec<_>>>()?;

    let inspector = Inspector::new(config);
    let report = inspector.inspect(
        &document,
        &assignments,
        cli.root,
        cli.leak_age_ms.map(Duration::from_millis),
    )?;

    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    Ok(rendered)
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_filter()))
        .init();

    match run(&cli) {
        Ok(report) => println!("{}", report),
        Err(CliError::NoInput) => {
            println!("bridge-inspect v{}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Usage:");
            println!("  bridge-inspect --file <FILE>     Bridge a JSON document");
            println!("  bridge-inspect --eval <JSON>     Bridge an inline JSON document");
            println!();
            println!("Run 'bridge-inspect --help' for more options.");
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
