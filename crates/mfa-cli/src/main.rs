// ─────────────────────────────────────────────────────────────────────
// SCPN MFA Core — Command-Line Runner
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! `mfa`: run a steel, plastics or cement model from a configuration file.
//!
//! **Usage:**
//! ```text
//! mfa <config.yml> [--input <dir>] [--output <dir>] [--verbose]
//! ```
//!
//! Exit codes: 0 on success, 2 on a mass-balance violation, 3 on missing or
//! malformed parameter data, 1 on any other error.

use clap::Parser;
use mfa_models::run_model;
use mfa_types::config::ModelConfig;
use mfa_types::error::MfaResult;
use std::path::PathBuf;
use std::process;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Run a material flow model.
#[derive(Parser)]
#[command(name = "mfa", version, about = "Run a global material flow model")]
struct Args {
    /// YAML or JSON run configuration.
    config: PathBuf,

    /// Overrides `input_data_path` of the configuration.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Overrides `output_path` of the configuration.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Debug-level logging (unless RUST_LOG is set).
    #[arg(short, long)]
    verbose: bool,
}

fn run(args: Args) -> MfaResult<()> {
    let mut config = ModelConfig::from_file(&args.config)?;
    if let Some(input) = args.input {
        config.input_data_path = input;
    }
    if let Some(output) = args.output {
        config.output_path = output;
    }
    info!(model = ?config.model_class, config = %args.config.display(), "starting run");

    let run = run_model(&config)?;
    info!(
        historic_residual = run.historic_balance.max_total(),
        future_residual = run.future_balance.max_total(),
        "mass balance closed"
    );
    if let Some(dir) = run.export_dir {
        println!("{}", dir.display());
    }
    Ok(())
}

fn main() {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if let Err(e) = run(args) {
        error!(error = %e, "run failed");
        process::exit(e.exit_code());
    }
}
