//! Composite evaluator
//!
//! Builds regional composites from calibrated ELM runs and evaluates them
//! against gridded observation products.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use evaluator::{error_kind, load_config, LoggingConfig, Pipeline};

/// Composite evaluator
#[derive(Parser, Debug)]
#[command(name = "evaluator")]
#[command(about = "Build ELM region composites and compare them against observations")]
struct Args {
    /// Run configuration file
    #[arg(short, long, default_value = "evaluator.yaml", env = "EVALUATOR_CONFIG")]
    config: PathBuf,

    /// Log level (overrides the config file; RUST_LOG overrides both)
    #[arg(long)]
    log_level: Option<String>,

    /// Validate configuration and input files, then exit
    #[arg(long)]
    dry_run: bool,
}

fn main() -> ExitCode {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Config is needed before logging is up; report load failures on stderr
    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("evaluator: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.logging, args.log_level.as_deref());
    netcdf_io::silence_hdf5_errors();

    info!(
        config = %args.config.display(),
        variable = %config.variable,
        "Loaded evaluator configuration"
    );

    let pipeline = Pipeline::new(config);
    if let Err(e) = pipeline.check_resources() {
        error!(kind = error_kind(&e), "Input check failed: {:#}", e);
        return ExitCode::FAILURE;
    }

    if args.dry_run {
        info!("Dry run: configuration and inputs are valid");
        return ExitCode::SUCCESS;
    }

    match pipeline.run() {
        Ok(summary) => {
            info!(
                composites = summary.composites.len(),
                reports = summary.reports.len(),
                best_set_maps = summary.best_set_maps.len(),
                site_tables = summary.site_tables.len(),
                "Done"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(kind = error_kind(&e), "Evaluation failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(logging: &LoggingConfig, cli_level: Option<&str>) {
    let level = cli_level.unwrap_or(&logging.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = fmt().with_env_filter(filter).with_target(true).with_level(true);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}
