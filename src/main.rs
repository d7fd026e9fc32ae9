//! APK Inspect - command line entry point
//!
//! Prints exactly one JSON document on standard output; logs go to
//! standard error.

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use clap::error::ErrorKind;
use clap::Parser;
use serde::Serialize;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use apk_inspect::cli::Args;
use apk_inspect::core::{InspectConfig, InspectError, APP_NAME, VERSION};
use apk_inspect::report::{resolve_input, AnalysisReport, FailureReport, ReportAssembler};

/// Environment variable holding a tracing filter directive
const LOG_ENV: &str = "APK_INSPECT_LOG";

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("{}", e.render());
            return fail(&InspectError::usage(APP_NAME), true);
        }
    };
    let Some(apk) = args.apk else {
        return fail(&InspectError::usage(APP_NAME), true);
    };

    let config = match InspectConfig::load() {
        Ok(config) => config,
        Err(e) => return fail(&e, true),
    };
    init_logging(&config);
    debug!("{} v{} starting", APP_NAME, VERSION);

    match run(&apk, &config) {
        Ok(report) => {
            if let Err(e) = emit(&report, config.pretty) {
                error!("Failed to write report: {}", e);
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Analysis failed: {:#}", e);
            let code = e.downcast_ref::<InspectError>().map_or(1, InspectError::exit_code);
            if let Err(e) = emit(&FailureReport::new(&e), config.pretty) {
                error!("Failed to write report: {}", e);
            }
            ExitCode::from(code as u8)
        }
    }
}

fn init_logging(config: &InspectConfig) {
    let directive = std::env::var(LOG_ENV).unwrap_or_else(|_| config.log_level.clone());
    let env_filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Resolve the input and analyze it; panics become internal errors
fn run(apk: &Path, config: &InspectConfig) -> Result<AnalysisReport> {
    let path = resolve_input(apk)?;
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| ReportAssembler::new(config).analyze(&path)));
    match outcome {
        Ok(report) => Ok(report?),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "analysis panicked".to_string());
            Err(InspectError::Internal(message).into())
        }
    }
}

fn emit<T: Serialize>(value: &T, pretty: bool) -> serde_json::Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", json);
    Ok(())
}

fn fail(error: &InspectError, pretty: bool) -> ExitCode {
    if let Err(e) = emit(&FailureReport::new(error), pretty) {
        eprintln!("Failed to write report: {}", e);
    }
    ExitCode::from(error.exit_code() as u8)
}
