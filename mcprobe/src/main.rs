//! `mcprobe` binary entry point.

use clap::Parser;
use mcprobe::RunOutcome;
use mcprobe::cli::Cli;
use mcprobe::config::HarnessConfig;
use mcprobe::logging::init_tracing;
use mcprobe::report::render;
use miette::{IntoDiagnostic, miette};
use std::process::ExitCode;

/// Exit code for a run stopped with Ctrl-C (128 + SIGINT).
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> miette::Result<ExitCode> {
    let cli = Cli::parse();
    let config = HarnessConfig::from_cli(cli);

    if let Err(e) = init_tracing(&config.log_level, config.log_format) {
        eprintln!("Failed to init tracing: {e}");
    }

    let report = match mcprobe::run(&config).await? {
        RunOutcome::Completed(report) => report,
        RunOutcome::Interrupted => {
            eprintln!("Interrupted; the server was terminated.");
            return Ok(ExitCode::from(EXIT_INTERRUPTED));
        }
    };

    println!("{}", render(&report, config.report).into_diagnostic()?);

    if let Some(fatal) = &report.fatal {
        let step = report
            .fatal_step()
            .map_or_else(String::new, |s| format!(" at step {} ({})", s.index, s.name));
        let diagnostic = miette!(
            code = fatal.kind.clone(),
            "{}{step}: {}",
            fatal.kind,
            fatal.message
        );
        eprintln!("{diagnostic:?}");
        if let Some(stderr) = &fatal.stderr {
            eprintln!("--- server stderr ---");
            eprintln!("{}", stderr.trim_end());
            eprintln!("--- end of server stderr ---");
        }
    }

    Ok(if report.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
