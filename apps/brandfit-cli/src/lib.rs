//! Shared driver code for the asset binaries: logging setup, running jobs,
//! console reporting and the exit policy.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use brandfit_core::{AssetJob, JobOutcome, TelemetrySink};
use brandfit_telemetry::sink_from_env;
use tracing_subscriber::EnvFilter;

/// Where the drivers read and write assets, relative to the working directory.
pub const ASSETS_DIR: &str = "assets/images";

pub const STRICT_ENV: &str = "BRANDFIT_STRICT";

pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// The assets directory under the current working directory.
pub fn assets_dir() -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("resolving working directory")?;
    Ok(cwd.join(ASSETS_DIR))
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub outcomes: Vec<JobOutcome>,
}

impl RunSummary {
    pub fn any_failed(&self) -> bool {
        self.outcomes.iter().any(|outcome| !outcome.succeeded)
    }

    pub fn generated(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.report.as_ref())
            .map(|report| format!("{} ({})", report.output.display(), report.output_size))
            .collect()
    }
}

/// Run every job in order. A failing job never stops the ones after it.
pub fn run_jobs(jobs: &[AssetJob]) -> RunSummary {
    let telemetry = sink_from_env();
    let telemetry_ref = telemetry.as_ref().map(|sink| sink.as_ref());
    run_jobs_with_telemetry(jobs, telemetry_ref)
}

pub fn run_jobs_with_telemetry(
    jobs: &[AssetJob],
    telemetry: Option<&dyn TelemetrySink>,
) -> RunSummary {
    let mut summary = RunSummary::default();
    for job in jobs {
        println!("Processing {}: {}", job.name, job.input.display());
        let outcome = brandfit_pipeline::process(job, telemetry);
        for line in describe_outcome(&outcome) {
            println!("{}", line);
        }
        println!();
        summary.outcomes.push(outcome);
    }
    summary
}

/// Human-readable lines for one job; decoration only, not parsed by anything.
pub fn describe_outcome(outcome: &JobOutcome) -> Vec<String> {
    if let Some(report) = &outcome.report {
        let mut lines = vec![
            format!("  Original size: {}", report.source_size),
            format!("  Fitted to: {} using {}", report.fitted_size, report.policy),
        ];
        if let Some(font) = &report.font_used {
            lines.push(format!("  Label font: {}", font));
        }
        lines.push(format!("  Saved to: {} ({})", report.output.display(), report.output_size));
        lines.push(format!("  [ok] {} processed successfully", outcome.job));
        return lines;
    }
    match &outcome.error {
        Some(info) if outcome.skipped() => vec![format!("  [skip] {}", info.message)],
        Some(info) => vec![format!("  [error] {} failed: {}", outcome.job, info.message)],
        None => vec![format!("  [error] {} produced no result", outcome.job)],
    }
}

pub fn print_summary(summary: &RunSummary) {
    let generated = summary.generated();
    if !generated.is_empty() {
        println!("Generated files:");
        for file in &generated {
            println!("  - {}", file);
        }
    }
    let failed = summary.outcomes.iter().filter(|outcome| !outcome.succeeded).count();
    if failed > 0 {
        println!("{} of {} asset(s) were not produced", failed, summary.outcomes.len());
    } else {
        println!("All assets processed successfully");
    }
}

pub fn strict_from_env() -> bool {
    std::env::var(STRICT_ENV)
        .map(|value| parse_flag(&value))
        .unwrap_or(false)
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Exit status for a finished run: failures only surface when `strict` is set.
pub fn exit_status(summary: &RunSummary, strict: bool) -> u8 {
    if strict && summary.any_failed() {
        1
    } else {
        0
    }
}

pub fn exit_code(summary: &RunSummary) -> ExitCode {
    ExitCode::from(exit_status(summary, strict_from_env()))
}

pub fn print_working_dir(dir: &Path) {
    println!("Working directory: {}", dir.display());
    println!();
}
