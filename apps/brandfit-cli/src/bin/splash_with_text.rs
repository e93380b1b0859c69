//! Splash screen with the tagline rendered under the image.

use std::process::ExitCode;

use anyhow::Result;
use brandfit_cli::{assets_dir, exit_code, init_logging, print_summary, print_working_dir, run_jobs};
use brandfit_core::AssetJob;

const TAGLINE: &str = "Connecting Africa Through Trade and Trust";

fn main() -> Result<ExitCode> {
    init_logging();
    let assets = assets_dir()?;
    print_working_dir(&assets);

    let job = AssetJob::splash_with_text(
        assets.join("splash.png"),
        assets.join("splash_with_text.png"),
        TAGLINE,
    );
    tracing::info!(label = TAGLINE, "rendering splash with text");
    let summary = run_jobs(std::slice::from_ref(&job));
    print_summary(&summary);
    Ok(exit_code(&summary))
}
