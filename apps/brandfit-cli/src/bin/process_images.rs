//! App icon by centered square crop, splash screen by cover-and-crop.

use std::process::ExitCode;

use anyhow::Result;
use brandfit_cli::{assets_dir, exit_code, init_logging, print_summary, print_working_dir, run_jobs};
use brandfit_core::AssetJob;

fn main() -> Result<ExitCode> {
    init_logging();
    let assets = assets_dir()?;
    print_working_dir(&assets);

    let jobs = [
        AssetJob::app_icon(assets.join("icon.jpeg"), assets.join("app_icon.png")),
        AssetJob::splash_cover(assets.join("splash.jpeg"), assets.join("splash.png")),
    ];
    let summary = run_jobs(&jobs);
    print_summary(&summary);
    Ok(exit_code(&summary))
}
