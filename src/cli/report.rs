//! Report command for sts-wire.

use std::path::{Path, PathBuf};

use color_eyre::eyre::WrapErr;
use color_eyre::Result;

use super::version::DIVIDER;
use crate::report::find_reports;

/// Handle the `report` command.
///
/// Without a path, lists the reports of every instance under `base_dir`.
/// With one, prints it.
pub fn handle_report_command(base_dir: &Path, report: Option<PathBuf>) -> Result<()> {
    match report {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .wrap_err_with(|| format!("cannot read report {}", path.display()))?;
            println!("{}\n{}", DIVIDER, content);
        }
        None => {
            let reports = find_reports(base_dir)?;
            if reports.is_empty() {
                println!("==> No reports found in {}", base_dir.display());
                return Ok(());
            }
            println!("==> Available reports (sts-wire report <path>):");
            for report in reports {
                let folder = report
                    .parent()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                println!("  {}\tfolder -> {}", report.display(), folder);
            }
        }
    }
    Ok(())
}
