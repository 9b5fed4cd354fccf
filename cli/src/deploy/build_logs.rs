//! Image build log scanning and persistence

use std::path::PathBuf;

use chrono::Utc;
use tracing::debug;

use crate::errors::DeployError;
use crate::storage::layout::StorageLayout;

/// Markers that fail a build even when the builder exited cleanly
const ERROR_MARKERS: &[(&str, &str)] = &[
    ("ERROR: failed to solve", "A step in the image build failed"),
    ("npm ERR!", "npm failed while installing dependencies"),
    (
        "Cannot find module",
        "A module could not be resolved. Check that it is listed in your dependencies",
    ),
    (
        "ERR_PNPM_OUTDATED_LOCKFILE",
        "Your pnpm lockfile is out of date. Run `pnpm install` and commit the lockfile",
    ),
    (
        "No space left on device",
        "The builder ran out of disk space. Try again with --no-cache",
    ),
];

const WARNING_MARKERS: &[&str] = &["WARNING:", "npm WARN"];

/// Result of scanning captured build output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogScan {
    /// No error marker was found
    pub ok: bool,
    /// One-line description of the first error, empty when `ok`
    pub summary: String,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

/// Collect warning and error lines from build output
pub fn check_logs_for_warnings(logs: &str) -> LogScan {
    let mut warnings = Vec::new();
    let mut errors = Vec::new();

    for line in logs.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if ERROR_MARKERS.iter().any(|(marker, _)| line.contains(marker)) {
            errors.push(line.to_string());
        } else if WARNING_MARKERS.iter().any(|marker| line.contains(marker)) {
            warnings.push(line.to_string());
        }
    }

    let summary = match errors.len() {
        0 => String::new(),
        1 => format!("Build failed: {}", errors[0]),
        n => format!("Build failed with {} errors, first: {}", n, errors[0]),
    };

    LogScan {
        ok: errors.is_empty(),
        summary,
        warnings,
        errors,
    }
}

/// Hints for every known error marker present in the logs
pub fn check_logs_for_errors(logs: &str) -> Vec<String> {
    ERROR_MARKERS
        .iter()
        .filter(|(marker, _)| logs.contains(marker))
        .map(|(_, hint)| hint.to_string())
        .collect()
}

/// Write logs to `<build-logs>/<short_code>-<timestamp>.log`
pub async fn save_logs(
    layout: &StorageLayout,
    short_code: &str,
    logs: &str,
) -> Result<PathBuf, DeployError> {
    let dir = layout.build_logs_dir();
    dir.create().await?;

    let name = format!("{}-{}.log", short_code, Utc::now().format("%Y%m%dT%H%M%S"));
    let file = dir.file(&name);
    file.write_string(logs).await?;

    debug!(path = %file.path().display(), "Saved build logs");
    Ok(file.path().to_path_buf())
}
