//! JSON report output.
//!
//! Reports are grouped by the UTC date they were generated on and named
//! after the topic:
//!
//! ```text
//! json_output_dir/
//! └── 2026-01-14/
//!     ├── ai-chips.json
//!     └── quantum-computing.json
//! ```
//!
//! Running the same topic twice on one day replaces the earlier report.

use std::path::PathBuf;
use tokio::fs;
use tracing::{error, info, instrument};

use crate::error::Result;
use crate::models::ResearchReport;
use crate::utils::slugify;

/// Where `report` is written under `json_output_dir`.
pub fn report_path(report: &ResearchReport, json_output_dir: &str) -> PathBuf {
    let date = report.generated_at.date_naive().to_string();
    PathBuf::from(json_output_dir)
        .join(date)
        .join(format!("{}.json", slugify(&report.topic)))
}

/// Write `report` as pretty-printed JSON, creating the date directory if
/// needed. Returns the path written.
#[instrument(level = "info", skip_all, fields(json_output_dir = %json_output_dir))]
pub async fn write_report(report: &ResearchReport, json_output_dir: &str) -> Result<PathBuf> {
    let json = serde_json::to_string_pretty(report)?;
    let path = report_path(report, json_output_dir);

    if let Some(dir) = path.parent() {
        info!(dir = %dir.display(), "Ensuring JSON directory exists");
        if let Err(e) = fs::create_dir_all(dir).await {
            error!(dir = %dir.display(), error = %e, "Failed to create JSON dir");
            return Err(e.into());
        }
    }

    info!(path = %path.display(), "Writing JSON");
    fs::write(&path, json).await?;
    info!(path = %path.display(), articles = report.article_count, "Wrote research report");

    Ok(path)
}
