//! `rw report`: file a new road issue through the report form.

use super::{IssueView, open_controller};
use crate::output::{OutputMode, render_item};
use anyhow::Result;
use clap::Args;
use roadwatch_core::config::ProjectConfig;
use roadwatch_core::photo::PhotoFile;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Issue category (defaults to `[report] default_type`).
    #[arg(short = 't', long = "type")]
    pub issue_type: Option<String>,

    /// Free-text description.
    #[arg(short, long)]
    pub description: Option<String>,

    /// Location as "lat, lng" (defaults to the configured map center).
    #[arg(long, allow_hyphen_values = true)]
    pub at: Option<String>,

    /// Photo file to embed in the report.
    #[arg(long)]
    pub photo: Option<PathBuf>,
}

/// Fill the form the way a user would, then submit it.
pub async fn run_report(
    args: &ReportArgs,
    reporter: String,
    config: &ProjectConfig,
    output: OutputMode,
    project_root: &Path,
) -> Result<()> {
    if let Some(kind) = &args.issue_type {
        if !config
            .report
            .issue_types
            .iter()
            .any(|known| known.eq_ignore_ascii_case(kind.trim()))
        {
            tracing::warn!(issue_type = %kind, "issue type is not in [report] issue_types");
        }
    }

    let mut ui = open_controller(project_root, config, Some(reporter)).await?;
    ui.open_report_modal();

    let form = ui.form_mut();
    if let Some(kind) = &args.issue_type {
        form.issue_type.clone_from(kind);
    }
    if let Some(desc) = &args.description {
        form.description.clone_from(desc);
    }
    if let Some(at) = &args.at {
        form.location_text.clone_from(at);
    }
    form.photo = args.photo.as_ref().map(PhotoFile::new);

    let record = ui.submit_report().await?;
    ui.pump_changes();
    tracing::debug!(markers = ui.map().marker_count(), "report submitted");

    render_item(&IssueView(record), output)?;
    Ok(())
}
