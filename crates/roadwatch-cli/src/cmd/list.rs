//! `rw list`: list reported issues.

use super::{IssueView, open_store};
use crate::output::{OutputMode, render_list};
use anyhow::Result;
use clap::Args;
use roadwatch_core::config::ProjectConfig;
use roadwatch_core::model::IssueStatus;
use roadwatch_core::store::IssueStore;
use std::path::Path;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only show issues with this status (received, "in progress", resolved).
    #[arg(short, long)]
    pub status: Option<IssueStatus>,

    /// Only show issues of this type (case-insensitive).
    #[arg(short = 't', long = "type")]
    pub issue_type: Option<String>,

    /// Maximum issues to show.
    #[arg(short = 'n', long, default_value = "50")]
    pub limit: usize,
}

pub async fn run_list(
    args: &ListArgs,
    config: &ProjectConfig,
    output: OutputMode,
    project_root: &Path,
) -> Result<()> {
    let store = open_store(project_root, config)?;
    let items: Vec<IssueView> = store
        .list()
        .await?
        .into_iter()
        .filter(|r| args.status.is_none_or(|s| r.status == s))
        .filter(|r| {
            args.issue_type
                .as_deref()
                .is_none_or(|t| r.issue_type.eq_ignore_ascii_case(t.trim()))
        })
        .take(args.limit)
        .map(IssueView)
        .collect();

    render_list(&items, output)?;
    Ok(())
}
