//! `rw show`: show one issue.

use super::{IssueView, open_store};
use crate::output::{OutputMode, render_item};
use anyhow::Result;
use clap::Args;
use roadwatch_core::config::ProjectConfig;
use roadwatch_core::error::StoreError;
use roadwatch_core::model::IssueId;
use roadwatch_core::store::IssueStore;
use std::path::Path;

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Issue ID (e.g. r_1717000000000_ab12cd).
    pub id: IssueId,
}

pub async fn run_show(
    args: &ShowArgs,
    config: &ProjectConfig,
    output: OutputMode,
    project_root: &Path,
) -> Result<()> {
    let store = open_store(project_root, config)?;
    let record = store
        .get(&args.id)
        .await?
        .ok_or_else(|| StoreError::NotFound { id: args.id.clone() })?;
    render_item(&IssueView(record), output)?;
    Ok(())
}
