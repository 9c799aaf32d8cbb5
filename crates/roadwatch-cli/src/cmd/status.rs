//! `rw status`: authority status update for one issue.

use super::{IssueView, LocalController, open_controller};
use crate::output::{OutputMode, render_item};
use anyhow::Result;
use clap::Args;
use roadwatch_core::config::ProjectConfig;
use roadwatch_core::error::StoreError;
use roadwatch_core::model::{IssueId, IssueRecord, IssueStatus};
use roadwatch_core::reconcile::ViewMode;
use std::path::Path;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Issue ID.
    pub id: IssueId,

    /// New status: received, "in progress" (or in_progress), resolved.
    pub status: IssueStatus,
}

/// Switch to authority view, apply the update from the marker popup, and
/// let the change event redraw the marker.
pub async fn run_status(
    args: &StatusArgs,
    config: &ProjectConfig,
    output: OutputMode,
    project_root: &Path,
) -> Result<()> {
    let mut ui = open_controller(project_root, config, None).await?;
    let record = apply_status(&mut ui, &args.id, args.status).await?;
    render_item(&IssueView(record), output)?;
    Ok(())
}

/// Open the issue's authority popup and run its status control.
async fn apply_status(
    ui: &mut LocalController,
    id: &IssueId,
    status: IssueStatus,
) -> Result<IssueRecord> {
    if ui.view_mode() != ViewMode::Authority {
        ui.toggle_view_mode().await?;
    }

    let popup = ui.open_popup(id).await?;
    let Some(control) = popup.and_then(|popup| popup.status_control) else {
        tracing::warn!(%id, "no marker for issue");
        return Err(StoreError::NotFound { id: id.clone() }.into());
    };

    let record = ui.apply_popup_action(&control.action, status).await?;
    ui.pump_changes();
    tracing::info!(id = %record.id, status = %record.status, "status updated");
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::open_store;
    use roadwatch_core::config::PROJECT_DIR;
    use roadwatch_core::model::{IssueDraft, LatLng};
    use roadwatch_core::reconcile::MarkerColor;
    use tempfile::TempDir;

    fn project() -> (TempDir, ProjectConfig) {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(PROJECT_DIR)).unwrap();
        (dir, ProjectConfig::default())
    }

    #[tokio::test]
    async fn popup_control_updates_stored_status() {
        let (dir, config) = project();
        let store = open_store(dir.path(), &config).unwrap();
        let created = store
            .create_record(IssueDraft::new("Pothole", LatLng::new(19.0, 72.8).unwrap()))
            .unwrap();

        let mut ui = open_controller(dir.path(), &config, None).await.unwrap();
        let record = apply_status(&mut ui, &created.id, IssueStatus::Resolved)
            .await
            .unwrap();

        assert_eq!(record.status, IssueStatus::Resolved);
        assert_eq!(ui.view_mode(), ViewMode::Authority);
        let marker = ui.map().marker_for(&created.id).unwrap();
        assert_eq!(marker.style.fill, MarkerColor::Green);
        assert_eq!(store.records().unwrap()[0].status, IssueStatus::Resolved);
    }

    #[tokio::test]
    async fn untracked_issue_is_not_found() {
        let (dir, config) = project();
        let mut ui = open_controller(dir.path(), &config, None).await.unwrap();

        let missing = IssueId::new_unchecked("r_0_gone00");
        let err = apply_status(&mut ui, &missing, IssueStatus::Resolved)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::NotFound { .. })
        ));
    }
}
