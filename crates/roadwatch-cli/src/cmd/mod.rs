pub mod completions;
pub mod init;
pub mod list;
pub mod markers;
pub mod report;
pub mod show;
pub mod status;

use crate::output::{Renderable, pretty_kv, pretty_section};
use anyhow::Result;
use roadwatch_core::config::{PROJECT_DIR, ProjectConfig};
use roadwatch_core::controller::{IssueInteractionController, ReportDefaults};
use roadwatch_core::error::ErrorCode;
use roadwatch_core::map::HeadlessMap;
use roadwatch_core::model::IssueRecord;
use roadwatch_core::photo::DataUrlEncoder;
use roadwatch_core::store::LocalIssueStore;
use roadwatch_core::store::kv::FileKv;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Controller wired to the on-disk store and a headless map.
pub type LocalController =
    IssueInteractionController<LocalIssueStore<FileKv>, HeadlessMap, DataUrlEncoder>;

/// A CLI-level failure that maps onto a stable error code.
#[derive(Debug)]
pub struct CodedError {
    pub code: ErrorCode,
    pub message: String,
}

impl std::fmt::Display for CodedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for CodedError {}

/// `.roadwatch/` under `project_root`, or an `E1001` error when absent.
pub fn require_project(project_root: &Path) -> Result<PathBuf> {
    let dir = project_root.join(PROJECT_DIR);
    if !dir.is_dir() {
        return Err(CodedError {
            code: ErrorCode::NotInitialized,
            message: format!("no {PROJECT_DIR}/ directory in {}", project_root.display()),
        }
        .into());
    }
    Ok(dir)
}

pub fn open_store(project_root: &Path, config: &ProjectConfig) -> Result<LocalIssueStore<FileKv>> {
    let dir = require_project(project_root)?;
    let kv = FileKv::new(dir, config.storage.lock_timeout());
    Ok(LocalIssueStore::with_key(kv, config.storage.key.clone()))
}

/// Open a controller on the project store and draw the initial markers.
pub async fn open_controller(
    project_root: &Path,
    config: &ProjectConfig,
    reporter: Option<String>,
) -> Result<LocalController> {
    let store = open_store(project_root, config)?;
    let map = HeadlessMap::new(config.map.center()?, config.map.zoom);
    let encoder = DataUrlEncoder::new(config.photo.max_bytes);
    let mut controller = IssueInteractionController::new(
        store,
        map,
        encoder,
        ReportDefaults::from_config(config, reporter),
    );
    controller.start().await?;
    Ok(controller)
}

/// One issue record, rendered for every output mode.
pub struct IssueView(pub IssueRecord);

impl Renderable for IssueView {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        let r = &self.0;
        pretty_section(w, &format!("{}  {}", r.id, r.issue_type))?;
        pretty_kv(w, "Status", r.status.as_str())?;
        pretty_kv(w, "Location", r.location.to_string())?;
        pretty_kv(w, "Reporter", &r.reported_by)?;
        pretty_kv(w, "Created", r.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string())?;
        if let Some(desc) = &r.description {
            pretty_kv(w, "Description", desc)?;
        }
        if let Some(photo) = &r.photo {
            let kind = photo.mime().unwrap_or("reference");
            pretty_kv(w, "Photo", format!("{kind} ({} bytes)", photo.as_str().len()))?;
        }
        writeln!(w)
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut *w, &self.0)?;
        writeln!(w)
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        let r = &self.0;
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}",
            r.id, r.status, r.issue_type, r.location, r.reported_by
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["ID", "STATUS", "TYPE", "LOCATION", "REPORTER"]
    }
}
