//! `rw markers`: dump the marker layer the map would draw.

use super::open_controller;
use crate::output::{OutputMode, Renderable, pretty_kv, pretty_section, render_list};
use anyhow::Result;
use clap::Args;
use roadwatch_core::config::ProjectConfig;
use roadwatch_core::reconcile::{MarkerSpec, ViewMode};
use std::io::{self, Write};
use std::path::Path;

#[derive(Args, Debug)]
pub struct MarkersArgs {
    /// Render as the authority view (popups carry the status selector).
    #[arg(long)]
    pub authority: bool,

    /// Print each marker's popup HTML instead of the marker list.
    #[arg(long)]
    pub html: bool,
}

struct MarkerView(MarkerSpec);

impl Renderable for MarkerView {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        let m = &self.0;
        pretty_section(w, &format!("{}  {}", m.id, m.popup.title))?;
        pretty_kv(w, "Position", m.position.to_string())?;
        pretty_kv(w, "Fill", m.style.fill.hex())?;
        pretty_kv(w, "Status", m.popup.status.as_str())?;
        if m.popup.status_control.is_some() {
            pretty_kv(w, "Control", m.popup.select_element_id())?;
        }
        writeln!(w)
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut *w, &self.0)?;
        writeln!(w)
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        let m = &self.0;
        writeln!(
            w,
            "{}\t{}\t{}\t{}",
            m.id,
            m.position,
            m.style.fill.hex(),
            m.popup.status
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["ID", "POSITION", "FILL", "STATUS"]
    }
}

pub async fn run_markers(
    args: &MarkersArgs,
    config: &ProjectConfig,
    output: OutputMode,
    project_root: &Path,
) -> Result<()> {
    let mut ui = open_controller(project_root, config, None).await?;
    if args.authority && ui.view_mode() == ViewMode::Citizen {
        ui.toggle_view_mode().await?;
    }
    tracing::debug!(mode = %ui.view_mode(), markers = ui.map().marker_count(), "marker layer ready");

    let mut markers: Vec<MarkerSpec> = ui.map().markers().cloned().collect();
    markers.sort_by(|a, b| a.id.cmp(&b.id));

    if args.html {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        for marker in &markers {
            writeln!(out, "{}", marker.popup.to_html())?;
        }
        return Ok(());
    }

    let views: Vec<MarkerView> = markers.into_iter().map(MarkerView).collect();
    render_list(&views, output)?;
    Ok(())
}
