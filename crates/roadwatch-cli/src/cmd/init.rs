//! `rw init`: create the `.roadwatch/` project directory.

use crate::output::{OutputMode, render};
use anyhow::{Context as _, Result};
use clap::Args;
use roadwatch_core::config::{PROJECT_DIR, ProjectConfig, render_project_config};
use serde::Serialize;
use std::io::Write as _;
use std::path::Path;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Rewrite config.toml even if `.roadwatch/` already exists.
    #[arg(long)]
    pub force: bool,
}

const GITIGNORE: &str = ".*.lock\n*.tmp\n";

#[derive(Debug, Serialize)]
struct InitResult {
    ok: bool,
    path: String,
    storage_key: String,
}

/// Execute `rw init`. Creates:
///
/// ```text
/// .roadwatch/
///   config.toml   (defaults, ready to edit)
///   .gitignore    (lock and temp files)
/// ```
///
/// The issue collection itself is created on the first report.
pub fn run_init(args: &InitArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let dir = project_root.join(PROJECT_DIR);
    if dir.exists() && !args.force {
        anyhow::bail!("{PROJECT_DIR}/ already exists. Use `rw init --force` to reinitialize.");
    }

    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let config = ProjectConfig::default();
    let config_path = dir.join("config.toml");
    std::fs::write(&config_path, render_project_config(&config)?)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    let gitignore = dir.join(".gitignore");
    std::fs::write(&gitignore, GITIGNORE)
        .with_context(|| format!("Failed to write {}", gitignore.display()))?;

    tracing::info!(path = %dir.display(), "project initialized");

    let result = InitResult {
        ok: true,
        path: dir.display().to_string(),
        storage_key: config.storage.key,
    };
    render(output, &result, |r, w| {
        writeln!(w, "Initialized roadwatch project in {}", r.path)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_writes_parseable_config() {
        let dir = tempfile::tempdir().unwrap();
        run_init(&InitArgs { force: false }, OutputMode::Text, dir.path()).unwrap();

        let cfg = roadwatch_core::config::load_project_config(dir.path()).unwrap();
        assert_eq!(cfg, ProjectConfig::default());
        assert!(dir.path().join(".roadwatch/.gitignore").exists());
    }

    #[test]
    fn second_init_requires_force() {
        let dir = tempfile::tempdir().unwrap();
        run_init(&InitArgs { force: false }, OutputMode::Text, dir.path()).unwrap();
        assert!(run_init(&InitArgs { force: false }, OutputMode::Text, dir.path()).is_err());
        run_init(&InitArgs { force: true }, OutputMode::Text, dir.path()).unwrap();
    }
}
