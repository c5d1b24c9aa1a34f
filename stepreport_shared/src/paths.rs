//! Filesystem locations used by the reporter.
//!
//! Three logical roots are resolved to absolute paths once and created on
//! first access. Creation is idempotent and tolerates other workers creating
//! the same directory concurrently.

use std::env;
use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, TimeZone};
use tracing::debug;

use crate::config::ReporterConfig;

/// Screenshot timestamp layout, e.g. `2026.10.18-09.41.07`.
pub const SCREENSHOT_TIMESTAMP_FORMAT: &str = "%Y.%m.%d-%H.%M.%S";

/// Resolved reporter directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    results: PathBuf,
    reports: PathBuf,
    test_results: PathBuf,
}

impl ReportPaths {
    pub fn new(results: &Path, reports: &Path, test_results: &Path) -> Self {
        Self {
            results: absolute(results),
            reports: absolute(reports),
            test_results: absolute(test_results),
        }
    }

    pub fn from_config(cfg: &ReporterConfig) -> Self {
        Self::new(
            Path::new(&cfg.results_dir),
            Path::new(&cfg.reports_dir),
            Path::new(&cfg.test_results_dir),
        )
    }

    /// Creates every root. Called once from the reporter's `on_begin`.
    pub fn init(&self) -> anyhow::Result<()> {
        for dir in [&self.results, &self.reports, &self.test_results] {
            ensure_dir(dir)?;
        }
        Ok(())
    }

    /// Screenshots and the HTML report.
    pub fn results_root(&self) -> anyhow::Result<&Path> {
        ensure_dir(&self.results)?;
        Ok(&self.results)
    }

    /// JSON exports.
    pub fn reports_root(&self) -> anyhow::Result<&Path> {
        ensure_dir(&self.reports)?;
        Ok(&self.reports)
    }

    /// Engine-owned output directory.
    pub fn test_results_root(&self) -> anyhow::Result<&Path> {
        ensure_dir(&self.test_results)?;
        Ok(&self.test_results)
    }

    /// Path of the results directory without touching the filesystem.
    pub fn results_dir(&self) -> &Path {
        &self.results
    }

    /// Full path for a screenshot file inside the results root.
    pub fn screenshot_path(&self, file_name: &str) -> anyhow::Result<PathBuf> {
        Ok(self.results_root()?.join(file_name))
    }
}

/// Recursively creates `dir`. Succeeds if it already exists.
pub fn ensure_dir(dir: &Path) -> anyhow::Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    // create_dir_all treats a concurrent creator winning the race as success.
    std::fs::create_dir_all(dir).with_context(|| format!("create directory {}", dir.display()))?;
    debug!(dir = %dir.display(), "Created directory");
    Ok(())
}

/// Canonical screenshot file name for a step:
/// `TS.<id-without-prefix>-<step>-<YYYY.MM.DD-HH.MM.SS>.png`.
pub fn screenshot_file_name<Tz>(test_id: &str, step_number: &str, at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!(
        "TS.{}-{}-{}.png",
        strip_id_prefix(test_id),
        step_number,
        at.format(SCREENSHOT_TIMESTAMP_FORMAT)
    )
}

/// `TS.2.1-05` -> `2.1-05`. Identifiers without a prefix are returned unchanged.
pub fn strip_id_prefix(test_id: &str) -> &str {
    match test_id.split_once('.') {
        Some((prefix, rest)) if !prefix.is_empty() && prefix.chars().all(char::is_alphabetic) => {
            rest
        }
        _ => test_id,
    }
}

fn absolute(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    };
    normalize(&joined)
}

fn normalize(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if let Some(Component::Normal(_)) = components.last() {
                    components.pop();
                }
            }
            other => components.push(other),
        }
    }
    components.into_iter().collect()
}
