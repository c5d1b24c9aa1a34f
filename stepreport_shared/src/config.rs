//! Configuration system.
//!
//! Loads reporter configuration from JSON strings/files. Every field has a
//! default, so an empty object (or no file at all) is a valid configuration.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// How test groups are ordered in the report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Plain string ordering: `TS.2.10-01` sorts before `TS.2.2-01`.
    #[default]
    Lexical,
    /// Digit runs compare by magnitude: `TS.2.2-01` sorts before `TS.2.10-01`.
    Natural,
}

/// Root reporter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReporterConfig {
    /// Screenshots land here; the HTML report is written next to them.
    #[serde(default = "default_results_dir")]
    pub results_dir: String,
    /// Machine-readable exports (JSON summary).
    #[serde(default = "default_reports_dir")]
    pub reports_dir: String,
    /// Output directory owned by the test engine.
    #[serde(default = "default_test_results_dir")]
    pub test_results_dir: String,
    /// Optional test metadata descriptor.
    #[serde(default = "default_metadata_path")]
    pub metadata_path: String,
    #[serde(default = "default_report_file_name")]
    pub report_file_name: String,
    #[serde(default = "default_summary_file_name")]
    pub summary_file_name: String,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub sort_order: SortOrder,
    /// Actual-result text longer than this many characters is truncated in the table.
    #[serde(default = "default_truncate_at")]
    pub truncate_at: usize,
}

fn default_results_dir() -> String {
    "test-results/screenshots".to_string()
}

fn default_reports_dir() -> String {
    "test-reports".to_string()
}

fn default_test_results_dir() -> String {
    "test-results".to_string()
}

fn default_metadata_path() -> String {
    "test-metadata.json".to_string()
}

fn default_report_file_name() -> String {
    "test-report.html".to_string()
}

fn default_summary_file_name() -> String {
    "test-summary.json".to_string()
}

fn default_title() -> String {
    "Document Management E2E Tests".to_string()
}

fn default_truncate_at() -> usize {
    120
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            results_dir: default_results_dir(),
            reports_dir: default_reports_dir(),
            test_results_dir: default_test_results_dir(),
            metadata_path: default_metadata_path(),
            report_file_name: default_report_file_name(),
            summary_file_name: default_summary_file_name(),
            title: default_title(),
            subtitle: String::new(),
            sort_order: SortOrder::default(),
            truncate_at: default_truncate_at(),
        }
    }
}

impl ReporterConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Reads and parses a config file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("parse config {}", path.display()))
    }
}
