//! Command-line arguments.

use std::path::PathBuf;

use anyhow::bail;
use stepreport_shared::config::{ReporterConfig, SortOrder};

use crate::replay::LogSource;

pub const USAGE: &str = "Usage: stepreport [--config <file>] [--metadata <file>] [--results-dir <dir>] \
[--reports-dir <dir>] [--title <text>] [--natural-sort] <event-log>... (use - for stdin)";

/// Parsed flags. Unset options keep the config file's values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliArgs {
    pub config: Option<PathBuf>,
    pub metadata: Option<String>,
    pub results_dir: Option<String>,
    pub reports_dir: Option<String>,
    pub title: Option<String>,
    pub natural_sort: bool,
    pub logs: Vec<LogSource>,
    pub help: bool,
}

impl CliArgs {
    /// Parses arguments, excluding the program name.
    pub fn parse<I>(args: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut out = CliArgs::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => out.config = Some(PathBuf::from(value(&mut args, &arg)?)),
                "--metadata" => out.metadata = Some(value(&mut args, &arg)?),
                "--results-dir" => out.results_dir = Some(value(&mut args, &arg)?),
                "--reports-dir" => out.reports_dir = Some(value(&mut args, &arg)?),
                "--title" => out.title = Some(value(&mut args, &arg)?),
                "--natural-sort" => out.natural_sort = true,
                "-h" | "--help" => out.help = true,
                "-" => out.logs.push(LogSource::Stdin),
                flag if flag.starts_with("--") => bail!("unknown flag {flag}\n{USAGE}"),
                path => out.logs.push(LogSource::File(PathBuf::from(path))),
            }
        }
        if out.logs.is_empty() {
            out.logs.push(LogSource::Stdin);
        }
        Ok(out)
    }

    /// Config file (if any) with flag overrides applied.
    pub fn resolve_config(&self) -> anyhow::Result<ReporterConfig> {
        let mut cfg = match &self.config {
            Some(path) => ReporterConfig::load(path)?,
            None => ReporterConfig::default(),
        };
        if let Some(metadata) = &self.metadata {
            cfg.metadata_path = metadata.clone();
        }
        if let Some(dir) = &self.results_dir {
            cfg.results_dir = dir.clone();
        }
        if let Some(dir) = &self.reports_dir {
            cfg.reports_dir = dir.clone();
        }
        if let Some(title) = &self.title {
            cfg.title = title.clone();
        }
        if self.natural_sort {
            cfg.sort_order = SortOrder::Natural;
        }
        Ok(cfg)
    }
}

fn value(args: &mut impl Iterator<Item = String>, flag: &str) -> anyhow::Result<String> {
    match args.next() {
        Some(v) => Ok(v),
        None => bail!("{flag} needs a value\n{USAGE}"),
    }
}
