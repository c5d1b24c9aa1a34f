//! `stepreport_cli`
//!
//! Offline driver for the step reporter:
//! - Reads recorded lifecycle event logs (JSON lines), one per worker
//! - Funnels them through a single channel into one reporter
//! - Writes the HTML report when every log is drained

pub mod args;
pub mod replay;

pub use args::CliArgs;
pub use replay::{replay, LogSource, ReplaySummary};
