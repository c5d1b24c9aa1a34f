//! `stepreport_shared`
//!
//! Step-level reporter for end-to-end browser test runs.
//!
//! Design goals:
//! - Attribute every step to its own test, even when workers interleave.
//! - Degrade gracefully: missing metadata, unnumbered steps and absent
//!   screenshots never abort a report.
//! - Produce one self-contained HTML page per run.
//! - No `unsafe`.

pub mod collector;
pub mod config;
pub mod event;
pub mod metadata;
pub mod paths;
pub mod record;
pub mod test_report;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::collector::{Reporter, StepCollector};
    pub use crate::config::*;
    pub use crate::event::*;
    pub use crate::metadata::MetadataCatalog;
    pub use crate::paths::ReportPaths;
    pub use crate::record::*;
    pub use crate::test_report::{ReportBuilder, TestReport};
}
