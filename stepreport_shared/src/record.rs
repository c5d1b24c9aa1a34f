//! Normalized step records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fallback when no metadata rule matches a step title.
pub const DEFAULT_EXPECTED_RESULT: &str = "Step completes without errors";
/// Actual result of a step that finished without error.
pub const AS_EXPECTED: &str = "As expected";
/// Actual result of a manifest step that never ran.
pub const NOT_EXECUTED: &str = "Not executed";
/// Trailing marker on step titles whose screenshot is the point of the step.
pub const SCREENSHOT_MARKER: &str = "[screenshot]";

/// Step outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Passed,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn css_class(&self) -> &'static str {
        match self {
            StepStatus::Passed => "passed",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StepStatus::Passed => "Passed",
            StepStatus::Failed => "Failed",
            StepStatus::Skipped => "Skipped",
        }
    }
}

/// One reported test step. Immutable once appended to the collector log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub test_id: String,
    pub step_number: String,
    pub procedure: String,
    pub expected_result: String,
    pub actual_result: String,
    pub screenshots: Vec<String>,
    pub status: StepStatus,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl StepRecord {
    /// Placeholder for a manifest step that has no executed counterpart.
    pub fn not_executed(test_id: &str, step_number: &str, procedure: &str, expected: &str) -> Self {
        StepRecord {
            test_id: test_id.to_string(),
            step_number: step_number.to_string(),
            procedure: procedure.to_string(),
            expected_result: expected.to_string(),
            actual_result: NOT_EXECUTED.to_string(),
            screenshots: Vec::new(),
            status: StepStatus::Skipped,
            duration_ms: 0,
            timestamp: Utc::now(),
        }
    }

    pub fn is_screenshot_check(&self) -> bool {
        self.procedure.trim_end().ends_with(SCREENSHOT_MARKER)
    }

    /// Numeric value of the step number, for ordering.
    pub fn step_ordinal(&self) -> Option<u32> {
        self.step_number.parse().ok()
    }
}

/// Pads purely numeric step numbers to two digits: `"1"` -> `"01"`.
/// Non-numeric values are returned trimmed.
pub fn normalize_step_number(raw: &str) -> String {
    let raw = raw.trim();
    match raw.parse::<u32>() {
        Ok(n) => format!("{n:02}"),
        Err(_) => raw.to_string(),
    }
}
