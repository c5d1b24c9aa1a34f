//! Test lifecycle events.
//!
//! These mirror what the test engine hands its reporters: the test case, the
//! per-test result, the step that just finished, and the final run result.
//! `LifecycleEvent` is the serialized envelope used when events are recorded
//! to a JSON-lines log and replayed later.

use serde::{Deserialize, Serialize};

/// Step category the engine assigns to user-declared steps.
pub const USER_STEP_CATEGORY: &str = "test.step";

/// Where a test is declared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

/// A single test case as seen by the reporter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub title: String,
    pub location: Location,
}

impl TestCase {
    pub fn new(file: &str, title: &str) -> Self {
        TestCase {
            title: title.to_string(),
            location: Location {
                file: file.to_string(),
                line: None,
                column: None,
            },
        }
    }
}

/// Error attached to a failed step or test.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestError {
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// Outcome the engine reports for a test or a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TestOutcome {
    #[default]
    Passed,
    Failed,
    TimedOut,
    Skipped,
    Interrupted,
}

/// Per-test result handed to `on_step_end`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    #[serde(default)]
    pub status: TestOutcome,
    /// Milliseconds.
    #[serde(default)]
    pub duration: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TestError>,
}

/// A finished step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestStep {
    pub title: String,
    pub category: String,
    /// Milliseconds.
    #[serde(default)]
    pub duration: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TestError>,
}

impl TestStep {
    /// User-declared step that passed.
    pub fn user(title: &str, duration: u64) -> Self {
        TestStep {
            title: title.to_string(),
            category: USER_STEP_CATEGORY.to_string(),
            duration,
            error: None,
        }
    }

    /// User-declared step that failed with `message`.
    pub fn failed(title: &str, duration: u64, message: &str) -> Self {
        TestStep {
            error: Some(TestError {
                message: message.to_string(),
                stack: None,
            }),
            ..Self::user(title, duration)
        }
    }

    pub fn is_user_step(&self) -> bool {
        self.category == USER_STEP_CATEGORY
    }
}

/// Final result of the whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullResult {
    #[serde(default)]
    pub status: TestOutcome,
}

/// Serialized lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum LifecycleEvent {
    Begin,
    TestBegin {
        test: TestCase,
    },
    StepEnd {
        test: TestCase,
        #[serde(default)]
        result: TestResult,
        step: TestStep,
    },
    End {
        #[serde(default)]
        result: FullResult,
    },
}

/// Decodes one line of an event log. Blank lines decode to `None`.
pub fn decode_line(line: &str) -> serde_json::Result<Option<LifecycleEvent>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(line).map(Some)
}

/// Encodes an event as a single log line (no trailing newline).
pub fn encode_line(event: &LifecycleEvent) -> serde_json::Result<String> {
    serde_json::to_string(event)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_engine_style_step_end() {
        let line = r#"{"event":"stepEnd",
            "test":{"title":"TS.2.1-05 company details","location":{"file":"tests/TS.2.1-05.spec.ts","line":12}},
            "result":{"status":"failed","duration":900},
            "step":{"title":"Step 2: Save","category":"test.step","duration":31,"error":{"message":"boom"}}}"#;
        let event = decode_line(&line.replace('\n', " ")).unwrap().unwrap();
        match event {
            LifecycleEvent::StepEnd { test, result, step } => {
                assert_eq!(test.location.file, "tests/TS.2.1-05.spec.ts");
                assert_eq!(test.location.line, Some(12));
                assert_eq!(result.status, TestOutcome::Failed);
                assert!(step.is_user_step());
                assert_eq!(step.error.unwrap().message, "boom");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn missing_result_defaults() {
        let event = decode_line(r#"{"event":"end"}"#).unwrap().unwrap();
        assert_eq!(
            event,
            LifecycleEvent::End {
                result: FullResult::default()
            }
        );
    }

    #[test]
    fn blank_lines_are_skipped() {
        assert_eq!(decode_line("   ").unwrap(), None);
    }

    #[test]
    fn encoded_line_is_tagged() {
        let line = encode_line(&LifecycleEvent::TestBegin {
            test: TestCase::new("a.spec.ts", "TS.1.1-01"),
        })
        .unwrap();
        assert!(line.starts_with(r#"{"event":"testBegin""#));
        assert!(!line.contains('\n'));
    }

    #[test]
    fn framework_steps_are_not_user_steps() {
        let step = TestStep {
            title: "page.click".into(),
            category: "pw:api".into(),
            ..TestStep::default()
        };
        assert!(!step.is_user_step());
        assert!(TestStep::failed("x", 1, "e").is_user_step());
    }
}
