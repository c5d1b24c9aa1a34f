//! Step collector: the reporter that turns lifecycle events into step records.
//!
//! Per-test state is keyed by the test's own identity (source file + title),
//! never by a shared "current test" field, so steps from tests running in
//! different workers are attributed to their owners even when events
//! interleave. All state sits behind one mutex; callbacks may come from any
//! thread.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use regex::Regex;
use tracing::{debug, error, info, warn};

use crate::config::ReporterConfig;
use crate::event::{FullResult, TestCase, TestResult, TestStep};
use crate::metadata::MetadataCatalog;
use crate::paths::{strip_id_prefix, ReportPaths};
use crate::record::{StepRecord, StepStatus, AS_EXPECTED};
use crate::test_report::{ReportBuilder, RunStats};

static TEST_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"TS\.(\d+\.\d+-\d+)").expect("test id pattern"));
static STEP_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bstep\s+(\d+)\s*:").expect("step label pattern"));
static LEADING_ORDINAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)\s*[.):]").expect("ordinal pattern"));

/// Callbacks the test engine invokes on its reporters.
pub trait Reporter: Send + Sync {
    fn on_begin(&self) {}
    fn on_test_begin(&self, test: &TestCase);
    fn on_step_end(&self, test: &TestCase, result: &TestResult, step: &TestStep);
    fn on_end(&self, result: &FullResult);
}

/// Reporter lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
    Ended,
}

/// Files written by [`StepCollector::finish`].
#[derive(Debug, Clone)]
pub struct ReportOutcome {
    pub html_path: PathBuf,
    pub json_path: Option<PathBuf>,
    pub stats: RunStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TestKey {
    file: String,
    title: String,
}

impl TestKey {
    fn of(test: &TestCase) -> Self {
        TestKey {
            file: test.location.file.clone(),
            title: test.title.clone(),
        }
    }
}

#[derive(Debug)]
struct CollectorState {
    phase: Phase,
    test_ids: HashMap<TestKey, String>,
    // Last id seen per source file.
    file_ids: HashMap<String, String>,
    used_steps: HashMap<String, BTreeSet<u32>>,
    records: Vec<StepRecord>,
}

impl CollectorState {
    fn new() -> Self {
        CollectorState {
            phase: Phase::Idle,
            test_ids: HashMap::new(),
            file_ids: HashMap::new(),
            used_steps: HashMap::new(),
            records: Vec::new(),
        }
    }

    fn remember(&mut self, test: &TestCase, test_id: &str) {
        self.test_ids.insert(TestKey::of(test), test_id.to_string());
        self.file_ids
            .insert(test.location.file.clone(), test_id.to_string());
    }
}

/// Collects step records during a run and writes the report at the end.
#[derive(Debug)]
pub struct StepCollector {
    config: ReporterConfig,
    paths: ReportPaths,
    catalog: MetadataCatalog,
    state: Mutex<CollectorState>,
}

impl StepCollector {
    /// Builds a collector from config, loading metadata from `metadata_path`.
    pub fn new(config: ReporterConfig) -> Self {
        let catalog = MetadataCatalog::load(Path::new(&config.metadata_path));
        let paths = ReportPaths::from_config(&config);
        Self::with_parts(config, paths, catalog)
    }

    pub fn with_parts(config: ReporterConfig, paths: ReportPaths, catalog: MetadataCatalog) -> Self {
        StepCollector {
            config,
            paths,
            catalog,
            state: Mutex::new(CollectorState::new()),
        }
    }

    pub fn paths(&self) -> &ReportPaths {
        &self.paths
    }

    pub fn catalog(&self) -> &MetadataCatalog {
        &self.catalog
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    /// Snapshot of the records appended so far.
    pub fn records(&self) -> Vec<StepRecord> {
        self.lock().records.clone()
    }

    /// Stops accepting steps, builds the report and writes it. The HTML lands
    /// in the results root next to the screenshots; the JSON summary in the
    /// reports root is best-effort.
    pub fn finish(&self, result: &FullResult) -> anyhow::Result<ReportOutcome> {
        let records = {
            let mut state = self.lock();
            state.phase = Phase::Ended;
            state.records.clone()
        };

        let report = ReportBuilder::new(&self.config.title)
            .subtitle(&self.config.subtitle)
            .sort_order(self.config.sort_order)
            .truncate_at(self.config.truncate_at)
            .run_status(result.status)
            .records(records)
            .build(&self.catalog);
        let stats = report.overall_stats();

        let html_path = self.paths.results_root()?.join(&self.config.report_file_name);
        report.save_html(&html_path)?;

        let json_path = self
            .paths
            .reports_root()
            .map(|dir| dir.join(&self.config.summary_file_name))
            .and_then(|path| report.save_json(&path).map(|()| path));
        let json_path = match json_path {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Skipping JSON summary");
                None
            }
        };

        info!(
            html = %html_path.display(),
            tests = report.groups.len(),
            passed = stats.passed,
            failed = stats.failed,
            skipped = stats.skipped,
            "Report written"
        );
        Ok(ReportOutcome {
            html_path,
            json_path,
            stats,
        })
    }

    fn lock(&self) -> MutexGuard<'_, CollectorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn build_record(&self, test_id: String, step_number: String, step: &TestStep) -> StepRecord {
        let screenshots = self.find_screenshots(&test_id, &step_number);
        let (status, actual_result) = match &step.error {
            Some(err) if err.message.trim().is_empty() => (StepStatus::Failed, "Step failed".to_string()),
            Some(err) => (StepStatus::Failed, err.message.clone()),
            None => (StepStatus::Passed, AS_EXPECTED.to_string()),
        };
        StepRecord {
            expected_result: self.catalog.expected_result(&test_id, &step.title).to_string(),
            test_id,
            step_number,
            procedure: step.title.clone(),
            actual_result,
            screenshots,
            status,
            duration_ms: step.duration,
            timestamp: Utc::now(),
        }
    }

    fn find_screenshots(&self, test_id: &str, step_number: &str) -> Vec<String> {
        match self.paths.results_root() {
            Ok(dir) => find_screenshots(dir, test_id, step_number),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Results directory unavailable; no screenshots");
                Vec::new()
            }
        }
    }
}

impl Reporter for StepCollector {
    fn on_begin(&self) {
        if let Err(e) = self.paths.init() {
            warn!(error = %format!("{e:#}"), "Could not create report directories");
        }
        let mut state = self.lock();
        if state.phase == Phase::Idle {
            state.phase = Phase::Running;
        }
        debug!(results = %self.paths.results_dir().display(), "Reporter started");
    }

    fn on_test_begin(&self, test: &TestCase) {
        let mut state = self.lock();
        match state.phase {
            Phase::Ended => {
                warn!(title = %test.title, "Test began after the run ended; ignoring");
                return;
            }
            Phase::Idle => state.phase = Phase::Running,
            Phase::Running => {}
        }
        let test_id = resolve_test_id(&state, test);
        debug!(file = %test.location.file, %test_id, "Test began");
        state.remember(test, &test_id);
    }

    fn on_step_end(&self, test: &TestCase, _result: &TestResult, step: &TestStep) {
        if !step.is_user_step() {
            return;
        }

        let (test_id, step_number) = {
            let mut state = self.lock();
            if state.phase == Phase::Ended {
                warn!(step = %step.title, "Step reported after the run ended; ignoring");
                return;
            }
            let test_id = match state.test_ids.get(&TestKey::of(test)) {
                Some(id) => id.clone(),
                None => {
                    let id = resolve_test_id(&state, test);
                    state.remember(test, &id);
                    id
                }
            };
            let used = state.used_steps.entry(test_id.clone()).or_default();
            let step_number = assign_step_number(used, &step.title);
            (test_id, step_number)
        };

        // Directory scan happens outside the lock.
        let record = self.build_record(test_id, step_number, step);
        let mut state = self.lock();
        // finish() may have taken its snapshot while the directory was scanned.
        if state.phase == Phase::Ended {
            warn!(
                test_id = %record.test_id,
                step = %record.step_number,
                "Run ended while the step was recorded; dropping it"
            );
            return;
        }
        debug!(
            test_id = %record.test_id,
            step = %record.step_number,
            status = record.status.css_class(),
            screenshots = record.screenshots.len(),
            "Step recorded"
        );
        state.records.push(record);
    }

    fn on_end(&self, result: &FullResult) {
        if let Err(e) = self.finish(result) {
            error!(error = %format!("{e:#}"), "Failed to write test report");
        }
    }
}

/// `TS.<major>.<minor>-<seq>` found anywhere in `text`.
pub fn extract_test_id(text: &str) -> Option<String> {
    TEST_ID_RE
        .captures(text)
        .map(|caps| format!("TS.{}", &caps[1]))
}

/// Step number from `Step N:` or a leading `N.` / `N)` / `N:`, digits kept
/// as written.
pub fn parse_step_number(title: &str) -> Option<String> {
    STEP_LABEL_RE
        .captures(title)
        .or_else(|| LEADING_ORDINAL_RE.captures(title))
        .map(|caps| caps[1].to_string())
}

/// Source file first, then title, then the last id the same file produced,
/// and finally the file stem.
fn resolve_test_id(state: &CollectorState, test: &TestCase) -> String {
    if let Some(id) = extract_test_id(&test.location.file).or_else(|| extract_test_id(&test.title)) {
        return id;
    }
    if let Some(id) = state.file_ids.get(&test.location.file) {
        return id.clone();
    }
    let fallback = Path::new(&test.location.file)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.trim_end_matches(".spec").to_string())
        .unwrap_or_else(|| test.title.clone());
    warn!(file = %test.location.file, title = %test.title, %fallback, "No test id found");
    fallback
}

/// Uses the number in the title when its value is free; otherwise
/// synthesizes the next unused number for the test, zero-padded, so numbers
/// stay unique per test id. `1` and `01` count as the same step.
fn assign_step_number(used: &mut BTreeSet<u32>, title: &str) -> String {
    if let Some(parsed) = parse_step_number(title) {
        match parsed.parse::<u32>() {
            Ok(n) if used.insert(n) => return parsed,
            Ok(_) => warn!(step = %title, number = %parsed, "Duplicate step number; synthesizing a new one"),
            Err(e) => warn!(step = %title, number = %parsed, error = %e, "Step number out of range"),
        }
    }
    let mut n = u32::try_from(used.len()).unwrap_or(u32::MAX).saturating_add(1);
    while !used.insert(n) {
        n = n.saturating_add(1);
    }
    format!("{n:02}")
}

/// Matches `TS.<id-without-prefix>-<step>` followed by a non-digit (or nothing)
/// and a `.png` extension. Numeric steps match with or without zero padding,
/// so step `1` finds both `-1-` and `-01-` files.
pub fn screenshot_pattern(test_id: &str, step_number: &str) -> Result<Regex, regex::Error> {
    let step = step_number.trim();
    let step = if !step.is_empty() && step.bytes().all(|b| b.is_ascii_digit()) {
        let digits = step.trim_start_matches('0');
        format!("0*{}", if digits.is_empty() { "0" } else { digits })
    } else {
        regex::escape(step)
    };
    Regex::new(&format!(
        r"^TS\.{}-{}(?:[^0-9][^/\\]*)?\.(?i:png)$",
        regex::escape(strip_id_prefix(test_id)),
        step
    ))
}

/// Sorted names of files in `dir` belonging to `(test_id, step_number)`.
pub fn find_screenshots(dir: &Path, test_id: &str, step_number: &str) -> Vec<String> {
    let pattern = match screenshot_pattern(test_id, step_number) {
        Ok(re) => re,
        Err(e) => {
            warn!(%test_id, step = %step_number, error = %e, "Bad screenshot pattern");
            return Vec::new();
        }
    };
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "Cannot list screenshots");
            return Vec::new();
        }
    };
    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| pattern.is_match(name))
        .collect();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::DEFAULT_EXPECTED_RESULT;
    use tempfile::TempDir;

    fn collector(tmp: &TempDir) -> StepCollector {
        let paths = ReportPaths::new(
            &tmp.path().join("shots"),
            &tmp.path().join("reports"),
            &tmp.path().join("out"),
        );
        StepCollector::with_parts(ReporterConfig::default(), paths, MetadataCatalog::default())
    }

    #[test]
    fn test_id_from_file_then_title() {
        assert_eq!(
            extract_test_id("tests/setup/TS.2.1-05 company.spec.ts").as_deref(),
            Some("TS.2.1-05")
        );
        assert_eq!(extract_test_id("no id here"), None);

        let state = CollectorState::new();
        let test = TestCase::new("tests/login.spec.ts", "TS.1.1-03 login with Microsoft");
        assert_eq!(resolve_test_id(&state, &test), "TS.1.1-03");
        let nameless = TestCase::new("tests/login.spec.ts", "smoke");
        assert_eq!(resolve_test_id(&state, &nameless), "login");
    }

    #[test]
    fn step_number_parsing() {
        assert_eq!(parse_step_number("Step 3: Click save").as_deref(), Some("3"));
        assert_eq!(parse_step_number("Step 03: Click save").as_deref(), Some("03"));
        assert_eq!(parse_step_number("step 12 : verify").as_deref(), Some("12"));
        assert_eq!(parse_step_number("4. Open menu").as_deref(), Some("4"));
        assert_eq!(parse_step_number("2) Fill form").as_deref(), Some("2"));
        assert_eq!(parse_step_number("Wait 3 minutes"), None);
    }

    #[test]
    fn synthesized_numbers_skip_taken_ones() {
        let mut used = BTreeSet::new();
        assert_eq!(assign_step_number(&mut used, "Step 2: b"), "2");
        assert_eq!(assign_step_number(&mut used, "unnumbered"), "03");
        assert_eq!(assign_step_number(&mut used, "another"), "04");
        assert_eq!(assign_step_number(&mut used, "Step 1: a"), "1");
        assert_eq!(assign_step_number(&mut used, "Step 01: again"), "05");
        assert_eq!(used.len(), 5);
    }

    #[test]
    fn screenshot_pattern_respects_step_boundary() {
        let re = screenshot_pattern("TS.2.1-05", "01").unwrap();
        assert!(re.is_match("TS.2.1-05-01-2026.10.18-10.00.00.png"));
        assert!(re.is_match("TS.2.1-05-01.png"));
        assert!(re.is_match("TS.2.1-05-01_retry.PNG"));
        assert!(!re.is_match("TS.2.1-05-010-2026.10.18-10.00.00.png"));
        assert!(!re.is_match("TS.2.1-050-01-2026.10.18-10.00.00.png"));
        assert!(!re.is_match("TS.2.1-05-01-2026.10.18-10.00.00.jpg"));
        assert!(!re.is_match("TSX2.1-05-01.png"));

        let unpadded = screenshot_pattern("TS.2.1-05", "1").unwrap();
        assert!(unpadded.is_match("TS.2.1-05-1-2026.10.18-09.00.00.png"));
        assert!(unpadded.is_match("TS.2.1-05-01-2026.10.18-09.00.00.png"));
        assert!(!unpadded.is_match("TS.2.1-05-10-2026.10.18-09.00.00.png"));
        assert!(!unpadded.is_match("TS.2.1-05-11.png"));
        assert!(re.is_match("TS.2.1-05-1-2026.10.18-09.00.00.png"));
    }

    #[test]
    fn unpadded_screenshot_joins_its_step() {
        let tmp = TempDir::new().unwrap();
        let c = collector(&tmp);
        c.on_begin();
        let shot = "TS.2.1-05-1-2026.10.18-09.00.00.png";
        std::fs::write(c.paths().screenshot_path(shot).unwrap(), b"png").unwrap();

        let test = TestCase::new("tests/TS.2.1-05 wizard.spec.ts", "wizard");
        c.on_test_begin(&test);
        c.on_step_end(&test, &TestResult::default(), &TestStep::user("Step 1: Do X", 5));
        let records = c.records();
        assert_eq!(records[0].step_number, "1");
        assert_eq!(records[0].screenshots, vec![shot.to_string()]);
    }

    #[test]
    fn id_less_test_takes_last_id_of_its_file() {
        let tmp = TempDir::new().unwrap();
        let c = collector(&tmp);
        let file = "tests/audit.spec.ts";
        c.on_test_begin(&TestCase::new(file, "TS.5.1-01 view trail"));
        c.on_test_begin(&TestCase::new(file, "TS.5.2-01 export log"));
        c.on_test_begin(&TestCase::new(file, "TS.5.1-01 view trail"));
        let helper = TestCase::new(file, "cleanup");
        c.on_step_end(&helper, &TestResult::default(), &TestStep::user("Remove exports", 5));
        assert_eq!(c.records()[0].test_id, "TS.5.1-01");
    }

    #[test]
    fn framework_steps_are_ignored() {
        let tmp = TempDir::new().unwrap();
        let c = collector(&tmp);
        let test = TestCase::new("tests/TS.1.1-01.spec.ts", "login");
        c.on_begin();
        c.on_test_begin(&test);
        let internal = TestStep {
            title: "page.goto".into(),
            category: "pw:api".into(),
            ..TestStep::default()
        };
        c.on_step_end(&test, &TestResult::default(), &internal);
        c.on_step_end(&test, &TestResult::default(), &TestStep::user("Open login page", 10));
        let records = c.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].step_number, "01");
        assert_eq!(records[0].expected_result, DEFAULT_EXPECTED_RESULT);
        assert_eq!(records[0].actual_result, AS_EXPECTED);
    }

    #[test]
    fn steps_after_end_are_ignored() {
        let tmp = TempDir::new().unwrap();
        let c = collector(&tmp);
        let test = TestCase::new("tests/TS.1.1-01.spec.ts", "login");
        c.on_begin();
        c.on_test_begin(&test);
        c.on_end(&FullResult::default());
        assert_eq!(c.phase(), Phase::Ended);
        c.on_step_end(&test, &TestResult::default(), &TestStep::user("Step 1: late", 1));
        assert!(c.records().is_empty());
        assert!(tmp.path().join("shots").join("test-report.html").is_file());
    }

    #[test]
    fn empty_error_message_still_fails() {
        let tmp = TempDir::new().unwrap();
        let c = collector(&tmp);
        let test = TestCase::new("tests/TS.1.1-01.spec.ts", "login");
        c.on_step_end(&test, &TestResult::default(), &TestStep::failed("Step 1: x", 5, "  "));
        let records = c.records();
        assert_eq!(records[0].status, StepStatus::Failed);
        assert_eq!(records[0].actual_result, "Step failed");
        assert_eq!(records[0].test_id, "TS.1.1-01");
    }
}
