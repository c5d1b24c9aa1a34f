//! Full reporter runs: events in, HTML out.

use std::path::Path;

use stepreport_shared::collector::{Reporter, StepCollector};
use stepreport_shared::config::ReporterConfig;
use stepreport_shared::event::{FullResult, TestCase, TestResult, TestStep};
use stepreport_shared::metadata::MetadataCatalog;
use stepreport_shared::paths::ReportPaths;
use stepreport_shared::record::{StepStatus, AS_EXPECTED, DEFAULT_EXPECTED_RESULT, NOT_EXECUTED};
use tempfile::TempDir;

fn collector_in(root: &Path, catalog: MetadataCatalog) -> StepCollector {
    let paths = ReportPaths::new(&root.join("shots"), &root.join("reports"), &root.join("out"));
    StepCollector::with_parts(ReporterConfig::default(), paths, catalog)
}

#[test]
fn failed_second_step_is_reported() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();

    let tmp = TempDir::new()?;
    let reporter = collector_in(tmp.path(), MetadataCatalog::default());
    let test = TestCase::new("tests/setup/TS.2.1-05 company details.spec.ts", "Company details");

    reporter.on_begin();
    reporter.on_test_begin(&test);
    reporter.on_step_end(&test, &TestResult::default(), &TestStep::user("Step 1: Do X", 120));
    reporter.on_step_end(
        &test,
        &TestResult::default(),
        &TestStep::failed("Step 2: Do Y", 80, "boom"),
    );
    let outcome = reporter.finish(&FullResult::default())?;

    let records = reporter.records();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.test_id == "TS.2.1-05"));
    assert_eq!(records[0].status, StepStatus::Passed);
    assert_eq!(records[0].actual_result, AS_EXPECTED);
    assert_eq!(records[1].status, StepStatus::Failed);
    assert_eq!(records[1].actual_result, "boom");

    let html = std::fs::read_to_string(&outcome.html_path)?;
    assert_eq!(html.matches(r#"<tr class="step "#).count(), 2);
    assert!(html.contains(r#"data-test-id="TS.2.1-05""#));
    assert!(html.contains(r#"<tr class="step failed" data-step="2">"#));
    assert!(html.contains(r#"<td class="actual">boom</td>"#));
    assert_eq!(outcome.stats.failed, 1);
    assert_eq!(outcome.stats.passed, 1);
    assert!(outcome.json_path.as_deref().is_some_and(Path::is_file));
    Ok(())
}

#[test]
fn no_png_files_means_no_screenshots() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let reporter = collector_in(tmp.path(), MetadataCatalog::default());
    let test = TestCase::new("tests/TS.1.1-01.spec.ts", "login");

    reporter.on_begin();
    std::fs::write(reporter.paths().results_root()?.join("notes.txt"), "not a screenshot")?;
    reporter.on_test_begin(&test);
    for title in ["Step 1: Open", "Step 2: Click", "Wait 3 minutes"] {
        reporter.on_step_end(&test, &TestResult::default(), &TestStep::user(title, 10));
    }
    let outcome = reporter.finish(&FullResult::default())?;

    assert!(reporter.records().iter().all(|r| r.screenshots.is_empty()));
    let html = std::fs::read_to_string(outcome.html_path)?;
    assert_eq!(html.matches("No screenshots").count(), 3);
    assert!(!html.contains(r#"class="thumb""#));
    Ok(())
}

#[test]
fn metadata_drives_expected_results_and_names() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let metadata = tmp.path().join("test-metadata.json");
    std::fs::write(
        &metadata,
        r#"{ "tests": [{ "testId": "TS.1.1-01", "testName": "Login with Microsoft",
            "description": "Sign-in flow",
            "steps": [{ "extractionPatterns": ["^Click"], "expectedResult": "Button responds" }] }] }"#,
    )?;
    let reporter = collector_in(tmp.path(), MetadataCatalog::load(&metadata));
    let test = TestCase::new("tests/TS.1.1-01.spec.ts", "login");

    reporter.on_test_begin(&test);
    reporter.on_step_end(
        &test,
        &TestResult::default(),
        &TestStep::user("Click login with Microsoft", 10),
    );
    reporter.on_step_end(&test, &TestResult::default(), &TestStep::user("Wait 3 minutes", 10));

    let records = reporter.records();
    assert_eq!(records[0].expected_result, "Button responds");
    assert_eq!(records[1].expected_result, DEFAULT_EXPECTED_RESULT);

    let outcome = reporter.finish(&FullResult::default())?;
    let html = std::fs::read_to_string(outcome.html_path)?;
    assert!(html.contains("Login with Microsoft"));
    assert!(html.contains("Sign-in flow"));
    Ok(())
}

#[test]
fn aborted_test_shows_full_manifest() -> anyhow::Result<()> {
    let catalog = MetadataCatalog::from_json_str(
        r#"{ "tests": [{ "testId": "TS.3.1-02", "steps": [
            { "stepNumber": "1", "procedure": "Open users", "expectedResult": "List shown" },
            { "stepNumber": "2", "procedure": "Fill form", "expectedResult": "Form accepts input" },
            { "stepNumber": "3", "procedure": "Save", "expectedResult": "User saved" }
        ]}]}"#,
    )?;
    let tmp = TempDir::new()?;
    let reporter = collector_in(tmp.path(), catalog);
    let test = TestCase::new("tests/admin/TS.3.1-02.spec.ts", "create user");

    reporter.on_test_begin(&test);
    reporter.on_step_end(
        &test,
        &TestResult::default(),
        &TestStep::failed("Step 1: Open users", 30, "users page did not load"),
    );
    let outcome = reporter.finish(&FullResult::default())?;

    assert_eq!(outcome.stats.total, 3);
    assert_eq!(outcome.stats.skipped, 2);
    let html = std::fs::read_to_string(outcome.html_path)?;
    assert_eq!(html.matches(NOT_EXECUTED).count(), 2);
    assert!(html.contains(r#"<tr class="step skipped" data-step="03">"#));
    Ok(())
}

#[test]
fn unwritable_report_is_an_error_not_a_panic() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let blocker = tmp.path().join("shots");
    std::fs::write(&blocker, "a file where the results directory should be")?;
    let reporter = collector_in(tmp.path(), MetadataCatalog::default());
    let test = TestCase::new("tests/TS.1.1-01.spec.ts", "login");

    reporter.on_test_begin(&test);
    reporter.on_step_end(&test, &TestResult::default(), &TestStep::user("Step 1: Open", 10));
    assert!(reporter.finish(&FullResult::default()).is_err());
    // The lifecycle hook only logs.
    reporter.on_end(&FullResult::default());
    Ok(())
}
