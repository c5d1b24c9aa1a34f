//! Demo run with HTML report generation.
//!
//! Simulates a small end-to-end run (login, setup wizard, user administration)
//! against the reporter, dropping placeholder screenshots the way the browser
//! steps do, and writes the resulting report.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Local;
use stepreport_shared::collector::{Reporter, StepCollector};
use stepreport_shared::config::ReporterConfig;
use stepreport_shared::event::{FullResult, TestCase, TestOutcome, TestResult, TestStep};
use stepreport_shared::paths::screenshot_file_name;
use tracing::info;

/// 1x1 transparent PNG.
const PLACEHOLDER_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
    0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
    0x42, 0x60, 0x82,
];

const DEMO_METADATA: &str = r#"{
  "tests": [
    {
      "testId": "TS.1.1-01",
      "testName": "Login with Microsoft",
      "description": "A user signs in through the Microsoft identity provider.",
      "steps": [
        { "extractionPatterns": ["^Click"], "expectedResult": "Button responds" },
        { "extractionPatterns": ["dashboard"], "expectedResult": "Dashboard is shown" }
      ]
    },
    {
      "testId": "TS.3.1-02",
      "testName": "Create a user",
      "description": "An administrator creates a new user account.",
      "steps": [
        { "stepNumber": "1", "procedure": "Open user administration", "extractionPatterns": ["user administration"], "expectedResult": "User list is shown" },
        { "stepNumber": "2", "procedure": "Fill in the new user form", "extractionPatterns": ["form"], "expectedResult": "Form accepts input" },
        { "stepNumber": "3", "procedure": "Save the user", "extractionPatterns": ["save"], "expectedResult": "User appears in the list" }
      ]
    }
  ]
}"#;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let output_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("test-reports/demo"));
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("create {}", output_dir.display()))?;

    let metadata_path = output_dir.join("test-metadata.json");
    std::fs::write(&metadata_path, DEMO_METADATA).context("write demo metadata")?;

    let cfg = ReporterConfig {
        results_dir: dir_string(&output_dir.join("screenshots")),
        reports_dir: dir_string(&output_dir),
        test_results_dir: dir_string(&output_dir.join("test-results")),
        metadata_path: dir_string(&metadata_path),
        subtitle: "Demo run".to_string(),
        ..ReporterConfig::default()
    };
    let reporter = StepCollector::new(cfg);
    reporter.on_begin();

    let login = TestCase::new("tests/login/TS.1.1-01 login.spec.ts", "Login with Microsoft");
    reporter.on_test_begin(&login);
    run_step(&reporter, &login, "TS.1.1-01", "Step 1: Click login with Microsoft [screenshot]", 820, None)?;
    run_step(&reporter, &login, "TS.1.1-01", "Step 2: Verify the dashboard", 1430, None)?;

    let wizard = TestCase::new("tests/setup/TS.2.1-05 company.spec.ts", "Company details");
    reporter.on_test_begin(&wizard);
    run_step(&reporter, &wizard, "TS.2.1-05", "Step 1: Enter company name", 610, None)?;
    run_step(&reporter, &wizard, "TS.2.1-05", "Wait for autosave", 3000, None)?;

    let users = TestCase::new("tests/admin/TS.3.1-02 create-user.spec.ts", "Create a user");
    reporter.on_test_begin(&users);
    run_step(&reporter, &users, "TS.3.1-02", "Step 1: Open user administration", 540, None)?;
    run_step(
        &reporter,
        &users,
        "TS.3.1-02",
        "Step 2: Fill in the new user form",
        5012,
        Some("locator.fill: Timeout 5000ms exceeded waiting for getByLabel('E-mail')"),
    )?;

    let outcome = reporter.finish(&FullResult {
        status: TestOutcome::Failed,
    })?;

    println!("Demo report");
    println!("===========");
    println!("Total:   {}", outcome.stats.total);
    println!("Passed:  {}", outcome.stats.passed);
    println!("Failed:  {}", outcome.stats.failed);
    println!("Skipped: {}", outcome.stats.skipped);
    println!("HTML:    {}", outcome.html_path.display());
    if let Some(json) = &outcome.json_path {
        println!("JSON:    {}", json.display());
    }
    Ok(())
}

/// Drops a screenshot for the step (as the browser step would) and reports it.
fn run_step(
    reporter: &StepCollector,
    test: &TestCase,
    test_id: &str,
    title: &str,
    duration_ms: u64,
    error: Option<&str>,
) -> anyhow::Result<()> {
    let number = stepreport_shared::collector::parse_step_number(title);
    if let Some(number) = &number {
        let name = screenshot_file_name(test_id, number, &Local::now());
        let path = reporter.paths().screenshot_path(&name)?;
        std::fs::write(&path, PLACEHOLDER_PNG)
            .with_context(|| format!("write {}", path.display()))?;
        info!(file = %name, "Screenshot captured");
    }
    let step = match error {
        Some(message) => TestStep::failed(title, duration_ms, message),
        None => TestStep::user(title, duration_ms),
    };
    reporter.on_step_end(test, &TestResult::default(), &step);
    Ok(())
}

fn dir_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
