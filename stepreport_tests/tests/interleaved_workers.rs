//! Step attribution when tests from several workers interleave.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use stepreport_shared::collector::{Reporter, StepCollector};
use stepreport_shared::config::ReporterConfig;
use stepreport_shared::event::{FullResult, TestCase, TestResult, TestStep};
use stepreport_shared::metadata::MetadataCatalog;
use stepreport_shared::paths::ReportPaths;
use tempfile::TempDir;

fn collector_in(tmp: &TempDir) -> StepCollector {
    let root = tmp.path();
    let paths = ReportPaths::new(&root.join("shots"), &root.join("reports"), &root.join("out"));
    StepCollector::with_parts(ReporterConfig::default(), paths, MetadataCatalog::default())
}

#[test]
fn interleaved_steps_keep_their_owner() {
    let tmp = TempDir::new().unwrap();
    let reporter = collector_in(&tmp);
    let login = TestCase::new("tests/TS.1.1-01 login.spec.ts", "login");
    let wizard = TestCase::new("tests/TS.2.1-05 wizard.spec.ts", "wizard");
    let ok = TestResult::default();

    reporter.on_begin();
    reporter.on_test_begin(&login);
    reporter.on_test_begin(&wizard);
    // Steps for the first test arrive after the second test began.
    reporter.on_step_end(&login, &ok, &TestStep::user("Step 1: Open login", 5));
    reporter.on_step_end(&wizard, &ok, &TestStep::user("Step 1: Open wizard", 5));
    reporter.on_step_end(&login, &ok, &TestStep::user("Step 2: Submit", 5));
    reporter.on_step_end(&wizard, &ok, &TestStep::user("Step 2: Next page", 5));

    let owners: Vec<_> = reporter
        .records()
        .into_iter()
        .map(|r| (r.test_id, r.procedure))
        .collect();
    assert_eq!(
        owners,
        vec![
            ("TS.1.1-01".to_string(), "Step 1: Open login".to_string()),
            ("TS.2.1-05".to_string(), "Step 1: Open wizard".to_string()),
            ("TS.1.1-01".to_string(), "Step 2: Submit".to_string()),
            ("TS.2.1-05".to_string(), "Step 2: Next page".to_string()),
        ]
    );
}

#[test]
fn threaded_workers_attribute_and_number_uniquely() {
    let tmp = TempDir::new().unwrap();
    let reporter = Arc::new(collector_in(&tmp));
    reporter.on_begin();

    let workers: Vec<_> = (1..=6)
        .map(|worker| {
            let reporter = Arc::clone(&reporter);
            std::thread::spawn(move || {
                let test = TestCase::new(
                    &format!("tests/area/TS.4.{worker}-0{worker} flow.spec.ts"),
                    "document flow",
                );
                reporter.on_test_begin(&test);
                for step in 0..20 {
                    // Mix numbered and unnumbered titles.
                    let title = if step % 3 == 0 {
                        format!("Step {}: action {step}", step + 1)
                    } else {
                        format!("unnumbered action {step}")
                    };
                    reporter.on_step_end(&test, &TestResult::default(), &TestStep::user(&title, 1));
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let records = reporter.records();
    assert_eq!(records.len(), 6 * 20);

    let mut per_test: HashMap<String, Vec<String>> = HashMap::new();
    for record in &records {
        per_test
            .entry(record.test_id.clone())
            .or_default()
            .push(record.step_number.clone());
    }
    assert_eq!(per_test.len(), 6);
    for (test_id, numbers) in &per_test {
        assert_eq!(numbers.len(), 20, "{test_id}");
        let unique: HashSet<_> = numbers.iter().collect();
        assert_eq!(unique.len(), 20, "duplicate step numbers in {test_id}");
    }
}

#[test]
fn same_file_tests_without_file_id_use_their_titles() {
    let tmp = TempDir::new().unwrap();
    let reporter = collector_in(&tmp);
    let first = TestCase::new("tests/audit.spec.ts", "TS.5.1-01 view audit trail");
    let second = TestCase::new("tests/audit.spec.ts", "TS.5.2-01 export audit log");

    reporter.on_test_begin(&first);
    reporter.on_test_begin(&second);
    reporter.on_step_end(&first, &TestResult::default(), &TestStep::user("Step 1: Open audit", 5));
    reporter.on_step_end(&second, &TestResult::default(), &TestStep::user("Step 1: Export", 5));

    let ids: Vec<_> = reporter.records().into_iter().map(|r| r.test_id).collect();
    assert_eq!(ids, ["TS.5.1-01", "TS.5.2-01"]);
}

#[test]
fn finish_racing_a_worker_keeps_log_and_report_in_step() -> anyhow::Result<()> {
    for _ in 0..20 {
        let tmp = TempDir::new()?;
        let reporter = Arc::new(collector_in(&tmp));
        reporter.on_begin();
        let test = TestCase::new("tests/TS.4.1-01 upload.spec.ts", "upload");
        reporter.on_test_begin(&test);

        let worker = {
            let reporter = Arc::clone(&reporter);
            let test = test.clone();
            std::thread::spawn(move || {
                for step in 1..=100 {
                    let title = format!("Step {step}: upload part");
                    reporter.on_step_end(&test, &TestResult::default(), &TestStep::user(&title, 1));
                }
            })
        };
        while reporter.records().len() < 5 {
            std::thread::yield_now();
        }
        let outcome = reporter.finish(&FullResult::default())?;
        worker.join().unwrap();

        let html = std::fs::read_to_string(&outcome.html_path)?;
        let rows = html.matches("data-step=").count();
        assert_eq!(rows, reporter.records().len());
        assert_eq!(outcome.stats.total as usize, rows);
    }
    Ok(())
}
