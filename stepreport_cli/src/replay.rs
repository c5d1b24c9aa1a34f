//! Event log replay.
//!
//! Every log is read by its own task; decoded events are funnelled through one
//! mpsc channel into a single reporter, the same shape as an engine fanning
//! worker events into one reporter instance. `Begin` and `End` markers in the
//! logs are folded: the reporter sees one `on_begin` before any event, and the
//! caller decides when to finish.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use stepreport_shared::collector::Reporter;
use stepreport_shared::event::{decode_line, FullResult, LifecycleEvent, TestOutcome};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Where an event log comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSource {
    Stdin,
    File(PathBuf),
}

impl std::fmt::Display for LogSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogSource::Stdin => write!(f, "<stdin>"),
            LogSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Counters from one replay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub events: usize,
    pub malformed_lines: usize,
    /// Worst `End` status seen across all logs.
    pub result: FullResult,
}

enum Funnel {
    Event(LifecycleEvent),
    Malformed,
}

/// Replays `sources` into `reporter`. Does not call `on_end`.
pub async fn replay(reporter: Arc<dyn Reporter>, sources: Vec<LogSource>) -> anyhow::Result<ReplaySummary> {
    reporter.on_begin();

    let (tx, mut rx) = mpsc::channel::<Funnel>(256);
    let mut readers = Vec::with_capacity(sources.len());
    for source in sources {
        let tx = tx.clone();
        readers.push(tokio::spawn(async move {
            let lines = match &source {
                LogSource::Stdin => read_log(BufReader::new(tokio::io::stdin()), &source, tx).await,
                LogSource::File(path) => {
                    let file = tokio::fs::File::open(path)
                        .await
                        .with_context(|| format!("open event log {}", path.display()))?;
                    read_log(BufReader::new(file), &source, tx).await
                }
            }?;
            debug!(%source, lines, "Event log drained");
            Ok::<_, anyhow::Error>(())
        }));
    }
    drop(tx);

    let mut summary = ReplaySummary::default();
    while let Some(item) = rx.recv().await {
        match item {
            Funnel::Malformed => summary.malformed_lines += 1,
            Funnel::Event(event) => {
                summary.events += 1;
                match event {
                    LifecycleEvent::Begin => {}
                    LifecycleEvent::TestBegin { test } => reporter.on_test_begin(&test),
                    LifecycleEvent::StepEnd { test, result, step } => {
                        // Screenshot lookup lists the results directory.
                        let reporter = Arc::clone(&reporter);
                        tokio::task::spawn_blocking(move || reporter.on_step_end(&test, &result, &step))
                            .await
                            .context("step dispatch panicked")?;
                    }
                    LifecycleEvent::End { result } => {
                        summary.result.status = worse(summary.result.status, result.status)
                    }
                }
            }
        }
    }

    for reader in readers {
        reader.await.context("event log reader panicked")??;
    }

    info!(
        events = summary.events,
        malformed = summary.malformed_lines,
        status = ?summary.result.status,
        "Replay finished"
    );
    Ok(summary)
}

async fn read_log<R>(reader: R, source: &LogSource, tx: mpsc::Sender<Funnel>) -> anyhow::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut count = 0usize;
    while let Some(line) = lines
        .next_line()
        .await
        .with_context(|| format!("read event log {source}"))?
    {
        count += 1;
        let item = match decode_line(&line) {
            Ok(Some(event)) => Funnel::Event(event),
            Ok(None) => continue,
            Err(e) => {
                warn!(%source, line = count, error = %e, "Skipping malformed event");
                Funnel::Malformed
            }
        };
        if tx.send(item).await.is_err() {
            break;
        }
    }
    Ok(count)
}

fn severity(outcome: TestOutcome) -> u8 {
    match outcome {
        TestOutcome::Passed => 0,
        TestOutcome::Skipped => 1,
        TestOutcome::Interrupted => 2,
        TestOutcome::TimedOut => 3,
        TestOutcome::Failed => 4,
    }
}

fn worse(a: TestOutcome, b: TestOutcome) -> TestOutcome {
    if severity(b) > severity(a) {
        b
    } else {
        a
    }
}
