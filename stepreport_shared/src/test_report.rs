//! Step-level HTML test report.
//!
//! Records are grouped per test identifier, reconciled against registered step
//! manifests and rendered as a single self-contained page:
//! - Summary cards (passed / failed / skipped / pass rate / duration)
//! - Area -> sub-area -> per-test accordions
//! - One row per step with screenshot thumbnails and a lightbox viewer
//!
//! Screenshot `<img>` tags reference bare file names, so the page has to sit in
//! the same directory as the screenshots.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SortOrder;
use crate::event::TestOutcome;
use crate::metadata::{area_key, Area, ManifestStep, MetadataCatalog};
use crate::record::{StepRecord, StepStatus};

/// Pass/fail counters over a set of rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
    pub total_duration_ms: u64,
}

impl RunStats {
    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.passed as f64 / self.total as f64) * 100.0
    }

    pub fn add_record(&mut self, record: &StepRecord) {
        self.total += 1;
        self.total_duration_ms += record.duration_ms;
        match record.status {
            StepStatus::Passed => self.passed += 1,
            StepStatus::Failed => self.failed += 1,
            StepStatus::Skipped => self.skipped += 1,
        }
    }

    pub fn merge(&mut self, other: &RunStats) {
        self.total += other.total;
        self.passed += other.passed;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.total_duration_ms += other.total_duration_ms;
    }
}

/// All rows of one test, after reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestGroup {
    pub test_id: String,
    pub name: String,
    pub description: String,
    pub steps: Vec<StepRecord>,
}

impl TestGroup {
    pub fn stats(&self) -> RunStats {
        let mut stats = RunStats::default();
        for step in &self.steps {
            stats.add_record(step);
        }
        stats
    }

    /// Worst status among the group's steps.
    pub fn status(&self) -> StepStatus {
        if self.steps.iter().any(|s| s.status == StepStatus::Failed) {
            StepStatus::Failed
        } else if self.steps.iter().all(|s| s.status == StepStatus::Skipped) {
            StepStatus::Skipped
        } else {
            StepStatus::Passed
        }
    }
}

/// Full report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReport {
    pub title: String,
    pub subtitle: String,
    pub generated_at: DateTime<Utc>,
    pub run_status: TestOutcome,
    pub groups: Vec<TestGroup>,
    pub areas: Vec<Area>,
    #[serde(skip)]
    pub truncate_at: usize,
}

impl TestReport {
    /// Stats over every rendered row, synthesized ones included.
    pub fn overall_stats(&self) -> RunStats {
        let mut stats = RunStats::default();
        for group in &self.groups {
            stats.merge(&group.stats());
        }
        stats
    }

    pub fn all_passed(&self) -> bool {
        self.groups
            .iter()
            .flat_map(|g| &g.steps)
            .all(|s| s.status == StepStatus::Passed)
    }

    pub fn group(&self, test_id: &str) -> Option<&TestGroup> {
        self.groups.iter().find(|g| g.test_id == test_id)
    }

    /// Generate HTML report.
    pub fn to_html(&self) -> String {
        let stats = self.overall_stats();
        let mut html = String::new();
        html.push_str(&self.html_header());
        html.push_str(&self.html_summary(&stats));
        html.push_str(&self.html_areas());
        html.push_str(&self.html_footer());
        html
    }

    fn html_header(&self) -> String {
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title} - Test Report</title>
    <style>
        :root {{
            --ink: #1f2933;
            --muted: #6b7785;
            --line: #d9e2ec;
            --panel: #ffffff;
            --page: #f0f4f8;
            --accent: #2f6fb2;
            --green: #2f9e44;
            --red: #d64545;
            --gray: #8a94a0;
        }}

        * {{
            box-sizing: border-box;
            margin: 0;
            padding: 0;
        }}

        body {{
            font-family: 'Segoe UI', Arial, Helvetica, sans-serif;
            background: var(--page);
            color: var(--ink);
            line-height: 1.5;
        }}

        .container {{
            max-width: 1400px;
            margin: 0 auto;
            padding: 20px;
        }}

        header {{
            background: var(--accent);
            color: white;
            padding: 20px 0;
            margin-bottom: 24px;
        }}

        header h1 {{
            font-size: 2em;
            font-weight: 400;
        }}

        header .subtitle {{
            opacity: 0.85;
            margin-top: 4px;
        }}

        header .meta {{
            margin-top: 10px;
            font-size: 0.9em;
            opacity: 0.85;
        }}

        header .meta span {{
            margin-right: 20px;
        }}

        .summary-cards {{
            display: grid;
            grid-template-columns: repeat(auto-fit, minmax(170px, 1fr));
            gap: 16px;
            margin-bottom: 28px;
        }}

        .card {{
            background: var(--panel);
            border: 1px solid var(--line);
            border-radius: 4px;
            padding: 16px;
        }}

        .card h3 {{
            color: var(--muted);
            font-size: 0.8em;
            text-transform: uppercase;
            letter-spacing: 1px;
            margin-bottom: 6px;
        }}

        .card .value {{
            font-size: 2em;
            font-weight: 300;
        }}

        .value.passed {{ color: var(--green); }}
        .value.failed {{ color: var(--red); }}
        .value.skipped {{ color: var(--gray); }}
        .value.total {{ color: var(--accent); }}

        .progress-bar {{
            height: 6px;
            background: var(--line);
            border-radius: 3px;
            overflow: hidden;
            margin-top: 8px;
        }}

        .progress-fill {{
            height: 100%;
            background: var(--green);
        }}

        .area {{
            background: var(--panel);
            border: 1px solid var(--line);
            border-radius: 4px;
            margin-bottom: 12px;
        }}

        .area-header, .sub-header, .test-header {{
            display: flex;
            justify-content: space-between;
            align-items: center;
            padding: 12px 16px;
        }}

        .area-header {{
            font-size: 1.15em;
            color: var(--accent);
        }}

        [data-toggle] {{
            cursor: pointer;
            user-select: none;
        }}

        [data-toggle]:hover {{
            background: var(--page);
        }}

        [data-toggle]::before {{
            content: '\25B8';
            margin-right: 8px;
            display: inline-block;
            transition: transform 0.15s ease;
        }}

        .open > [data-toggle]::before {{
            transform: rotate(90deg);
        }}

        .area-body, .sub-body, .test-body {{
            display: none;
            padding: 0 16px 12px 16px;
        }}

        .open > .area-body, .open > .sub-body, .open > .test-body {{
            display: block;
        }}

        .placeholder > .area-header, .placeholder > .sub-header {{
            color: var(--gray);
            cursor: default;
        }}

        .placeholder-note {{
            font-size: 0.8em;
            font-style: italic;
        }}

        .sub-area {{
            border-top: 1px solid var(--line);
        }}

        .sub-header {{
            font-weight: 600;
        }}

        .test {{
            border: 1px solid var(--line);
            border-radius: 4px;
            margin: 8px 0;
        }}

        .test-id {{
            font-family: monospace;
            color: var(--accent);
            margin-right: 8px;
        }}

        .test-description {{
            color: var(--muted);
            font-size: 0.85em;
            margin-bottom: 8px;
        }}

        .group-stats .stat {{
            font-size: 0.8em;
            margin-left: 10px;
        }}

        .stat.passed {{ color: var(--green); }}
        .stat.failed {{ color: var(--red); }}
        .stat.skipped {{ color: var(--gray); }}

        table.steps {{
            width: 100%;
            border-collapse: collapse;
            font-size: 0.9em;
        }}

        table.steps th, table.steps td {{
            border: 1px solid var(--line);
            padding: 6px 8px;
            text-align: left;
            vertical-align: top;
        }}

        table.steps th {{
            background: var(--page);
            color: var(--muted);
            font-weight: 600;
        }}

        td.actual span[title] {{
            cursor: help;
            border-bottom: 1px dotted var(--muted);
        }}

        .shot-marker {{
            font-size: 0.75em;
            color: var(--accent);
            margin-left: 4px;
        }}

        img.thumb {{
            width: 80px;
            height: 50px;
            object-fit: cover;
            border: 1px solid var(--line);
            margin: 0 4px 4px 0;
            cursor: zoom-in;
        }}

        .no-shots {{
            color: var(--gray);
            font-style: italic;
        }}

        .badge {{
            display: inline-block;
            padding: 2px 10px;
            border-radius: 10px;
            color: white;
            font-size: 0.8em;
            font-weight: 600;
        }}

        .badge.passed {{ background: var(--green); }}
        .badge.failed {{ background: var(--red); }}
        .badge.skipped {{ background: var(--gray); }}

        #lightbox {{
            display: none;
            position: fixed;
            inset: 0;
            background: rgba(0, 0, 0, 0.85);
            align-items: center;
            justify-content: center;
            z-index: 1000;
            cursor: zoom-out;
        }}

        #lightbox.visible {{
            display: flex;
        }}

        #lightbox img {{
            max-width: 95vw;
            max-height: 95vh;
            box-shadow: 0 0 20px black;
        }}

        footer {{
            margin-top: 40px;
            padding: 20px;
            text-align: center;
            color: var(--muted);
            font-size: 0.85em;
            border-top: 1px solid var(--line);
        }}
    </style>
</head>
<body>
    <header>
        <div class="container">
            <h1>{title}</h1>
            <div class="subtitle">{subtitle}</div>
            <div class="meta">
                <span>Generated: {generated}</span>
                <span>Run status: {run_status:?}</span>
                <span>Tests: {tests}</span>
            </div>
        </div>
    </header>
    <div class="container">
"#,
            title = html_escape(&self.title),
            subtitle = html_escape(&self.subtitle),
            generated = self.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
            run_status = self.run_status,
            tests = self.groups.len(),
        )
    }

    fn html_summary(&self, stats: &RunStats) -> String {
        format!(
            r#"
        <div class="summary-cards" id="summary">
            <div class="card">
                <h3>Total Steps</h3>
                <div class="value total">{}</div>
            </div>
            <div class="card">
                <h3>Passed</h3>
                <div class="value passed">{}</div>
            </div>
            <div class="card">
                <h3>Failed</h3>
                <div class="value failed">{}</div>
            </div>
            <div class="card">
                <h3>Skipped</h3>
                <div class="value skipped">{}</div>
            </div>
            <div class="card">
                <h3>Pass Rate</h3>
                <div class="value passed">{:.1}%</div>
                <div class="progress-bar">
                    <div class="progress-fill" style="width: {:.1}%"></div>
                </div>
            </div>
            <div class="card">
                <h3>Duration</h3>
                <div class="value total">{:.2}s</div>
            </div>
        </div>
"#,
            stats.total,
            stats.passed,
            stats.failed,
            stats.skipped,
            stats.pass_rate(),
            stats.pass_rate(),
            stats.total_duration_ms as f64 / 1000.0,
        )
    }

    fn html_areas(&self) -> String {
        let sections = self.layout();
        let expanded = sections.iter().position(|s| s.has_data());

        let mut html = String::from(r#"<div id="areas">"#);
        for (idx, section) in sections.iter().enumerate() {
            html.push_str(&self.html_area(section, expanded == Some(idx)));
        }
        html.push_str("</div>");
        html
    }

    fn html_area(&self, section: &AreaSection<'_>, open: bool) -> String {
        if !section.has_data() {
            let mut html = format!(
                r#"
        <div class="area placeholder" data-area="{id}">
            <div class="area-header"><span>{id}. {name}</span><span class="placeholder-note">No results collected</span></div>
            <div class="area-body">"#,
                id = html_escape(&section.id),
                name = html_escape(&section.name),
            );
            for sub in &section.subs {
                let _ = write!(
                    html,
                    r#"<div class="sub-area placeholder"><div class="sub-header"><span>{} {}</span></div></div>"#,
                    html_escape(&sub.id),
                    html_escape(&sub.name)
                );
            }
            html.push_str("</div></div>");
            return html;
        }

        let stats = section.stats();
        let mut html = format!(
            r#"
        <div class="area{open}" data-area="{id}">
            <div class="area-header" data-toggle>
                <span>{id}. {name}</span>
                {stats}
            </div>
            <div class="area-body">"#,
            open = if open { " open" } else { "" },
            id = html_escape(&section.id),
            name = html_escape(&section.name),
            stats = html_stats(&stats),
        );

        for sub in &section.subs {
            if sub.groups.is_empty() {
                let _ = write!(
                    html,
                    r#"
                <div class="sub-area placeholder"><div class="sub-header"><span>{} {}</span><span class="placeholder-note">No results collected</span></div></div>"#,
                    html_escape(&sub.id),
                    html_escape(&sub.name)
                );
                continue;
            }
            let mut sub_stats = RunStats::default();
            for group in &sub.groups {
                sub_stats.merge(&group.stats());
            }
            let _ = write!(
                html,
                r#"
                <div class="sub-area open" data-sub-area="{id}">
                    <div class="sub-header" data-toggle><span>{id} {name}</span>{stats}</div>
                    <div class="sub-body">"#,
                id = html_escape(&sub.id),
                name = html_escape(&sub.name),
                stats = html_stats(&sub_stats),
            );
            for group in &sub.groups {
                html.push_str(&self.html_test(group));
            }
            html.push_str("</div></div>");
        }

        html.push_str("</div></div>");
        html
    }

    fn html_test(&self, group: &TestGroup) -> String {
        let mut html = format!(
            r#"
                        <div class="test open" data-test-id="{id}">
                            <div class="test-header" data-toggle>
                                <span><span class="test-id">{id}</span>{name}</span>
                                <span class="badge {status_class}">{status}</span>
                            </div>
                            <div class="test-body">
                                <div class="test-description">{description}</div>
                                <table class="steps">
                                    <thead>
                                        <tr><th>Step</th><th>Procedure</th><th>Expected Result</th><th>Actual Result</th><th>Screenshots</th><th>Duration</th><th>Status</th></tr>
                                    </thead>
                                    <tbody>"#,
            id = html_escape(&group.test_id),
            name = if group.name == group.test_id {
                String::new()
            } else {
                html_escape(&group.name)
            },
            status_class = group.status().css_class(),
            status = group.status().label(),
            description = html_escape(&group.description),
        );

        for step in &group.steps {
            html.push_str(&self.html_step_row(step));
        }

        html.push_str(
            r#"
                                    </tbody>
                                </table>
                            </div>
                        </div>"#,
        );
        html
    }

    fn html_step_row(&self, step: &StepRecord) -> String {
        format!(
            r#"
                                        <tr class="step {status_class}" data-step="{number}">
                                            <td>{number}</td>
                                            <td>{procedure}{marker}</td>
                                            <td>{expected}</td>
                                            <td class="actual">{actual}</td>
                                            <td class="screenshots">{shots}</td>
                                            <td>{duration:.2}s</td>
                                            <td><span class="badge {status_class}">{status}</span></td>
                                        </tr>"#,
            status_class = step.status.css_class(),
            number = html_escape(&step.step_number),
            procedure = html_escape(&step.procedure),
            marker = if step.is_screenshot_check() {
                r#"<span class="shot-marker">&#128247;</span>"#
            } else {
                ""
            },
            expected = html_escape(&step.expected_result),
            actual = truncated_cell(&step.actual_result, self.truncate_at),
            shots = html_screenshots(&step.screenshots),
            duration = step.duration_ms as f64 / 1000.0,
            status = step.status.label(),
        )
    }

    fn html_footer(&self) -> String {
        r#"
    </div>
    <div id="lightbox"><img id="lightbox-img" src="" alt="Screenshot"></div>
    <footer>
        <p>Document Management E2E Test Suite</p>
        <p>Generated by stepreport</p>
    </footer>
    <script>
        document.querySelectorAll('[data-toggle]').forEach(function (header) {
            header.addEventListener('click', function () {
                header.parentElement.classList.toggle('open');
            });
        });
        var lightbox = document.getElementById('lightbox');
        var lightboxImg = document.getElementById('lightbox-img');
        function closeLightbox() {
            lightbox.classList.remove('visible');
            lightboxImg.src = '';
        }
        document.querySelectorAll('img.thumb').forEach(function (thumb) {
            thumb.addEventListener('click', function (e) {
                e.stopPropagation();
                lightboxImg.src = thumb.getAttribute('data-full');
                lightbox.classList.add('visible');
            });
        });
        lightbox.addEventListener('click', closeLightbox);
        document.addEventListener('keydown', function (e) {
            if (e.key === 'Escape') {
                closeLightbox();
            }
        });
    </script>
</body>
</html>
"#
        .to_string()
    }

    /// Places every group under its area and sub-area. Catalog areas keep
    /// their order; groups outside the catalog go to a trailing "Other" area.
    fn layout(&self) -> Vec<AreaSection<'_>> {
        let mut sections: Vec<AreaSection<'_>> = self
            .areas
            .iter()
            .map(|area| AreaSection {
                id: area.id.clone(),
                name: area.name.clone(),
                subs: area
                    .sub_areas
                    .iter()
                    .map(|s| SubSection {
                        id: s.id.clone(),
                        name: s.name.clone(),
                        groups: Vec::new(),
                    })
                    .collect(),
            })
            .collect();
        let mut other = AreaSection {
            id: "Other".to_string(),
            name: "Unclassified tests".to_string(),
            subs: Vec::new(),
        };

        for group in &self.groups {
            let key = area_key(&group.test_id);
            let section = key
                .as_ref()
                .and_then(|(major, _)| sections.iter_mut().find(|s| &s.id == major));
            match (section, key.as_ref()) {
                (Some(section), Some((_, sub_id))) => {
                    section.sub_mut(sub_id, "Additional tests").groups.push(group)
                }
                _ => other.sub_mut("-", "Other").groups.push(group),
            }
        }

        if other.has_data() {
            sections.push(other);
        }
        sections
    }

    /// Save report to file.
    pub fn save_html(&self, path: &Path) -> anyhow::Result<()> {
        fs::write(path, self.to_html()).with_context(|| format!("write {}", path.display()))
    }

    /// Save report as JSON.
    pub fn save_json(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self).context("serialize report")?;
        fs::write(path, json).with_context(|| format!("write {}", path.display()))
    }
}

struct SubSection<'a> {
    id: String,
    name: String,
    groups: Vec<&'a TestGroup>,
}

struct AreaSection<'a> {
    id: String,
    name: String,
    subs: Vec<SubSection<'a>>,
}

impl<'a> AreaSection<'a> {
    fn has_data(&self) -> bool {
        self.subs.iter().any(|s| !s.groups.is_empty())
    }

    fn stats(&self) -> RunStats {
        let mut stats = RunStats::default();
        for group in self.subs.iter().flat_map(|s| &s.groups) {
            stats.merge(&group.stats());
        }
        stats
    }

    fn sub_mut(&mut self, id: &str, name: &str) -> &mut SubSection<'a> {
        let idx = match self.subs.iter().position(|s| s.id == id) {
            Some(idx) => idx,
            None => {
                self.subs.push(SubSection {
                    id: id.to_string(),
                    name: name.to_string(),
                    groups: Vec::new(),
                });
                self.subs.len() - 1
            }
        };
        &mut self.subs[idx]
    }
}

fn html_stats(stats: &RunStats) -> String {
    format!(
        r#"<span class="group-stats"><span class="stat passed">{} passed</span><span class="stat failed">{} failed</span><span class="stat skipped">{} skipped</span></span>"#,
        stats.passed, stats.failed, stats.skipped
    )
}

fn html_screenshots(files: &[String]) -> String {
    if files.is_empty() {
        return r#"<span class="no-shots">No screenshots</span>"#.to_string();
    }
    let mut html = String::new();
    for file in files {
        let src = urlencoding::encode(file);
        let name = html_escape(file);
        let _ = write!(
            html,
            r#"<img class="thumb" src="{src}" data-full="{src}" alt="{name}" title="{name}" loading="lazy">"#
        );
    }
    html
}

/// Long text is cut to `limit` characters; the full value stays available as
/// a hover tooltip.
fn truncated_cell(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return html_escape(text);
    }
    let short: String = text.chars().take(limit).collect();
    format!(
        r#"<span title="{}">{}&hellip;</span>"#,
        html_escape(text),
        html_escape(short.trim_end())
    )
}

/// Escape HTML special characters
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Compares strings treating digit runs as numbers: `TS.2.2` < `TS.2.10`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();
    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let ln = take_digits(&mut left);
                let rn = take_digits(&mut right);
                let lt = ln.trim_start_matches('0');
                let rt = rn.trim_start_matches('0');
                let ord = lt.len().cmp(&rt.len()).then_with(|| lt.cmp(rt));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(l), Some(r)) => {
                if l != r {
                    return l.cmp(&r);
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
        digits.push(c);
        chars.next();
    }
    digits
}

/// Adds a skipped placeholder for every manifest step without an executed
/// record, then orders rows by step number.
pub fn reconcile(test_id: &str, mut steps: Vec<StepRecord>, manifest: &[ManifestStep]) -> Vec<StepRecord> {
    for expected in manifest {
        let executed = steps.iter().any(|s| match (s.step_ordinal(), expected.step_number.parse::<u32>()) {
            (Some(x), Ok(y)) => x == y,
            _ => s.step_number == expected.step_number,
        });
        if !executed {
            steps.push(StepRecord::not_executed(
                test_id,
                &expected.step_number,
                &expected.procedure,
                &expected.expected_result,
            ));
        }
    }
    // Stable sort keeps execution order for non-numeric step numbers.
    steps.sort_by(|a, b| match (a.step_ordinal(), b.step_ordinal()) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    steps
}

/// Test report builder with fluent API.
pub struct ReportBuilder {
    title: String,
    subtitle: String,
    sort_order: SortOrder,
    truncate_at: usize,
    run_status: TestOutcome,
    records: Vec<StepRecord>,
}

impl ReportBuilder {
    pub fn new(title: &str) -> Self {
        ReportBuilder {
            title: title.to_string(),
            subtitle: String::new(),
            sort_order: SortOrder::Lexical,
            truncate_at: 120,
            run_status: TestOutcome::Passed,
            records: Vec::new(),
        }
    }

    pub fn subtitle(mut self, subtitle: &str) -> Self {
        self.subtitle = subtitle.to_string();
        self
    }

    pub fn sort_order(mut self, order: SortOrder) -> Self {
        self.sort_order = order;
        self
    }

    pub fn truncate_at(mut self, limit: usize) -> Self {
        self.truncate_at = limit;
        self
    }

    pub fn run_status(mut self, status: TestOutcome) -> Self {
        self.run_status = status;
        self
    }

    pub fn add_record(mut self, record: StepRecord) -> Self {
        self.records.push(record);
        self
    }

    pub fn records(mut self, records: impl IntoIterator<Item = StepRecord>) -> Self {
        self.records.extend(records);
        self
    }

    /// Groups, sorts and reconciles the collected records.
    pub fn build(self, catalog: &MetadataCatalog) -> TestReport {
        let mut order: Vec<String> = Vec::new();
        let mut buckets: HashMap<String, Vec<StepRecord>> = HashMap::new();
        for record in self.records {
            if !buckets.contains_key(&record.test_id) {
                order.push(record.test_id.clone());
            }
            buckets.entry(record.test_id.clone()).or_default().push(record);
        }

        match self.sort_order {
            SortOrder::Lexical => order.sort(),
            SortOrder::Natural => order.sort_by(|a, b| natural_cmp(a, b)),
        }

        let groups = order
            .into_iter()
            .map(|test_id| {
                let steps = buckets.remove(&test_id).unwrap_or_default();
                let steps = match catalog.manifest(&test_id) {
                    Some(manifest) => reconcile(&test_id, steps, manifest),
                    None => steps,
                };
                TestGroup {
                    name: catalog.display_name(&test_id).to_string(),
                    description: catalog.description(&test_id).to_string(),
                    test_id,
                    steps,
                }
            })
            .collect();

        TestReport {
            title: self.title,
            subtitle: self.subtitle,
            generated_at: Utc::now(),
            run_status: self.run_status,
            groups,
            areas: catalog.areas().to_vec(),
            truncate_at: self.truncate_at,
        }
    }
}
