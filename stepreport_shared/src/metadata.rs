//! Test metadata catalog.
//!
//! Optional JSON descriptor that maps test identifiers to display names,
//! descriptions and per-step expected results. Expected results are selected
//! by case-insensitive regex "extraction patterns" matched against the step
//! title. Steps that also declare `stepNumber` and `procedure` form the test's
//! step manifest, used to show steps that never ran.
//!
//! Loading is best-effort: a missing or malformed file yields an empty catalog.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::record::{normalize_step_number, DEFAULT_EXPECTED_RESULT};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetadataFile {
    #[serde(default)]
    tests: Vec<TestEntry>,
    #[serde(default)]
    areas: Vec<Area>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TestEntry {
    test_id: String,
    #[serde(default)]
    test_name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    steps: Vec<StepEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StepEntry {
    #[serde(default)]
    extraction_patterns: Vec<String>,
    expected_result: String,
    step_number: Option<String>,
    procedure: Option<String>,
}

/// Expected-result rule compiled from one metadata step.
#[derive(Debug, Clone)]
pub struct ExpectationRule {
    pub patterns: Vec<Regex>,
    pub expected_result: String,
}

impl ExpectationRule {
    pub fn matches(&self, title: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(title))
    }
}

/// A step a test is expected to execute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestStep {
    pub step_number: String,
    pub procedure: String,
    pub expected_result: String,
}

/// Metadata for one test identifier.
#[derive(Debug, Clone)]
pub struct TestMetadata {
    pub test_id: String,
    pub test_name: String,
    pub description: String,
    pub rules: Vec<ExpectationRule>,
    pub manifest: Vec<ManifestStep>,
}

/// Second-level navigation entry, e.g. `2.1 Company details`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubArea {
    pub id: String,
    pub name: String,
}

/// Top-level functional area of the application under test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Area {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub sub_areas: Vec<SubArea>,
}

impl Area {
    fn new(id: &str, name: &str, subs: &[(&str, &str)]) -> Self {
        Area {
            id: id.to_string(),
            name: name.to_string(),
            sub_areas: subs
                .iter()
                .map(|(id, name)| SubArea {
                    id: id.to_string(),
                    name: name.to_string(),
                })
                .collect(),
        }
    }
}

/// Navigation scaffold used when the metadata file does not declare areas.
pub fn default_areas() -> Vec<Area> {
    vec![
        Area::new("1", "Login", &[("1.1", "Microsoft sign-in"), ("1.2", "Session handling")]),
        Area::new(
            "2",
            "Setup Wizard",
            &[("2.1", "Company details"), ("2.2", "Storage settings"), ("2.3", "Finish setup")],
        ),
        Area::new(
            "3",
            "User Administration",
            &[("3.1", "Create users"), ("3.2", "Roles and permissions"), ("3.3", "Deactivate users")],
        ),
        Area::new(
            "4",
            "Document Lifecycle",
            &[
                ("4.1", "Upload"),
                ("4.2", "Review and approval"),
                ("4.3", "Versioning"),
                ("4.4", "Archive and delete"),
            ],
        ),
        Area::new("5", "Audit Logging", &[("5.1", "Audit trail"), ("5.2", "Export")]),
    ]
}

/// Splits `TS.2.1-05` into its area id `2` and sub-area id `2.1`.
pub fn area_key(test_id: &str) -> Option<(String, String)> {
    let rest = test_id.split_once('.').map(|(_, r)| r)?;
    let (major_minor, _seq) = rest.split_once('-')?;
    let (major, minor) = major_minor.split_once('.')?;
    if major.is_empty() || minor.is_empty() {
        return None;
    }
    Some((major.to_string(), format!("{major}.{minor}")))
}

/// Read-only metadata for a run.
#[derive(Debug, Clone)]
pub struct MetadataCatalog {
    tests: HashMap<String, TestMetadata>,
    areas: Vec<Area>,
}

impl Default for MetadataCatalog {
    fn default() -> Self {
        MetadataCatalog {
            tests: HashMap::new(),
            areas: default_areas(),
        }
    }
}

impl MetadataCatalog {
    /// Loads the descriptor at `path`. Never fails: problems are logged and an
    /// empty catalog is returned.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            debug!(path = %path.display(), "No test metadata file; using defaults");
            return Self::default();
        }
        match Self::try_load(path) {
            Ok(catalog) => {
                info!(path = %path.display(), tests = catalog.tests.len(), "Loaded test metadata");
                catalog
            }
            Err(e) => {
                warn!(path = %path.display(), error = %format!("{e:#}"), "Ignoring unreadable test metadata");
                Self::default()
            }
        }
    }

    fn try_load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path).context("read metadata")?;
        Self::from_json_str(&raw)
    }

    /// Parses a descriptor. Invalid regex patterns are logged and skipped.
    pub fn from_json_str(s: &str) -> anyhow::Result<Self> {
        let file: MetadataFile = serde_json::from_str(s).context("parse metadata")?;
        let mut tests = HashMap::new();
        for entry in file.tests {
            let meta = compile_entry(entry);
            tests.insert(meta.test_id.clone(), meta);
        }
        let areas = if file.areas.is_empty() {
            default_areas()
        } else {
            file.areas
        };
        Ok(MetadataCatalog { tests, areas })
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    pub fn test(&self, test_id: &str) -> Option<&TestMetadata> {
        self.tests.get(test_id)
    }

    /// Display name, falling back to the raw identifier.
    pub fn display_name<'a>(&'a self, test_id: &'a str) -> &'a str {
        match self.tests.get(test_id) {
            Some(meta) if !meta.test_name.is_empty() => &meta.test_name,
            _ => test_id,
        }
    }

    pub fn description(&self, test_id: &str) -> &str {
        self.tests
            .get(test_id)
            .map(|m| m.description.as_str())
            .unwrap_or_default()
    }

    /// Expected result of the first rule whose pattern matches `title`.
    pub fn expected_result(&self, test_id: &str, title: &str) -> &str {
        self.tests
            .get(test_id)
            .and_then(|meta| meta.rules.iter().find(|rule| rule.matches(title)))
            .map(|rule| rule.expected_result.as_str())
            .unwrap_or(DEFAULT_EXPECTED_RESULT)
    }

    /// Registered step manifest, if the test declares one.
    pub fn manifest(&self, test_id: &str) -> Option<&[ManifestStep]> {
        self.tests
            .get(test_id)
            .map(|m| m.manifest.as_slice())
            .filter(|m| !m.is_empty())
    }

    pub fn areas(&self) -> &[Area] {
        &self.areas
    }
}

fn compile_entry(entry: TestEntry) -> TestMetadata {
    let mut rules = Vec::new();
    let mut manifest = Vec::new();
    for step in entry.steps {
        let patterns = step
            .extraction_patterns
            .iter()
            .filter_map(|p| match RegexBuilder::new(p).case_insensitive(true).build() {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!(test_id = %entry.test_id, pattern = %p, error = %e, "Skipping invalid extraction pattern");
                    None
                }
            })
            .collect();
        if let (Some(number), Some(procedure)) = (&step.step_number, &step.procedure) {
            manifest.push(ManifestStep {
                step_number: normalize_step_number(number),
                procedure: procedure.clone(),
                expected_result: step.expected_result.clone(),
            });
        }
        rules.push(ExpectationRule {
            patterns,
            expected_result: step.expected_result,
        });
    }
    TestMetadata {
        test_id: entry.test_id,
        test_name: entry.test_name,
        description: entry.description,
        rules,
        manifest,
    }
}
