//! Repository-to-catalog generation.
//!
//! analysis (parallel per file) → naming (discovery order) → inference
//! (concurrent, bounded) → model and endpoint synthesis. Failures are isolated
//! to the file or function that caused them.

use std::collections::BTreeMap;
use std::path::Path;

use ignore::WalkBuilder;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::endpoint::{EndpointDefinition, synthesize_endpoints};
use crate::error::{Result, SchemaError};
use crate::inference::SchemaInferenceEngine;
use crate::model::{ModelDefinition, synthesize};
use crate::naming::{NameAllocator, to_canonical_type_name};
use crate::parser::{SourceLanguage, analyze};
use crate::types::{FunctionDescriptor, SourceInventory};

/// Source files keyed by repository-relative path, `/` separated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Repository {
    pub files: BTreeMap<String, String>,
}

impl Repository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, source: impl Into<String>) {
        self.files.insert(path.into(), source.into());
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Load every analyzable file under `root` (.gitignore aware, hidden entries skipped).
    ///
    /// Files that are not valid UTF-8 are skipped with a warning.
    pub fn from_dir(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(SchemaError::io(
                root,
                std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
            ));
        }

        let mut repo = Self::new();
        let mut builder = WalkBuilder::new(root);
        builder.hidden(true).git_ignore(true).require_git(false);

        for entry in builder.build() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let path = entry.path();
            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            let relative = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if SourceLanguage::detect(&relative).is_none() {
                continue;
            }

            let bytes = std::fs::read(path).map_err(|e| SchemaError::io(path, e))?;
            match String::from_utf8(bytes) {
                Ok(source) => repo.insert(relative, source),
                Err(_) => tracing::warn!(file = %relative, "skipping non UTF-8 source file"),
            }
        }

        tracing::debug!(root = %root.display(), files = repo.len(), "loaded repository");
        Ok(repo)
    }
}

/// Analyze every supported file in parallel. Output keeps path order;
/// unsupported files are left out.
pub fn analyze_repository(repo: &Repository) -> Vec<(String, Result<SourceInventory>)> {
    let jobs: Vec<(&String, &String)> = repo
        .files
        .iter()
        .filter(|(path, _)| SourceLanguage::detect(path).is_some())
        .collect();

    jobs.par_iter()
        .map(|(path, source)| ((*path).clone(), analyze(path, source)))
        .collect()
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Analysis,
    Identifier,
    Route,
}

/// One file or function that produced no model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitFailure {
    pub source_file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct GenerationReport {
    pub models: Vec<ModelDefinition>,
    /// Sorted by route.
    pub endpoints: Vec<EndpointDefinition>,
    pub failures: Vec<UnitFailure>,
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

pub struct Generator {
    engine: SchemaInferenceEngine,
}

struct PendingUnit {
    source_file: String,
    canonical_name: String,
    descriptor: FunctionDescriptor,
}

impl Generator {
    pub fn new(engine: SchemaInferenceEngine) -> Self {
        Self { engine }
    }

    pub async fn run(&self, repo: &Repository) -> GenerationReport {
        let mut report = GenerationReport::default();
        let mut names = NameAllocator::new();
        let mut pending: Vec<PendingUnit> = Vec::new();

        let owned = repo.clone();
        let analyzed = match tokio::task::spawn_blocking(move || analyze_repository(&owned)).await {
            Ok(analyzed) => analyzed,
            Err(e) => {
                tracing::error!(error = %e, "repository analysis task failed");
                report.failures.push(UnitFailure {
                    source_file: String::new(),
                    function: None,
                    kind: FailureKind::Analysis,
                    message: format!("analysis task failed: {e}"),
                });
                return report;
            }
        };

        for (path, analyzed) in analyzed {
            let inventory = match analyzed {
                Ok(inventory) => inventory,
                Err(e) => {
                    tracing::warn!(file = %path, error = %e, "source analysis failed");
                    report.failures.push(UnitFailure {
                        source_file: path,
                        function: None,
                        kind: FailureKind::Analysis,
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            for descriptor in inventory.functions {
                match to_canonical_type_name(&descriptor.name) {
                    Ok(base) => pending.push(PendingUnit {
                        source_file: path.clone(),
                        canonical_name: names.claim(&base),
                        descriptor,
                    }),
                    Err(e) => {
                        tracing::warn!(file = %path, function = %descriptor.name, error = %e, "skipping function");
                        report.failures.push(UnitFailure {
                            source_file: path.clone(),
                            function: Some(descriptor.name),
                            kind: FailureKind::Identifier,
                            message: e.to_string(),
                        });
                    }
                }
            }
        }

        let descriptors: Vec<FunctionDescriptor> =
            pending.iter().map(|u| u.descriptor.clone()).collect();
        let inferred = self.engine.infer_all(&descriptors).await;

        for (unit, schema) in pending.into_iter().zip(inferred) {
            match synthesize(&unit.descriptor, &unit.source_file, unit.canonical_name, schema) {
                Ok(model) => report.models.push(model),
                Err(e) => report.failures.push(UnitFailure {
                    source_file: unit.source_file,
                    function: Some(unit.descriptor.name),
                    kind: FailureKind::Identifier,
                    message: e.to_string(),
                }),
            }
        }

        let batch = synthesize_endpoints(&report.models);
        for (canonical_name, e) in batch.rejected {
            if let Some(idx) = report
                .models
                .iter()
                .position(|m| m.canonical_name == canonical_name)
            {
                let model = report.models.remove(idx);
                report.failures.push(UnitFailure {
                    source_file: model.source_file,
                    function: Some(model.function_name),
                    kind: FailureKind::Route,
                    message: e.to_string(),
                });
            }
        }
        report.endpoints = batch.endpoints;

        tracing::info!(
            files = repo.len(),
            models = report.models.len(),
            endpoints = report.endpoints.len(),
            failures = report.failures.len(),
            "generation complete"
        );
        report
    }
}
