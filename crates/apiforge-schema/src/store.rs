//! Persisted catalog layout.
//!
//! ```text
//! <root>/models/<CanonicalName>.json   one ModelDefinition
//! <root>/models/<CanonicalName>.py     rendered Python artifact
//! <root>/endpoints.json                EndpointDefinitions, sorted by route
//! <root>/openapi.json                  OpenAPI document
//! <root>/failures.json                 per-unit failures of the last run
//! ```

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::endpoint::EndpointDefinition;
use crate::error::{Result, SchemaError};
use crate::model::ModelDefinition;
use crate::pipeline::{GenerationReport, UnitFailure};
use crate::schema::generate_openapi;

pub const MODELS_DIR: &str = "models";
pub const ENDPOINTS_FILE: &str = "endpoints.json";
pub const OPENAPI_FILE: &str = "openapi.json";
pub const FAILURES_FILE: &str = "failures.json";

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn models_dir(&self) -> PathBuf {
        self.root.join(MODELS_DIR)
    }

    /// Persist a whole generation run. The persisted model set afterwards is
    /// exactly the run's model set.
    pub fn write_report(&self, report: &GenerationReport, title: &str, version: &str) -> Result<()> {
        let models_dir = self.models_dir();
        std::fs::create_dir_all(&models_dir).map_err(|e| SchemaError::io(&models_dir, e))?;
        self.remove_stale_models(report)?;

        for model in &report.models {
            self.write_model(model)?;
        }
        write_json(&self.root.join(ENDPOINTS_FILE), &report.endpoints)?;
        write_json(
            &self.root.join(OPENAPI_FILE),
            &generate_openapi(title, version, &report.models, &report.endpoints),
        )?;
        write_json(&self.root.join(FAILURES_FILE), &report.failures)?;

        tracing::info!(
            root = %self.root.display(),
            models = report.models.len(),
            "wrote catalog"
        );
        Ok(())
    }

    fn remove_stale_models(&self, report: &GenerationReport) -> Result<()> {
        let dir = self.models_dir();
        let entries = std::fs::read_dir(&dir).map_err(|e| SchemaError::io(&dir, e))?;
        for entry in entries {
            let path = entry.map_err(|e| SchemaError::io(&dir, e))?.path();
            let is_artifact = path
                .extension()
                .is_some_and(|ext| ext == "json" || ext == "py");
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if !is_artifact || report.models.iter().any(|m| m.canonical_name == stem) {
                continue;
            }
            std::fs::remove_file(&path).map_err(|e| SchemaError::io(&path, e))?;
            tracing::debug!(path = %path.display(), "removed stale model");
        }
        Ok(())
    }

    pub fn write_model(&self, model: &ModelDefinition) -> Result<()> {
        let dir = self.models_dir();
        std::fs::create_dir_all(&dir).map_err(|e| SchemaError::io(&dir, e))?;

        write_json(&dir.join(format!("{}.json", model.canonical_name)), model)?;
        let py = dir.join(format!("{}.py", model.canonical_name));
        std::fs::write(&py, model.render_python()).map_err(|e| SchemaError::io(&py, e))?;
        tracing::debug!(model = %model.canonical_name, "wrote model");
        Ok(())
    }

    /// All persisted models, ordered by canonical name.
    pub fn load_models(&self) -> Result<Vec<ModelDefinition>> {
        let dir = self.models_dir();
        let entries = std::fs::read_dir(&dir).map_err(|e| SchemaError::io(&dir, e))?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| SchemaError::io(&dir, e))?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        paths.iter().map(|p| read_json(p)).collect()
    }

    pub fn load_model(&self, canonical_name: &str) -> Result<Option<ModelDefinition>> {
        let path = self.models_dir().join(format!("{canonical_name}.json"));
        if !path.is_file() {
            return Ok(None);
        }
        read_json(&path).map(Some)
    }

    pub fn load_endpoints(&self) -> Result<Vec<EndpointDefinition>> {
        read_json(&self.root.join(ENDPOINTS_FILE))
    }

    /// Failures of the last run; empty when none were recorded.
    pub fn load_failures(&self) -> Result<Vec<UnitFailure>> {
        let path = self.root.join(FAILURES_FILE);
        if !path.is_file() {
            return Ok(Vec::new());
        }
        read_json(&path)
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut json = serde_json::to_string_pretty(value).map_err(|e| SchemaError::InvalidArtifact {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    json.push('\n');
    std::fs::write(path, json).map_err(|e| SchemaError::io(path, e))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).map_err(|e| SchemaError::io(path, e))?;
    serde_json::from_str(&text).map_err(|e| SchemaError::InvalidArtifact {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}
