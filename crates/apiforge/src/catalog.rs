//! In-memory view of a generated catalog, ready to serve.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use apiforge_schema::schema::generate_openapi;
use apiforge_schema::{
    ArtifactStore, EndpointDefinition, FunctionRegistry, GenerationReport, ModelDefinition,
    SchemaError,
};
use serde_json::Value;
use thiserror::Error;

use crate::input_validation::InputValidator;
use crate::version::APIFORGE_VERSION;

pub const CATALOG_TITLE: &str = "apiforge";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Store(#[from] SchemaError),

    #[error("endpoint {route} refers to unknown model {model}")]
    DanglingEndpoint { route: String, model: String },

    #[error("input schema of {model} does not compile: {reason}")]
    InvalidSchema { model: String, reason: String },
}

/// An endpoint with its compiled input validator.
#[derive(Debug)]
pub struct Route {
    pub endpoint: EndpointDefinition,
    pub validator: InputValidator,
}

#[derive(Debug)]
pub struct Catalog {
    root: Option<PathBuf>,
    models: BTreeMap<String, ModelDefinition>,
    routes: HashMap<String, Route>,
    openapi: Value,
}

impl Catalog {
    /// Read a catalog written by [`ArtifactStore::write_report`].
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let dir = dir.as_ref();
        let store = ArtifactStore::new(dir);
        let models = store.load_models()?;
        let endpoints = store.load_endpoints()?;

        let mut catalog = Self::from_parts(models, endpoints)?;
        catalog.root = Some(dir.to_path_buf());
        tracing::info!(
            root = %dir.display(),
            models = catalog.len(),
            routes = catalog.routes.len(),
            "loaded catalog"
        );
        Ok(catalog)
    }

    pub fn from_report(report: &GenerationReport) -> Result<Self, CatalogError> {
        Self::from_parts(report.models.clone(), report.endpoints.clone())
    }

    pub fn from_parts(
        models: Vec<ModelDefinition>,
        endpoints: Vec<EndpointDefinition>,
    ) -> Result<Self, CatalogError> {
        let openapi = generate_openapi(CATALOG_TITLE, APIFORGE_VERSION, &models, &endpoints);
        let models: BTreeMap<String, ModelDefinition> = models
            .into_iter()
            .map(|m| (m.canonical_name.clone(), m))
            .collect();

        let mut routes = HashMap::with_capacity(endpoints.len());
        for endpoint in endpoints {
            let Some(model) = models.get(&endpoint.canonical_name) else {
                return Err(CatalogError::DanglingEndpoint {
                    route: endpoint.route_path,
                    model: endpoint.canonical_name,
                });
            };
            let validator =
                InputValidator::for_model(model).map_err(|reason| CatalogError::InvalidSchema {
                    model: model.canonical_name.clone(),
                    reason,
                })?;
            routes.insert(
                endpoint.route_path.clone(),
                Route {
                    endpoint,
                    validator,
                },
            );
        }

        Ok(Self {
            root: None,
            models,
            routes,
            openapi,
        })
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Canonical names, sorted.
    pub fn model_names(&self) -> Vec<&str> {
        self.models.keys().map(String::as_str).collect()
    }

    pub fn model(&self, canonical_name: &str) -> Option<&ModelDefinition> {
        self.models.get(canonical_name)
    }

    pub fn models(&self) -> impl Iterator<Item = &ModelDefinition> {
        self.models.values()
    }

    /// The route and model serving `route_path`.
    pub fn resolve(&self, route_path: &str) -> Option<(&Route, &ModelDefinition)> {
        let route = self.routes.get(route_path)?;
        let model = self.models.get(&route.endpoint.canonical_name)?;
        Some((route, model))
    }

    /// Route path serving `canonical_name`, if any.
    pub fn route_of(&self, canonical_name: &str) -> Option<&str> {
        self.routes
            .values()
            .find(|r| r.endpoint.canonical_name == canonical_name)
            .map(|r| r.endpoint.route_path.as_str())
    }

    pub fn openapi(&self) -> &Value {
        &self.openapi
    }

    /// Registry answering every endpoint with its model's stub body.
    pub fn stub_registry(&self) -> FunctionRegistry {
        let models: Vec<ModelDefinition> = self.models.values().cloned().collect();
        FunctionRegistry::with_stubs(&models)
    }
}
