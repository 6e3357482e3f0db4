//! Version information for apiforge.

use apiforge_schema::schema::OPENAPI_VERSION;

/// apiforge version from Cargo.toml
pub const APIFORGE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version information reported by `/health`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct VersionInfo {
    pub apiforge: &'static str,
    /// OpenAPI version of the served document.
    pub openapi: &'static str,
    /// Directory the catalog was loaded from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,
}

impl Default for VersionInfo {
    fn default() -> Self {
        Self {
            apiforge: APIFORGE_VERSION,
            openapi: OPENAPI_VERSION,
            catalog: None,
        }
    }
}

impl VersionInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(mut self, catalog: String) -> Self {
        self.catalog = Some(catalog);
        self
    }
}
