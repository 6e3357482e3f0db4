//! apiforge: scrape Python repositories, generate typed models and endpoints,
//! and serve the resulting catalog over HTTP.

pub mod catalog;
pub mod github;
pub mod input_validation;
pub mod llm;
pub mod telemetry;
pub mod transport;
mod version;

pub use catalog::{Catalog, CatalogError};
pub use github::{FetchError, GithubConfig, GithubFetcher, parse_repo_ref};
pub use llm::{ChatCompletionClient, LlmConfig, inference_engine};
pub use transport::{AppState, ServerConfig, serve};
pub use version::{APIFORGE_VERSION, VersionInfo};
