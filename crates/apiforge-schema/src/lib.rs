//! Static analysis and schema synthesis for turning Python functions into
//! typed endpoints.

pub mod dispatch;
pub mod endpoint;
pub mod error;
pub mod inference;
pub mod model;
pub mod naming;
pub mod parser;
pub mod pipeline;
pub mod schema;
pub mod store;
pub mod types;

pub use crate::dispatch::{FunctionRegistry, InvocationError};
pub use crate::endpoint::EndpointDefinition;
pub use crate::error::{Result, SchemaError};
pub use crate::inference::{InferenceConfig, OracleError, SchemaInferenceEngine, SchemaOracle};
pub use crate::model::ModelDefinition;
pub use crate::pipeline::{GenerationReport, Generator, Repository};
pub use crate::store::ArtifactStore;

/// High-level API: generate a catalog for every Python source under `src`
/// with heuristic inference only, and persist it under `out`.
pub async fn generate_offline(
    src: &std::path::Path,
    out: &std::path::Path,
) -> Result<GenerationReport> {
    let repo = Repository::from_dir(src)?;
    let report = Generator::new(SchemaInferenceEngine::heuristic_only())
        .run(&repo)
        .await;
    ArtifactStore::new(out).write_report(&report, "apiforge", env!("CARGO_PKG_VERSION"))?;
    Ok(report)
}
