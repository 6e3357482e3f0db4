use std::path::{Path, PathBuf};
use std::process;

use apiforge_schema::error::SchemaError;
use apiforge_schema::schema::generate_openapi;
use apiforge_schema::{Generator, Repository, SchemaInferenceEngine};
use tracing_subscriber::EnvFilter;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let (src, out) = match parse_args(&args) {
        Ok(v) => v,
        Err(msg) => {
            eprintln!("error: {msg}");
            eprintln!();
            eprintln!("Usage: apiforge-schema [--src <dir>] [--out <dir>]");
            eprintln!();
            eprintln!("Options:");
            eprintln!("  --src <dir>      Source directory to analyze [default: .]");
            eprintln!("  --out <dir>      Write the catalog here instead of printing OpenAPI JSON");
            process::exit(2);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&src, out.as_deref()) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn parse_args(args: &[String]) -> Result<(PathBuf, Option<PathBuf>), String> {
    let mut src = PathBuf::from(".");
    let mut out: Option<PathBuf> = None;

    let mut i = 1; // skip argv[0]
    while i < args.len() {
        match args[i].as_str() {
            "--src" => {
                i += 1;
                src = PathBuf::from(args.get(i).ok_or("--src requires a value")?);
            }
            "--out" => {
                i += 1;
                out = Some(PathBuf::from(args.get(i).ok_or("--out requires a value")?));
            }
            "--help" | "-h" => return Err("".to_string()),
            arg => return Err(format!("unexpected argument: {arg}")),
        }
        i += 1;
    }

    Ok((src, out))
}

fn run(src: &Path, out: Option<&Path>) -> Result<(), SchemaError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| SchemaError::Other(format!("failed to start runtime: {e}")))?;

    if let Some(out) = out {
        let report = runtime.block_on(apiforge_schema::generate_offline(src, out))?;
        for failure in &report.failures {
            eprintln!("skipped {}: {}", failure.source_file, failure.message);
        }
        eprintln!(
            "wrote {} models and {} endpoints to {}",
            report.models.len(),
            report.endpoints.len(),
            out.display()
        );
        return Ok(());
    }

    let repo = Repository::from_dir(src)?;
    let report = runtime.block_on(
        Generator::new(SchemaInferenceEngine::heuristic_only()).run(&repo),
    );
    let schema = generate_openapi(
        "apiforge",
        env!("CARGO_PKG_VERSION"),
        &report.models,
        &report.endpoints,
    );

    let json = serde_json::to_string_pretty(&schema)
        .map_err(|e| SchemaError::Other(format!("JSON serialization failed: {e}")))?;

    println!("{json}");

    Ok(())
}
