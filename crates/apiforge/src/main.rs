use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::Context;
use apiforge::catalog::CATALOG_TITLE;
use apiforge::{
    APIFORGE_VERSION, AppState, Catalog, GithubConfig, GithubFetcher, LlmConfig, ServerConfig,
    inference_engine, parse_repo_ref, serve, telemetry,
};
use apiforge_schema::{ArtifactStore, Generator, Repository};

const USAGE: &str = "\
Usage:
  apiforge scrape <owner>/<repo> [--dest <dir>]
  apiforge generate --src <dir> --out <dir> [--no-ai]
  apiforge run <owner>/<repo> --out <dir> [--dest <dir>] [--no-ai]
  apiforge serve --models <dir> [--host <host>] [--port <port>]

Environment:
  DEEPSEEK_API_KEY      enables LLM schema inference
  GITHUB_TOKEN          authenticates GitHub API requests
  APIFORGE_LOG          log level when RUST_LOG is unset [default: info]
  LOG_FORMAT=json       emit JSON log lines";

#[derive(Debug, PartialEq)]
enum Command {
    Scrape {
        reference: String,
        dest: Option<PathBuf>,
    },
    Generate {
        src: PathBuf,
        out: PathBuf,
        use_ai: bool,
    },
    Run {
        reference: String,
        out: PathBuf,
        dest: Option<PathBuf>,
        use_ai: bool,
    },
    Serve {
        models: PathBuf,
        host: String,
        port: u16,
    },
}

#[derive(Debug, Default)]
struct Flags {
    positional: Vec<String>,
    src: Option<PathBuf>,
    out: Option<PathBuf>,
    dest: Option<PathBuf>,
    models: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
    no_ai: bool,
}

fn parse_flags(args: &[String]) -> Result<Flags, String> {
    let mut flags = Flags::default();
    let mut i = 0;
    while i < args.len() {
        let arg = args[i].as_str();
        let mut value = || {
            i += 1;
            args.get(i)
                .cloned()
                .ok_or_else(|| format!("{arg} requires a value"))
        };
        match arg {
            "--src" => flags.src = Some(PathBuf::from(value()?)),
            "--out" => flags.out = Some(PathBuf::from(value()?)),
            "--dest" => flags.dest = Some(PathBuf::from(value()?)),
            "--models" => flags.models = Some(PathBuf::from(value()?)),
            "--host" => flags.host = Some(value()?),
            "--port" => {
                let raw = value()?;
                flags.port = Some(raw.parse().map_err(|_| format!("invalid port: {raw}"))?);
            }
            "--no-ai" => flags.no_ai = true,
            "--help" | "-h" => return Err(String::new()),
            other if other.starts_with("--") => return Err(format!("unexpected argument: {other}")),
            other => flags.positional.push(other.to_string()),
        }
        i += 1;
    }
    Ok(flags)
}

fn parse_args(args: &[String]) -> Result<Command, String> {
    let Some(subcommand) = args.get(1) else {
        return Err(String::new());
    };
    let flags = parse_flags(&args[2..])?;

    let single_positional = |what: &str| -> Result<String, String> {
        match flags.positional.as_slice() {
            [one] => Ok(one.clone()),
            [] => Err(format!("{subcommand} requires {what}")),
            [_, extra, ..] => Err(format!("unexpected argument: {extra}")),
        }
    };
    let no_positional = || match flags.positional.first() {
        Some(extra) => Err(format!("unexpected argument: {extra}")),
        None => Ok(()),
    };

    let defaults = ServerConfig::default();
    match subcommand.as_str() {
        "scrape" => Ok(Command::Scrape {
            reference: single_positional("<owner>/<repo>")?,
            dest: flags.dest.clone(),
        }),
        "generate" => {
            no_positional()?;
            Ok(Command::Generate {
                src: flags.src.clone().ok_or("generate requires --src")?,
                out: flags.out.clone().ok_or("generate requires --out")?,
                use_ai: !flags.no_ai,
            })
        }
        "run" => Ok(Command::Run {
            reference: single_positional("<owner>/<repo>")?,
            out: flags.out.clone().ok_or("run requires --out")?,
            dest: flags.dest.clone(),
            use_ai: !flags.no_ai,
        }),
        "serve" => {
            no_positional()?;
            Ok(Command::Serve {
                models: flags.models.clone().ok_or("serve requires --models")?,
                host: flags.host.clone().unwrap_or(defaults.host),
                port: flags.port.unwrap_or(defaults.port),
            })
        }
        "--help" | "-h" => Err(String::new()),
        other => Err(format!("unknown command: {other}")),
    }
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();

    let command = match parse_args(&args) {
        Ok(command) => command,
        Err(msg) => {
            if !msg.is_empty() {
                eprintln!("error: {msg}");
                eprintln!();
            }
            eprintln!("{USAGE}");
            process::exit(2);
        }
    };

    telemetry::init_tracing();

    if let Err(e) = run(command).await {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

async fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Scrape { reference, dest } => {
            let repo = scrape(&reference, dest).await?;
            eprintln!("fetched {} files from {reference}", repo.len());
        }
        Command::Generate { src, out, use_ai } => {
            let src_for_walk = src.clone();
            let repo = tokio::task::spawn_blocking(move || Repository::from_dir(&src_for_walk))
                .await?
                .with_context(|| format!("failed to read {}", src.display()))?;
            generate(repo, out, use_ai).await?;
        }
        Command::Run {
            reference,
            out,
            dest,
            use_ai,
        } => {
            let repo = scrape(&reference, dest).await?;
            generate(repo, out, use_ai).await?;
        }
        Command::Serve { models, host, port } => {
            let dir = models.clone();
            let catalog = tokio::task::spawn_blocking(move || Catalog::load(&dir))
                .await?
                .with_context(|| format!("failed to load catalog from {}", models.display()))?;
            if catalog.is_empty() {
                tracing::warn!(dir = %models.display(), "catalog has no models");
            }
            let state = Arc::new(AppState::with_stubs(catalog));
            serve(ServerConfig { host, port }, state).await?;
        }
    }
    Ok(())
}

async fn scrape(reference: &str, dest: Option<PathBuf>) -> anyhow::Result<Repository> {
    let (owner, repo) = parse_repo_ref(reference)?;
    let fetcher = GithubFetcher::new(GithubConfig::from_env())?;
    let repository = match dest {
        Some(dest) => fetcher.fetch_into(&owner, &repo, &dest).await?,
        None => fetcher.fetch(&owner, &repo).await?,
    };
    Ok(repository)
}

async fn generate(repo: Repository, out: PathBuf, use_ai: bool) -> anyhow::Result<()> {
    let engine = inference_engine(LlmConfig::from_env(), use_ai);
    let report = Generator::new(engine).run(&repo).await;

    for failure in &report.failures {
        match &failure.function {
            Some(function) => eprintln!(
                "skipped {}::{}: {}",
                failure.source_file, function, failure.message
            ),
            None => eprintln!("skipped {}: {}", failure.source_file, failure.message),
        }
    }
    let (models, endpoints) = (report.models.len(), report.endpoints.len());

    let dir = out.clone();
    tokio::task::spawn_blocking(move || {
        ArtifactStore::new(&dir).write_report(&report, CATALOG_TITLE, APIFORGE_VERSION)
    })
    .await?
    .with_context(|| format!("failed to write catalog to {}", out.display()))?;

    eprintln!(
        "wrote {models} models and {endpoints} endpoints to {}",
        out.display()
    );
    Ok(())
}
