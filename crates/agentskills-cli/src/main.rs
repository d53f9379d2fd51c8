//! CLI entry point for agentskills.
//!
//! This binary provides the `agentskills` command with subcommands for
//! listing, inspecting, combining and invoking skills loaded from manifest
//! folders.

mod builtins;
mod cli;

use std::path::{Path, PathBuf};

use agentskills_core::{
    AgentSkillsConfig, ExecutionMode, Invocation, LastCall, LoadFilter, SkillArgs, SkillLoader,
    SkillRegistry,
};
use anyhow::{Context, Result, bail};
use clap::Parser;
use serde_json::{Map, Value, json};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, SetOp};

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let config = match &cli.config {
        Some(path) => AgentSkillsConfig::load(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => AgentSkillsConfig::default(),
    };

    match cli.command {
        Commands::List {
            dir,
            tags,
            exclude_tags,
        } => {
            let filter = LoadFilter::new().by_tags(tags).exclude_tags(exclude_tags);
            cmd_list(&config, dir, &filter)
        }
        Commands::Show { name, dir } => cmd_show(&config, dir, &name),
        Commands::Combine { op, dir_a, dir_b } => cmd_combine(&config, op, &dir_a, &dir_b),
        Commands::Invoke {
            name,
            dir,
            args,
            kwargs,
            mode,
        } => cmd_invoke(&config, dir, &name, &args, &kwargs, &mode),
        Commands::Tools { dir } => cmd_tools(&config, dir),
    }
}

// ---------------------------------------------------------------------------
// Subcommand: list
// ---------------------------------------------------------------------------

fn cmd_list(config: &AgentSkillsConfig, dir: Option<PathBuf>, filter: &LoadFilter) -> Result<()> {
    let dir = dir.unwrap_or_else(|| config.resolved_skills_dir());
    let registry = load_registry(config, &dir, filter)?;

    if registry.is_empty() {
        println!("No skills found in {}.", dir.display());
        return Ok(());
    }

    println!("{:<32} {:<32} DESCRIPTION", "KEY", "TAGS");
    for record in registry.records() {
        let tags: Vec<&str> = record.tags().iter().map(String::as_str).collect();
        println!(
            "{:<32} {:<32} {}",
            record.key(),
            tags.join(","),
            record.description()
        );
    }
    println!();
    println!("{} skill(s)", registry.len());
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: show
// ---------------------------------------------------------------------------

fn cmd_show(config: &AgentSkillsConfig, dir: Option<PathBuf>, name: &str) -> Result<()> {
    let dir = dir.unwrap_or_else(|| config.resolved_skills_dir());
    let registry = load_registry(config, &dir, &LoadFilter::new())?;

    let metadata = registry
        .get_metadata(name)
        .with_context(|| format!("no skill `{name}` in {}", dir.display()))?;
    println!("{}", serde_json::to_string_pretty(&metadata)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: combine
// ---------------------------------------------------------------------------

fn cmd_combine(config: &AgentSkillsConfig, op: SetOp, dir_a: &Path, dir_b: &Path) -> Result<()> {
    let a = load_registry(config, dir_a, &LoadFilter::new())?;
    let b = load_registry(config, dir_b, &LoadFilter::new())?;

    let combined = match op {
        SetOp::Union => a.union(&b),
        SetOp::Intersection => a.intersection(&b),
        SetOp::Difference => a.difference(&b),
        SetOp::SymmetricDifference => a.symmetric_difference(&b),
    };
    info!(?op, left = a.len(), right = b.len(), result = combined.len(), "registries combined");

    for key in combined.get_keys() {
        println!("{key}");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: invoke
// ---------------------------------------------------------------------------

fn cmd_invoke(
    config: &AgentSkillsConfig,
    dir: Option<PathBuf>,
    name: &str,
    args: &str,
    kwargs: &str,
    mode: &str,
) -> Result<()> {
    let dir = dir.unwrap_or_else(|| config.resolved_skills_dir());
    let registry = load_registry(config, &dir, &LoadFilter::new())?;

    let args: Vec<Value> = serde_json::from_str(args).context("--args must be a JSON array")?;
    let kwargs: Map<String, Value> =
        serde_json::from_str(kwargs).context("--kwargs must be a JSON object")?;
    let mode: ExecutionMode = mode.parse()?;
    let call = SkillArgs { args, kwargs };

    let record = registry
        .resolve(name)
        .with_context(|| format!("no skill `{name}` in {}", dir.display()))?;

    match registry.invoke_with_mode(record.key(), call, mode) {
        Ok(Invocation::Completed(value)) => {
            print_result(&value)?;
            print_last_call(&record.tracker().get_last_call())
        }
        Ok(Invocation::Planned { key, args }) => {
            let plan = json!({ "key": key, "args": args.args, "kwargs": args.kwargs });
            println!("{}", serde_json::to_string_pretty(&plan)?);
            Ok(())
        }
        Ok(Invocation::Dispatched(handle)) => {
            info!(skill = %record.key(), "waiting for dispatched call");
            let outcome = match handle.join() {
                Ok(outcome) => outcome,
                Err(_) => bail!("skill `{}` panicked", record.key()),
            };
            let last = record.tracker().latest_call();
            match outcome {
                Ok(value) => {
                    print_result(&value)?;
                    print_last_call(&last)
                }
                Err(e) => {
                    print_last_call(&last)?;
                    Err(e.into())
                }
            }
        }
        Err(e) => {
            if e.skill_fault().is_some() {
                print_last_call(&record.tracker().get_last_call())?;
            }
            Err(e).with_context(|| format!("invoking `{}`", record.key()))
        }
    }
}

fn print_result(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_last_call(call: &LastCall) -> Result<()> {
    let record = json!({
        "status": format!("{:?}", call.status()),
        "args": call.args,
        "kwargs": call.kwargs,
        "result": call.result,
        "exception": call.exception.as_ref().map(|e| e.to_string()),
        "called_at": call.called_at.map(|t| t.to_rfc3339()),
    });
    eprintln!("last call: {}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: tools
// ---------------------------------------------------------------------------

fn cmd_tools(config: &AgentSkillsConfig, dir: Option<PathBuf>) -> Result<()> {
    let dir = dir.unwrap_or_else(|| config.resolved_skills_dir());
    let registry = load_registry(config, &dir, &LoadFilter::new())?;
    println!(
        "{}",
        serde_json::to_string_pretty(&registry.tool_definitions())?
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Load every manifest in `dir` into a fresh registry backed by the built-in
/// handlers.
fn load_registry(config: &AgentSkillsConfig, dir: &Path, filter: &LoadFilter) -> Result<SkillRegistry> {
    let registry = SkillRegistry::with_config(config.registry.clone());
    let loader = SkillLoader::new(registry, builtins::catalog()).with_config(config.loader.clone());
    let count = loader
        .from_folder(dir, filter)
        .with_context(|| format!("failed to load skills from {}", dir.display()))?;
    info!(dir = %dir.display(), count, "skills loaded");
    Ok(loader.registry().clone())
}

/// Initialize the tracing subscriber with the given default log level.
fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
