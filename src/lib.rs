// src/lib.rs

pub mod build;
pub mod cli;
pub mod config;
pub mod errors;
pub mod graph;
pub mod logging;
pub mod metadata;
pub mod run;
pub mod submit;
pub mod types;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::build::MakeBuild;
use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::{ConfigFile, parse_duration};
use crate::graph::{NodeKind, RunGraph};
use crate::metadata::JsonFileStore;
use crate::run::{Orchestrator, RunOptions, RunReport};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and graph construction
/// - the metadata store and the build step
/// - the orchestrator, run on a blocking thread
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    let graph = RunGraph::from_config(&cfg)?;

    if args.dry_run {
        print_dry_run(&cfg, &graph);
        return Ok(());
    }

    let opts = run_options(&args, &cfg)?;
    let store = JsonFileStore::open(&cfg.config.database)?;
    let build = if opts.force {
        MakeBuild::forced()
    } else {
        MakeBuild::new()
    };

    let mut orchestrator = Orchestrator::new(graph, Box::new(store), Box::new(build));

    // Ctrl-C → stop polling; submitted jobs are left alone.
    {
        let cancel = orchestrator.cancel_token();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            warn!("Ctrl-C received; stopping after the current poll");
            cancel.cancel();
        });
    }

    info!(config = %config_path.display(), ?opts, "starting run graph");
    let report = tokio::task::spawn_blocking(move || orchestrator.run(opts))
        .await
        .context("orchestrator thread panicked")??;

    print_report(&report);
    Ok(())
}

/// CLI flags are OR-ed onto `[config]`; `--wait-interval` replaces it.
fn run_options(args: &CliArgs, cfg: &ConfigFile) -> Result<RunOptions> {
    let wait_interval = match &args.wait_interval {
        Some(s) => parse_duration(s).map_err(|e| anyhow::anyhow!("--wait-interval: {e}"))?,
        None => cfg.config.wait_interval()?,
    };
    Ok(RunOptions {
        restart_all: args.restart_all || cfg.config.restart_all,
        force: args.force || cfg.config.force,
        raise_errors: args.raise_errors || cfg.config.raise_errors,
        wait_interval,
    })
}

fn print_report(report: &RunReport) {
    println!("simrunner finished");
    println!("  completed ({}): {:?}", report.completed.len(), report.completed);
    println!("  skipped   ({}): {:?}", report.skipped.len(), report.skipped);
    println!("  errored   ({}): {:?}", report.errored.len(), report.errored);
}

/// Simple dry-run output: print nodes, deps and what would be submitted.
fn print_dry_run(cfg: &ConfigFile, graph: &RunGraph) {
    println!("simrunner dry-run");
    println!("  config.wait_interval = {}", cfg.config.wait_interval);
    println!("  config.database = {}", cfg.config.database);
    println!();

    println!("nodes ({}):", graph.total_nodes());
    for node in graph.nodes() {
        println!("  - {} [{}, {}]", node.name, node.kind.label(), node.submitter.backend_name());
        let deps = graph.predecessors(&node.name);
        if !deps.is_empty() {
            println!("      after: {:?}", deps);
        }
        match &node.kind {
            NodeKind::BatchRun(setup) => {
                let exec = MakeBuild::find_makefile(&setup.project)
                    .and_then(|mf| MakeBuild::executable_name(&mf))
                    .unwrap_or_else(|_| "<executable>".to_string());
                println!("      cmd: {}", setup.command(&exec));
                if let Some(src) = &setup.restart_from {
                    println!("      restart_from: {}", src.display());
                }
            }
            NodeKind::FunctionCall(call) => {
                println!("      call: {}.{}", call.module, call.function);
            }
        }
    }
    println!();
    println!("{}", graph.to_dot());

    debug!("dry-run complete (no submission)");
}
