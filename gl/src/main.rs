//! gl - distributed Game of Life engine
//!
//! CLI entry point: run a simulation or inspect the partition plan.

use clap::Parser;
use eyre::{Context, Result};
use tracing::info;

use gridlife::cli::{Cli, Command, OutputFormat};
use gridlife::config::Config;
use gridlife::engine::Engine;
use gridlife::events::EngineEvent;
use gridlife::plan::PartitionPlan;

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    match cli.command {
        Command::Run {
            grid_size,
            workers,
            generations,
            pattern,
            density,
            seed,
            format,
        } => {
            let config = Config {
                grid_size: grid_size.unwrap_or(config.grid_size),
                worker_count: workers.unwrap_or(config.worker_count),
                generations: generations.unwrap_or(config.generations),
                pattern: pattern.unwrap_or(config.pattern),
                density: density.unwrap_or(config.density),
                seed: seed.or(config.seed),
                ..config
            };
            cmd_run(&config, format).await
        }
        Command::Plan { grid_size, workers } => cmd_plan(
            grid_size.unwrap_or(config.grid_size),
            workers.unwrap_or(config.worker_count),
        ),
    }
}

/// Run a simulation to completion and print the final grid
async fn cmd_run(config: &Config, format: OutputFormat) -> Result<()> {
    eyre::ensure!(
        config.density.is_finite(),
        "density must be a finite value between 0 and 1, got {}",
        config.density
    );

    info!(
        grid_size = config.grid_size,
        workers = config.worker_count,
        generations = config.generations,
        "starting run"
    );

    let handle = Engine::spawn(config).context("Failed to start engine")?;

    // Log progress as generations complete; lagging just skips old events.
    let mut events = handle.subscribe();
    let progress = tokio::spawn(async move {
        let mut summary = None;
        loop {
            match events.recv().await {
                Ok(EngineEvent::GenerationCompleted {
                    generation,
                    live_cells,
                    duration_ms,
                }) => {
                    info!(generation, live_cells, duration_ms, "generation complete");
                }
                Ok(EngineEvent::RunCompleted {
                    generations,
                    live_cells,
                    duration_ms,
                }) => {
                    summary = Some((generations, live_cells, duration_ms));
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
        summary
    });

    let grid = handle.wait().await?;
    let summary = progress.await.context("event logger panicked")?;

    if let Some((generations, _live_cells, duration_ms)) = summary {
        println!(
            "Total duration for {} generations with {}x{} grid is {} milliseconds.",
            generations,
            grid.height(),
            grid.width(),
            duration_ms
        );
    }

    match format {
        OutputFormat::Text => print!("{}", grid.render_text()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&grid)?),
    }

    Ok(())
}

/// Print the row assignment without running anything
fn cmd_plan(grid_size: usize, workers: usize) -> Result<()> {
    let plan = PartitionPlan::compute(grid_size, workers)
        .context("Failed to compute partition plan")?;

    println!("Partition plan for {} rows over {} workers:", grid_size, workers);
    for range in plan.ranges() {
        println!(
            "  worker {:>3}: rows {:>5}..{:<5} ({} rows)",
            range.worker_id,
            range.row_offset,
            range.row_offset + range.row_count,
            range.row_count
        );
    }

    Ok(())
}
