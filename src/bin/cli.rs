// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! V-HACD bridge CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use vhacd_bridge::{
    io, Backend, BridgeConfig, ComponentEngine, DecompositionEngine, EngineSession, MeshBatch,
    ParryEngine, ProgressCallback, ProgressEvent, RawMeshBuffer,
};

#[derive(Parser)]
#[command(name = "vhacd-bridge")]
#[command(about = "Convex decomposition of triangle meshes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./vhacd-bridge.toml when present)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Decompose an STL mesh into convex hulls
    Decompose {
        /// Input STL file
        input: PathBuf,

        /// Directory receiving one STL per hull
        #[arg(short, long, default_value = "hulls")]
        out_dir: PathBuf,

        /// Engine backend (parry, components, native)
        #[arg(short, long)]
        backend: Option<Backend>,

        /// Maximum number of hulls
        #[arg(long)]
        max_hulls: Option<u32>,

        /// Maximum vertices per hull
        #[arg(long)]
        max_vertices: Option<u32>,

        /// Compute on the calling thread instead of a worker
        #[arg(long)]
        sync: bool,

        /// Write a JSON summary of the batch
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,
    },

    /// Print the effective configuration as TOML
    Params,

    /// Show version information
    Version,
}

fn load_config(path: Option<&Path>) -> Result<BridgeConfig> {
    let mut config = match path {
        Some(path) => BridgeConfig::from_file(path)?,
        None => return BridgeConfig::load(),
    };
    config.apply_env_overrides(|key| std::env::var(key).ok())?;
    Ok(config)
}

fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;
    init_tracing(&config.log_filter);

    match cli.command {
        Commands::Decompose {
            input,
            out_dir,
            backend,
            max_hulls,
            max_vertices,
            sync,
            report,
        } => {
            if let Some(backend) = backend {
                config.backend = backend;
            }
            if let Some(max_hulls) = max_hulls {
                config.parameters.max_convex_hulls = max_hulls;
            }
            if let Some(max_vertices) = max_vertices {
                config.parameters.max_vertices_per_hull = max_vertices;
            }
            if sync {
                config.parameters.is_async = false;
            }
            decompose_command(&config, &input, &out_dir, report.as_deref())?;
        }
        Commands::Params => {
            print!("{}", config.to_toml()?);
        }
        Commands::Version => {
            println!("vhacd-bridge v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

fn decompose_command(
    config: &BridgeConfig,
    input: &Path,
    out_dir: &Path,
    report: Option<&Path>,
) -> Result<()> {
    if !input.exists() {
        eprintln!("{} Input file not found: {}", "Error:".red(), input.display());
        std::process::exit(1);
    }

    let mesh = io::import_stl(input)?;
    println!(
        "Loaded {} ({} vertices, {} triangles)",
        input.display(),
        mesh.vertex_count(),
        mesh.triangle_count()
    );

    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")?
            .progress_chars("#>-"),
    );

    let start = Instant::now();
    let batch = match config.backend {
        Backend::Parry => run(ParryEngine::new(), config, &mesh, progress_callback(&bar))?,
        Backend::Components => run(ComponentEngine::new(), config, &mesh, progress_callback(&bar))?,
        #[cfg(feature = "native")]
        Backend::Native => run(
            vhacd_bridge::NativeEngine::new(),
            config,
            &mesh,
            progress_callback(&bar),
        )?,
        #[cfg(not(feature = "native"))]
        Backend::Native => anyhow::bail!("the native backend requires building with --features native"),
    };
    bar.finish_and_clear();

    let Some(batch) = batch else {
        eprintln!(
            "{} the {} engine could not decompose {}",
            "Failed:".red(),
            config.backend,
            input.display()
        );
        std::process::exit(2);
    };

    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("hull");
    let written = io::export_batch_stl(&batch, out_dir, stem)?;
    print_summary(&batch, start.elapsed().as_secs_f64());
    println!("Wrote {} files to {}", written.len(), out_dir.display());

    if let Some(path) = report {
        io::write_report(&batch.summary(), path)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        println!("Report: {}", path.display());
    }

    Ok(())
}

/// Session, compute, extraction, assembly. The batch uses the configured
/// assembler, which may pin an index width.
fn run<E: DecompositionEngine>(
    engine: E,
    config: &BridgeConfig,
    mesh: &vhacd_bridge::Mesh,
    callback: ProgressCallback,
) -> Result<Option<MeshBatch>> {
    let buffer = RawMeshBuffer::from_mesh(mesh)?;
    let mut session = EngineSession::new(engine, config.parameters.clone())?;
    let outcome = if config.parameters.is_async {
        pollster::block_on(session.compute_async(buffer, Some(callback)))?
    } else {
        session.compute(buffer, Some(callback))?
    };
    if !outcome.is_success() {
        session.release();
        return Ok(None);
    }

    let hulls = session.extractor().fetch_all();
    session.release();
    Ok(Some(config.assembler().assemble(hulls?)?))
}

fn progress_callback(bar: &ProgressBar) -> ProgressCallback {
    let bar = bar.clone();
    Box::new(move |event: &ProgressEvent| {
        bar.set_position(event.percent() as u64);
        bar.set_message(format!("{}: {}", event.stage, event.operation));
    })
}

fn print_summary(batch: &MeshBatch, seconds: f64) {
    let summary = batch.summary();
    println!(
        "{} {} convex hulls in {:.2}s",
        "Decomposed:".green().bold(),
        summary.hull_count,
        seconds
    );
    for hull in &summary.hulls {
        println!(
            "  hull {:>3}: {:>4} vertices, {:>4} triangles",
            hull.index, hull.vertex_count, hull.triangle_count
        );
    }
    println!(
        "  total: {} vertices, {} triangles",
        summary.total_vertices, summary.total_triangles
    );
}
