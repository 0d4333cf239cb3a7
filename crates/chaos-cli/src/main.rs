//! Chaos CLI - run particle scenes headless and probe the GPU path

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{probe, simulate};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chaos")]
#[command(about = "Particle layer batching for the chaos engine", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a particle scene on the host device and report batching per frame
    Simulate {
        /// Path to scene file
        scene: String,

        /// Number of frames to run (overrides the scene)
        #[arg(long)]
        frames: Option<u32>,

        /// Seconds per frame
        #[arg(long, default_value = "0.016666668")]
        dt: f32,

        /// Emitter random seed
        #[arg(long, default_value = "1")]
        seed: u32,

        /// Cap on host buffer memory in bytes, to exercise exhaustion
        #[arg(long)]
        budget: Option<usize>,

        /// Output format (text or json)
        #[arg(long, default_value = "text", value_parser = parse_format)]
        format: String,
    },

    /// Push one batch of quads through a headless wgpu device
    Probe {
        /// Number of quads to draw
        #[arg(long, default_value = "1000")]
        quads: usize,

        /// Quads per draw call
        #[arg(long, default_value = "16384")]
        max_quads_per_draw: usize,

        /// Target size in pixels
        #[arg(long, default_value = "256")]
        size: u32,
    },
}

fn parse_format(s: &str) -> Result<String, String> {
    match s {
        "text" | "json" => Ok(s.to_string()),
        _ => Err(format!("unknown format '{}'; valid values: text, json", s)),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            scene,
            frames,
            dt,
            seed,
            budget,
            format,
        } => simulate::run(simulate::SimulateArgs {
            scene,
            frames,
            dt,
            seed,
            budget,
            format,
        }),
        Commands::Probe {
            quads,
            max_quads_per_draw,
            size,
        } => probe::run(probe::ProbeArgs {
            quads,
            max_quads_per_draw,
            size,
        }),
    }
}
