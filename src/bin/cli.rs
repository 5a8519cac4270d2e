//! Softground CLI - run footprint scenarios headless

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use softground::config::{EngineConfig, MaterialPreset};
use softground::deform::observation::{JsonLinesSink, NullSink};
use softground::rig::Scenario;

#[derive(Parser)]
#[command(name = "softground")]
#[command(about = "Footprint deformation engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk a scripted biped across a terrain and report the deformation
    Run {
        /// Path to a TOML config (defaults are used when omitted)
        #[arg(short, long, env = "SOFTGROUND_CONFIG")]
        config: Option<PathBuf>,
        /// Rendered frames to simulate (overrides simulation.frames)
        #[arg(short, long)]
        frames: Option<u32>,
        /// Write one JSON observation per frame to this file
        #[arg(long)]
        trace: Option<PathBuf>,
        /// Write the final committed heights as JSON to this file
        #[arg(long)]
        dump: Option<PathBuf>,
    },
    /// List the built-in material presets
    Presets,
    /// Check a config file without running it
    Validate {
        /// Path to the TOML config
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            config,
            frames,
            trace,
            dump,
        } => run_scenario(config.as_deref(), frames, trace.as_deref(), dump.as_deref()),
        Commands::Presets => list_presets(),
        Commands::Validate { config } => validate_config(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn load_config(path: Option<&Path>) -> Result<EngineConfig, softground::config::ConfigError> {
    match path {
        Some(path) => EngineConfig::from_file(path),
        None => {
            let config = EngineConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

// =============================================================================
// Run Command
// =============================================================================

#[derive(Serialize)]
struct HeightDump {
    width: usize,
    height: usize,
    heights: Vec<f32>,
}

fn run_scenario(
    config_path: Option<&Path>,
    frames: Option<u32>,
    trace: Option<&Path>,
    dump: Option<&Path>,
) -> CliResult {
    let config = load_config(config_path)?;
    let frames = frames.unwrap_or(config.simulation.frames);
    let mut scenario = Scenario::from_config(&config)?;

    let report = match trace {
        Some(path) => {
            let file = File::create(path)?;
            let mut sink = JsonLinesSink::new(BufWriter::new(file));
            let report = scenario.run(frames, &mut sink);
            flush_sink(sink)?;
            report
        }
        None => scenario.run(frames, &mut NullSink),
    };

    if let Some(path) = dump {
        let ((width, height), heights) = scenario.committed_heights();
        let file = File::create(path)?;
        serde_json::to_writer(BufWriter::new(file), &HeightDump { width, height, heights })?;
        eprintln!("Heights written to {}", path.display());
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn flush_sink(sink: JsonLinesSink<BufWriter<File>>) -> CliResult {
    let writer = sink.into_inner();
    writer.into_inner().map_err(|e| e.into_error())?;
    Ok(())
}

// =============================================================================
// Presets / Validate Commands
// =============================================================================

fn list_presets() -> CliResult {
    println!(
        "{:<10} {:>14} {:>13} {:>8} {:>8}",
        "preset", "young_modulus", "contact_time", "poisson", "filter"
    );
    for preset in MaterialPreset::ALL {
        let p = preset.params();
        println!(
            "{:<10} {:>14} {:>13} {:>8} {:>8}",
            preset.name(),
            p.young_modulus,
            p.contact_time,
            p.poisson_ratio,
            p.filter_iterations
        );
    }
    Ok(())
}

fn validate_config(path: &Path) -> CliResult {
    let config = EngineConfig::from_file(path)?;
    let material = config.material_params();
    println!(
        "{}: ok ({} samples, preset {}, E = {} Pa, contact time {} s)",
        path.display(),
        config.terrain.resolution,
        config.material.preset.name(),
        material.young_modulus,
        material.contact_time
    );
    Ok(())
}
