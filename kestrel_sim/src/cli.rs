// kestrel_sim/src/cli.rs

use clap::Parser;
use std::path::PathBuf;

/// Kestrel: a deterministic, headless swerve-drive scenario runner.
///
/// Replays a scripted operator against a simulated chassis with noisy,
/// latency-afflicted sensors and reports how well the estimate tracked
/// the ground truth.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The path to the scenario TOML file to run.
    #[arg(short, long, default_value = "assets/scenarios/01_teleop_lap.toml")]
    pub scenario: PathBuf,

    /// Override the scenario's random seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Override the scenario's duration (s).
    #[arg(long)]
    pub duration: Option<f64>,

    /// Override the control tick rate (Hz).
    #[arg(long)]
    pub rate: Option<f64>,
}
