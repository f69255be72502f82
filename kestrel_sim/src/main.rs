// kestrel_sim/src/main.rs

mod cli;
mod platform;
mod runner;
mod scenario;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::scenario::ScenarioConfig;

fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        eprintln!("kestrel_sim error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), scenario::ScenarioError> {
    let mut scenario = ScenarioConfig::load(&cli.scenario)?;
    if let Some(seed) = cli.seed {
        scenario.simulation.seed = seed;
    }
    if let Some(duration) = cli.duration {
        scenario.simulation.duration = duration;
    }
    if let Some(rate) = cli.rate {
        scenario.robot.estimator.nominal_period = 1.0 / rate;
    }
    if cli.duration.is_some() || cli.rate.is_some() {
        scenario.validate()?;
    }

    let summary = runner::run(&scenario)?;

    println!("ticks:              {}", summary.ticks);
    println!("dropped odometry:   {}", summary.dropped_odometry_ticks);
    println!("stale ticks:        {}", summary.stale_ticks);
    println!("vision fixes:       {}", summary.vision_fixes);
    println!(
        "truth pose:         ({:.3}, {:.3}) @ {:.3} rad",
        summary.final_truth.translation.x,
        summary.final_truth.translation.y,
        summary.final_truth.heading
    );
    println!(
        "estimated pose:     ({:.3}, {:.3}) @ {:.3} rad",
        summary.final_estimate.translation.x,
        summary.final_estimate.translation.y,
        summary.final_estimate.heading
    );
    println!("translation error:  {:.4} m", summary.translation_error);
    println!("heading error:      {:.4} rad", summary.heading_error);
    println!("velocity error:     {:.4} m/s", summary.velocity_error);
    println!(
        "shot solution:      azimuth {:.3} rad, range {:.2} m, tof {:.3} s{}",
        summary.shot.azimuth,
        summary.shot.range,
        summary.shot.time_of_flight,
        if summary.shot.moving {
            " (motion compensated)"
        } else {
            ""
        }
    );
    Ok(())
}
