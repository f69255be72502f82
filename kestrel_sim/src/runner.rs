// kestrel_sim/src/runner.rs

//! The headless control loop: the same sense/estimate/command/actuate tick
//! a robot program runs, driven at the nominal period over simulated time.

use tracing::info;

use kestrel_core::control::{DriveController, DriveIntent};
use kestrel_core::estimation::{PoseEstimator, VisionMeasurement};
use kestrel_core::interfaces::{ActuatorSink, OdometrySource, OperatorInput, VisionSource};
use kestrel_core::kinematics::SwerveKinematics;
use kestrel_core::targeting::{solve_shot, ShotSolution};
use kestrel_core::types::{wrap_angle, ModuleState, Pose2d};

use crate::platform::SimPlatform;
use crate::scenario::{ScenarioConfig, ScenarioError};

/// End-of-run report comparing the estimate against ground truth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub ticks: u64,
    pub dropped_odometry_ticks: u64,
    pub stale_ticks: u64,
    pub vision_fixes: u64,
    pub final_truth: Pose2d,
    pub final_estimate: Pose2d,
    /// |estimate - truth| at the end of the run (m).
    pub translation_error: f64,
    /// Shortest-arc heading error at the end of the run (rad).
    pub heading_error: f64,
    /// Field-frame speed error |estimated - truth| at the end of the run
    /// (m/s).
    pub velocity_error: f64,
    /// Firing solution from the final estimate.
    pub shot: ShotSolution,
}

pub fn run(scenario: &ScenarioConfig) -> Result<RunSummary, ScenarioError> {
    let robot = &scenario.robot;
    let period = robot.estimator.nominal_period;
    let ticks = (scenario.simulation.duration / period).round() as u64;

    let mut platform = SimPlatform::new(scenario)?;
    let mut estimator = PoseEstimator::new(robot.module_offsets(), robot.estimator)?;
    let mut controller = DriveController::new(robot);
    let mut kinematics = SwerveKinematics::new(robot.module_offsets())?;

    let [x, y, heading] = scenario.simulation.start_pose;
    estimator.reset_pose(Pose2d::new(x, y, heading));

    info!(ticks, period, seed = scenario.simulation.seed, "starting run");

    let mut fixes: Vec<VisionMeasurement> = Vec::new();
    let mut last_states = [ModuleState::default(); 4];
    let mut dropped_odometry_ticks = 0;
    let mut stale_ticks = 0;
    let mut vision_fixes = 0;

    for _ in 0..ticks {
        let now = platform.clock();

        // Sense.
        match platform.sample() {
            Some(sample) => {
                estimator.add_odometry_observation(
                    &sample.positions,
                    sample.gyro_heading,
                    sample.timestamp,
                );
            }
            None => {
                dropped_odometry_ticks += 1;
                estimator.coast(now);
            }
        }
        fixes.clear();
        platform.drain(&mut fixes);
        vision_fixes += fixes.len() as u64;
        for fix in &fixes {
            estimator.add_vision_observation(fix);
        }
        if estimator.is_stale() {
            stale_ticks += 1;
        }

        // Command.
        let intent = platform.intent();
        if let Some(pose) = intent.reset_pose {
            estimator.reset_pose(pose);
        }
        let pose = estimator.estimated_pose();
        let speeds =
            controller.compute_chassis_speeds(&DriveIntent::Teleop(intent), &pose, period);
        let mut states = kinematics.to_module_states(&speeds);
        for (state, last) in states.iter_mut().zip(&last_states) {
            *state = state.optimize(last.angle);
        }
        SwerveKinematics::desaturate(&mut states, robot.max_drive_speed);
        last_states = states;

        // Actuate, then let the world move.
        platform.apply(&states);
        platform.step(period);
    }

    // One final observation so estimate and truth are compared at the same
    // instant.
    if let Some(sample) = platform.sample() {
        estimator.add_odometry_observation(&sample.positions, sample.gyro_heading, sample.timestamp);
    }

    let final_truth = platform.truth_pose();
    let final_estimate = estimator.estimated_pose();
    let translation_error = (final_estimate.translation - final_truth.translation).norm();
    let heading_error = wrap_angle(final_estimate.heading - final_truth.heading).abs();
    let velocity_error = (estimator.field_velocity() - platform.truth_field_velocity()).norm();
    let shot = solve_shot(&final_estimate, estimator.field_velocity(), &robot.goal);

    let summary = RunSummary {
        ticks,
        dropped_odometry_ticks,
        stale_ticks,
        vision_fixes,
        final_truth,
        final_estimate,
        translation_error,
        heading_error,
        velocity_error,
        shot,
    };
    info!(
        translation_error = summary.translation_error,
        heading_error = summary.heading_error,
        vision_fixes = summary.vision_fixes,
        "run complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::test_scenario;

    #[test]
    fn scripted_run_tracks_ground_truth() {
        let summary = run(&test_scenario()).expect("run");
        assert_eq!(summary.ticks, 200);
        assert_eq!(summary.stale_ticks, 0);
        assert!(summary.vision_fixes > 30);
        assert!(
            summary.translation_error < 0.2,
            "translation error {} too large",
            summary.translation_error
        );
        assert!(
            summary.heading_error < 0.1,
            "heading error {} too large",
            summary.heading_error
        );
        assert!(
            summary.velocity_error < 0.5,
            "velocity error {} too large",
            summary.velocity_error
        );
    }

    #[test]
    fn runs_are_deterministic_for_a_seed() {
        let scenario = test_scenario();
        let first = run(&scenario).expect("run");
        let second = run(&scenario).expect("run");
        assert_eq!(first, second);
    }

    #[test]
    fn heavy_dropout_marks_the_estimate_stale() {
        let mut scenario = test_scenario();
        scenario.noise.odometry_dropout = 0.9;
        let summary = run(&scenario).expect("run");
        assert!(summary.dropped_odometry_ticks > 0);
        assert!(summary.stale_ticks > 0);
    }

    #[test]
    fn final_shot_solution_targets_the_goal() {
        let summary = run(&test_scenario()).expect("run");
        // The goal sits at (5, 0); wherever the lap ended, the solution's
        // range must match the estimate's distance to it.
        let expected_range = (nalgebra::Vector2::new(5.0, 0.0)
            - summary.final_estimate.translation)
            .norm();
        assert!((summary.shot.range - expected_range).abs() < 1e-9);
        assert!(summary.shot.time_of_flight > 0.0);
    }
}
