// kestrel_sim/src/scenario.rs

//! Loading and validating scenario TOML files: the robot configuration,
//! sensor noise models, and the scripted operator timeline.

use figment::{
    providers::{Format, Toml},
    Figment,
};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use kestrel_core::config::{ConfigError, RobotConfig};

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to load scenario file: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("invalid robot configuration: {0}")]
    Robot(#[from] ConfigError),
    #[error("noise standard deviations must be finite and non-negative")]
    BadNoise,
    #[error("simulation duration and vision rate must be positive")]
    BadSimulation,
    #[error("script segments must be non-empty with strictly increasing `until` times")]
    BadScript,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SimulationConfig {
    /// Simulated run length (s).
    pub duration: f64,
    /// Seed for every random draw in the run.
    #[serde(default)]
    pub seed: u64,
    /// Ground-truth start pose [x, y, heading].
    #[serde(default)]
    pub start_pose: [f64; 3],
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct NoiseConfig {
    /// Per-tick wheel distance noise (m, 1 sigma).
    pub odometry_distance_std: f64,
    /// Per-tick gyro heading noise (rad, 1 sigma).
    pub gyro_std: f64,
    /// Probability that an odometry sample is dropped entirely.
    #[serde(default)]
    pub odometry_dropout: f64,
    /// Vision fix translation noise (m, 1 sigma). Also reported to the
    /// estimator as the measurement's declared standard deviation.
    pub vision_std: f64,
    /// Vision fix rate (Hz).
    pub vision_rate: f64,
    /// Delay between a vision frame's capture and its delivery (s).
    #[serde(default)]
    pub vision_latency: f64,
}

/// One leg of the scripted operator timeline. Axes are held constant until
/// the segment's end time.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ScriptSegment {
    /// Segment end (s from run start).
    pub until: f64,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub rotation: f64,
    /// Field heading to hold (rad) for the segment's duration.
    #[serde(default)]
    pub heading_hold: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioConfig {
    pub simulation: SimulationConfig,
    pub noise: NoiseConfig,
    pub robot: RobotConfig,
    pub script: Vec<ScriptSegment>,
}

impl ScenarioConfig {
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let scenario: ScenarioConfig = Figment::new()
            .merge(Toml::file(path))
            .extract()
            .map_err(Box::new)?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn validate(&self) -> Result<(), ScenarioError> {
        self.robot.validate()?;

        let n = &self.noise;
        let stds = [n.odometry_distance_std, n.gyro_std, n.vision_std];
        if !stds.iter().all(|s| s.is_finite() && *s >= 0.0) {
            return Err(ScenarioError::BadNoise);
        }
        if !(0.0..=1.0).contains(&n.odometry_dropout) {
            return Err(ScenarioError::BadNoise);
        }

        let sim = &self.simulation;
        if !(sim.duration.is_finite() && sim.duration > 0.0)
            || !(n.vision_rate.is_finite() && n.vision_rate > 0.0)
            || !(n.vision_latency.is_finite() && n.vision_latency >= 0.0)
            || !sim.start_pose.iter().all(|v| v.is_finite())
        {
            return Err(ScenarioError::BadSimulation);
        }

        if self.script.is_empty() {
            return Err(ScenarioError::BadScript);
        }
        let mut previous = 0.0;
        for segment in &self.script {
            if !(segment.until.is_finite() && segment.until > previous) {
                return Err(ScenarioError::BadScript);
            }
            previous = segment.until;
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_scenario() -> ScenarioConfig {
    use kestrel_core::config::{
        EstimatorConfig, GoalConfig, PidGains, TeleopConfig,
    };

    ScenarioConfig {
        simulation: SimulationConfig {
            duration: 4.0,
            seed: 7,
            start_pose: [0.0, 0.0, 0.0],
        },
        noise: NoiseConfig {
            odometry_distance_std: 0.001,
            gyro_std: 0.0005,
            odometry_dropout: 0.0,
            vision_std: 0.05,
            vision_rate: 10.0,
            vision_latency: 0.08,
        },
        robot: RobotConfig {
            modules: [[0.3, 0.3], [0.3, -0.3], [-0.3, 0.3], [-0.3, -0.3]],
            max_drive_speed: 4.0,
            max_angular_speed: 2.0 * std::f64::consts::PI,
            teleop: TeleopConfig {
                deadband: 0.08,
                square_inputs: true,
                field_relative: true,
            },
            heading_hold: PidGains {
                kp: 4.0,
                ki: 0.0,
                kd: 0.2,
            },
            estimator: EstimatorConfig {
                history_window: 1.5,
                nominal_period: 0.02,
                max_vision_jump: 1.0,
                vision_time_constant: 0.5,
            },
            goal: GoalConfig {
                position: [5.0, 0.0],
                launch_speed: 12.0,
            },
        },
        script: vec![
            ScriptSegment {
                until: 2.0,
                x: 0.6,
                y: 0.0,
                rotation: 0.0,
                heading_hold: None,
            },
            ScriptSegment {
                until: 4.0,
                x: 0.0,
                y: 0.5,
                rotation: 0.0,
                heading_hold: Some(std::f64::consts::FRAC_PI_2),
            },
        ],
    }
}
