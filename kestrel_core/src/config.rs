// kestrel_core/src/config.rs

//! Static robot configuration: chassis geometry, speed limits, controller
//! gains, estimator tuning, and the fixed goal model. Loaded once at
//! startup and validated; a bad configuration is a build-time mistake and
//! is fatal, never recovered at run time.

use nalgebra::Vector2;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("module offsets must be four finite [x, y] pairs, none coincident")]
    BadModuleOffsets,
    #[error("module geometry is degenerate; wheel placement cannot resolve planar motion")]
    DegenerateGeometry,
    #[error("{name} must be positive and finite (got {value})")]
    NonPositive { name: &'static str, value: f64 },
    #[error("teleop deadband must lie in [0, 1) (got {0})")]
    BadDeadband(f64),
    #[error("goal position must be finite (got [{0}, {1}])")]
    BadGoalPosition(f64, f64),
    #[error("heading-hold gains must be finite and non-negative")]
    BadHeadingHoldGains,
}

/// Proportional-integral-derivative gains.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PidGains {
    pub kp: f64,
    #[serde(default)]
    pub ki: f64,
    #[serde(default)]
    pub kd: f64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TeleopConfig {
    /// Normalized axis magnitude below which input reads as zero.
    pub deadband: f64,
    /// Square the response curve for finer control near zero.
    #[serde(default = "default_true")]
    pub square_inputs: bool,
    /// Interpret translation axes in the field frame rather than the robot
    /// frame.
    #[serde(default = "default_true")]
    pub field_relative: bool,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct EstimatorConfig {
    /// Seconds of odometry history kept for re-propagating late vision
    /// corrections.
    #[serde(default = "default_history_window")]
    pub history_window: f64,
    /// Nominal control period (s).
    #[serde(default = "default_nominal_period")]
    pub nominal_period: f64,
    /// A vision correction implying a pose jump beyond this (m) is rejected.
    pub max_vision_jump: f64,
    /// Time constant (s) of the exponential age decay applied to vision
    /// correction weights.
    #[serde(default = "default_vision_time_constant")]
    pub vision_time_constant: f64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct GoalConfig {
    /// Field-frame goal position [x, y] (m).
    pub position: [f64; 2],
    /// Projectile launch speed relative to the shooter (m/s).
    pub launch_speed: f64,
}

impl GoalConfig {
    pub fn position_vector(&self) -> Vector2<f64> {
        Vector2::new(self.position[0], self.position[1])
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RobotConfig {
    /// Offsets of the four modules from the robot center [x, y] (m), in
    /// order front-left, front-right, back-left, back-right.
    pub modules: [[f64; 2]; 4],
    /// Maximum achievable wheel speed (m/s).
    pub max_drive_speed: f64,
    /// Maximum commanded angular speed (rad/s).
    pub max_angular_speed: f64,
    pub teleop: TeleopConfig,
    pub heading_hold: PidGains,
    pub estimator: EstimatorConfig,
    pub goal: GoalConfig,
}

fn default_true() -> bool {
    true
}

fn default_history_window() -> f64 {
    1.5
}

fn default_nominal_period() -> f64 {
    0.02
}

fn default_vision_time_constant() -> f64 {
    0.5
}

impl RobotConfig {
    pub fn module_offsets(&self) -> [Vector2<f64>; 4] {
        self.modules.map(|[x, y]| Vector2::new(x, y))
    }

    /// Checks the configuration for build-time mistakes. Call once before
    /// constructing any core component.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let offsets = self.module_offsets();
        for offset in &offsets {
            if !offset.x.is_finite() || !offset.y.is_finite() {
                return Err(ConfigError::BadModuleOffsets);
            }
        }
        for i in 0..offsets.len() {
            for j in (i + 1)..offsets.len() {
                if (offsets[i] - offsets[j]).norm() < 1e-6 {
                    return Err(ConfigError::BadModuleOffsets);
                }
            }
        }

        Self::require_positive("max_drive_speed", self.max_drive_speed)?;
        Self::require_positive("max_angular_speed", self.max_angular_speed)?;
        Self::require_positive("estimator.history_window", self.estimator.history_window)?;
        Self::require_positive("estimator.nominal_period", self.estimator.nominal_period)?;
        Self::require_positive("estimator.max_vision_jump", self.estimator.max_vision_jump)?;
        Self::require_positive(
            "estimator.vision_time_constant",
            self.estimator.vision_time_constant,
        )?;
        Self::require_positive("goal.launch_speed", self.goal.launch_speed)?;

        if !(0.0..1.0).contains(&self.teleop.deadband) {
            return Err(ConfigError::BadDeadband(self.teleop.deadband));
        }

        let [gx, gy] = self.goal.position;
        if !gx.is_finite() || !gy.is_finite() {
            return Err(ConfigError::BadGoalPosition(gx, gy));
        }

        let g = self.heading_hold;
        if ![g.kp, g.ki, g.kd]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0)
        {
            return Err(ConfigError::BadHeadingHoldGains);
        }

        Ok(())
    }

    fn require_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
        if value.is_finite() && value > 0.0 {
            Ok(())
        } else {
            Err(ConfigError::NonPositive { name, value })
        }
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> RobotConfig {
    RobotConfig {
        modules: [
            [0.3, 0.3],
            [0.3, -0.3],
            [-0.3, 0.3],
            [-0.3, -0.3],
        ],
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
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_config_passes() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn coincident_modules_rejected() {
        let mut config = test_config();
        config.modules[1] = config.modules[0];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BadModuleOffsets)
        ));
    }

    #[test]
    fn zero_launch_speed_rejected() {
        let mut config = test_config();
        config.goal.launch_speed = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositive { .. })
        ));
    }

    #[test]
    fn deadband_of_one_rejected() {
        let mut config = test_config();
        config.teleop.deadband = 1.0;
        assert!(matches!(config.validate(), Err(ConfigError::BadDeadband(_))));
    }

    #[test]
    fn non_finite_offset_rejected() {
        let mut config = test_config();
        config.modules[2][0] = f64::NAN;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BadModuleOffsets)
        ));
    }
}
