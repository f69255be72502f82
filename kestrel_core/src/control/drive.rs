// kestrel_core/src/control/drive.rs

//! Teleop and autonomous chassis speed computation.
//!
//! Operator axes arrive normalized to [-1, 1]. Translation gets a circular
//! deadband and an optional squared response curve (finer control near
//! zero, full authority at the rim), then maps to the configured maximum
//! speeds. Rotation either comes straight from the rotation axis or, in
//! heading-hold mode, from a closed loop on the estimator's heading.

use nalgebra::Vector2;

use crate::config::RobotConfig;
use crate::control::pid::PidController;
use crate::interfaces::OperatorIntent;
use crate::types::{ChassisSpeeds, Pose2d};

/// A single tick's motion request.
#[derive(Debug, Clone, Copy)]
pub enum DriveIntent {
    /// Normalized operator axes plus mode flags.
    Teleop(OperatorIntent),
    /// Direct robot-frame velocity request from an autonomous routine.
    Velocity(ChassisSpeeds),
}

pub struct DriveController {
    max_drive_speed: f64,
    max_angular_speed: f64,
    deadband: f64,
    square_inputs: bool,
    field_relative: bool,
    heading_pid: PidController,
    heading_hold_engaged: bool,
}

impl DriveController {
    pub fn new(config: &RobotConfig) -> Self {
        Self {
            max_drive_speed: config.max_drive_speed,
            max_angular_speed: config.max_angular_speed,
            deadband: config.teleop.deadband,
            square_inputs: config.teleop.square_inputs,
            field_relative: config.teleop.field_relative,
            heading_pid: PidController::new(config.heading_hold, true),
            heading_hold_engaged: false,
        }
    }

    /// Stateless beyond the heading-hold loop; reads the pose snapshot for
    /// heading feedback and (when field-relative) frame conversion.
    pub fn compute_chassis_speeds(
        &mut self,
        intent: &DriveIntent,
        pose: &Pose2d,
        dt: f64,
    ) -> ChassisSpeeds {
        match intent {
            DriveIntent::Teleop(operator) => self.teleop(operator, pose, dt),
            DriveIntent::Velocity(requested) => {
                // Autonomous velocity requests bypass shaping; leaving
                // heading-hold means its loop restarts clean next time.
                self.disengage_heading_hold();
                self.clamp(*requested)
            }
        }
    }

    fn teleop(&mut self, operator: &OperatorIntent, pose: &Pose2d, dt: f64) -> ChassisSpeeds {
        let stick = Vector2::new(operator.x, operator.y);
        let magnitude = self.shape_axis(stick.norm());
        let direction = if stick.norm() > 1e-9 {
            stick / stick.norm()
        } else {
            Vector2::zeros()
        };
        let translation = direction * magnitude * self.max_drive_speed;

        let omega = match operator.heading_hold {
            Some(target) => {
                if !self.heading_hold_engaged {
                    self.heading_pid.reset();
                    self.heading_hold_engaged = true;
                }
                self.heading_pid
                    .calculate(target - pose.heading, dt)
                    .clamp(-self.max_angular_speed, self.max_angular_speed)
            }
            None => {
                self.disengage_heading_hold();
                let shaped = self.shape_axis(operator.rotation.abs());
                shaped.copysign(operator.rotation) * self.max_angular_speed
            }
        };

        if self.field_relative {
            ChassisSpeeds::from_field_relative(translation.x, translation.y, omega, pose.heading)
        } else {
            ChassisSpeeds::new(translation.x, translation.y, omega)
        }
    }

    /// Deadband then optional squaring, on a non-negative axis magnitude.
    fn shape_axis(&self, magnitude: f64) -> f64 {
        if magnitude < self.deadband {
            return 0.0;
        }
        let scaled = ((magnitude - self.deadband) / (1.0 - self.deadband)).min(1.0);
        if self.square_inputs {
            scaled * scaled
        } else {
            scaled
        }
    }

    fn clamp(&self, speeds: ChassisSpeeds) -> ChassisSpeeds {
        let translation = speeds.translation();
        let norm = translation.norm();
        let translation = if norm > self.max_drive_speed {
            translation * (self.max_drive_speed / norm)
        } else {
            translation
        };
        ChassisSpeeds::new(
            translation.x,
            translation.y,
            speeds
                .omega
                .clamp(-self.max_angular_speed, self.max_angular_speed),
        )
    }

    fn disengage_heading_hold(&mut self) {
        if self.heading_hold_engaged {
            self.heading_pid.reset();
            self.heading_hold_engaged = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::types::wrap_angle;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    const DT: f64 = 0.02;

    fn controller() -> DriveController {
        DriveController::new(&test_config())
    }

    fn teleop(x: f64, y: f64, rotation: f64) -> DriveIntent {
        DriveIntent::Teleop(OperatorIntent {
            x,
            y,
            rotation,
            ..Default::default()
        })
    }

    fn holding(target: f64) -> DriveIntent {
        DriveIntent::Teleop(OperatorIntent {
            heading_hold: Some(target),
            ..Default::default()
        })
    }

    #[test]
    fn inputs_inside_deadband_are_zero() {
        let mut controller = controller();
        let speeds =
            controller.compute_chassis_speeds(&teleop(0.05, -0.03, 0.02), &Pose2d::default(), DT);
        assert_eq!(speeds, ChassisSpeeds::default());
    }

    #[test]
    fn full_stick_reaches_max_speed() {
        let mut controller = controller();
        let speeds =
            controller.compute_chassis_speeds(&teleop(1.0, 0.0, 0.0), &Pose2d::default(), DT);
        assert_abs_diff_eq!(speeds.vx, 4.0, epsilon = 1e-9);
        assert_abs_diff_eq!(speeds.vy, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn squared_response_is_gentle_near_zero() {
        let mut controller = controller();
        let low =
            controller.compute_chassis_speeds(&teleop(0.3, 0.0, 0.0), &Pose2d::default(), DT);
        // Well under the linear 0.3 * max.
        assert!(low.vx < 0.3 * 4.0 * 0.5);
        assert!(low.vx > 0.0);
    }

    #[test]
    fn field_relative_rotates_with_heading() {
        let mut controller = controller();
        // Robot facing +y; a forward (field +x) stick becomes robot -y.
        let pose = Pose2d::new(0.0, 0.0, PI / 2.0);
        let speeds = controller.compute_chassis_speeds(&teleop(1.0, 0.0, 0.0), &pose, DT);
        assert_abs_diff_eq!(speeds.vx, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(speeds.vy, -4.0, epsilon = 1e-9);
    }

    #[test]
    fn heading_hold_sign_matches_shortest_path() {
        // Starting heading 0; the rotation command must head along the
        // shortest angular path for targets across the wrap, including PI.
        for target in [-3.0, -2.0, -1.0, -0.2, 0.2, 1.0, 2.5, 3.0, PI] {
            let mut controller = controller();
            let speeds =
                controller.compute_chassis_speeds(&holding(target), &Pose2d::default(), DT);
            let shortest = wrap_angle(target);
            assert!(
                speeds.omega * shortest > 0.0,
                "target {target}: omega {} disagrees with shortest path {}",
                speeds.omega,
                shortest
            );
        }
    }

    #[test]
    fn heading_hold_ignores_rotation_axis() {
        let mut controller = controller();
        let intent = DriveIntent::Teleop(OperatorIntent {
            rotation: 1.0,
            heading_hold: Some(0.0),
            ..Default::default()
        });
        let speeds = controller.compute_chassis_speeds(&intent, &Pose2d::default(), DT);
        assert_abs_diff_eq!(speeds.omega, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn disengaging_heading_hold_resets_windup() {
        let mut config = test_config();
        config.heading_hold.ki = 1.0;
        let mut controller = DriveController::new(&config);
        let pose = Pose2d::default();

        // Accumulate integral against a persistent error.
        for _ in 0..100 {
            controller.compute_chassis_speeds(&holding(1.0), &pose, DT);
        }
        // Disengage, then re-engage with zero error: a clean loop outputs
        // zero rotation rather than replaying the old integral.
        controller.compute_chassis_speeds(&teleop(0.0, 0.0, 0.0), &pose, DT);
        let speeds = controller.compute_chassis_speeds(&holding(0.0), &pose, DT);
        assert_abs_diff_eq!(speeds.omega, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn autonomous_velocity_is_clamped() {
        let mut controller = controller();
        let intent = DriveIntent::Velocity(ChassisSpeeds::new(10.0, 0.0, 100.0));
        let speeds = controller.compute_chassis_speeds(&intent, &Pose2d::default(), DT);
        assert_abs_diff_eq!(speeds.vx, 4.0, epsilon = 1e-9);
        assert_abs_diff_eq!(speeds.omega, 2.0 * PI, epsilon = 1e-9);
    }
}
