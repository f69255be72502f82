// kestrel_core/src/types.rs

use nalgebra::{Rotation2, Vector2};
use std::f64::consts::PI;

/// Wraps an angle into `(-PI, PI]`.
pub fn wrap_angle(theta: f64) -> f64 {
    let wrapped = theta.rem_euclid(2.0 * PI);
    if wrapped > PI {
        wrapped - 2.0 * PI
    } else {
        wrapped
    }
}

/// Places `target` in the continuous neighborhood of `reference`, i.e. the
/// representation of `target` (mod 2*PI) that lies within PI of `reference`.
///
/// Steering angles are kept unbounded rather than wrapped so that a module
/// asked to move from 170 deg to -170 deg turns 20 deg, not 340.
pub fn angle_modulus(target: f64, reference: f64) -> f64 {
    reference + wrap_angle(target - reference)
}

/// Robot-frame chassis velocity: forward, lateral, and angular components.
/// Ephemeral; produced fresh every tick from intent or from pose deltas.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChassisSpeeds {
    /// Forward velocity (m/s), +x.
    pub vx: f64,
    /// Lateral velocity (m/s), +y is left.
    pub vy: f64,
    /// Counter-clockwise angular velocity (rad/s).
    pub omega: f64,
}

impl ChassisSpeeds {
    pub fn new(vx: f64, vy: f64, omega: f64) -> Self {
        Self { vx, vy, omega }
    }

    /// Converts field-relative velocities into the robot frame given the
    /// robot's current heading.
    pub fn from_field_relative(vx: f64, vy: f64, omega: f64, heading: f64) -> Self {
        let robot = Rotation2::new(-heading) * Vector2::new(vx, vy);
        Self {
            vx: robot.x,
            vy: robot.y,
            omega,
        }
    }

    pub fn translation(&self) -> Vector2<f64> {
        Vector2::new(self.vx, self.vy)
    }

    pub fn is_finite(&self) -> bool {
        self.vx.is_finite() && self.vy.is_finite() && self.omega.is_finite()
    }
}

/// One swerve corner's commanded or measured (wheel speed, steering angle)
/// pair. The angle is continuous (unwrapped); see [`angle_modulus`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ModuleState {
    /// Wheel linear speed (m/s). Sign encodes drive direction relative to
    /// the steering angle.
    pub speed: f64,
    /// Steering angle (rad), continuous.
    pub angle: f64,
}

impl ModuleState {
    pub fn new(speed: f64, angle: f64) -> Self {
        Self { speed, angle }
    }

    /// Picks between the target angle and target + PI (with negated speed),
    /// whichever requires less steering rotation from `current_angle`. The
    /// result is expressed in the continuous neighborhood of `current_angle`,
    /// so max steering travel per command is PI/2.
    pub fn optimize(&self, current_angle: f64) -> ModuleState {
        let target = angle_modulus(self.angle, current_angle);
        let delta = target - current_angle;
        if delta.abs() > PI / 2.0 {
            ModuleState {
                speed: -self.speed,
                angle: target - PI.copysign(delta),
            }
        } else {
            ModuleState {
                speed: self.speed,
                angle: target,
            }
        }
    }

    pub fn is_finite(&self) -> bool {
        self.speed.is_finite() && self.angle.is_finite()
    }
}

/// Accumulated wheel travel and steering angle for one module, as reported
/// by the odometry source. Distances are cumulative; the estimator works on
/// differences between consecutive samples.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ModulePosition {
    /// Total wheel travel since power-on (m).
    pub distance: f64,
    /// Steering angle (rad).
    pub angle: f64,
}

impl ModulePosition {
    pub fn new(distance: f64, angle: f64) -> Self {
        Self { distance, angle }
    }

    pub fn is_finite(&self) -> bool {
        self.distance.is_finite() && self.angle.is_finite()
    }
}

/// An incremental robot-frame displacement over one tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Twist2d {
    pub dx: f64,
    pub dy: f64,
    pub dtheta: f64,
}

impl Twist2d {
    pub fn new(dx: f64, dy: f64, dtheta: f64) -> Self {
        Self { dx, dy, dtheta }
    }
}

/// 2-D field-frame pose. Exactly one authoritative instance exists at any
/// time, owned by the pose estimator; everything else reads copies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose2d {
    pub translation: Vector2<f64>,
    /// Heading (rad), wrapped to `(-PI, PI]`.
    pub heading: f64,
}

impl Default for Pose2d {
    fn default() -> Self {
        Self {
            translation: Vector2::zeros(),
            heading: 0.0,
        }
    }
}

impl Pose2d {
    pub fn new(x: f64, y: f64, heading: f64) -> Self {
        Self {
            translation: Vector2::new(x, y),
            heading: wrap_angle(heading),
        }
    }

    pub fn rotation(&self) -> Rotation2<f64> {
        Rotation2::new(self.heading)
    }

    /// Composes this pose with a body-frame twist using the exact constant-
    /// twist integral (the SE(2) exponential). Unlike naive Euler
    /// integration, a tick spent turning while translating lands on the arc
    /// rather than its chord, so per-tick odometry does not accrue
    /// first-order curvature error.
    pub fn exp(&self, twist: &Twist2d) -> Pose2d {
        let dtheta = twist.dtheta;
        // Series expansions of sin(t)/t and (1-cos(t))/t near zero.
        let (s, c) = if dtheta.abs() < 1e-9 {
            (
                1.0 - dtheta * dtheta / 6.0,
                dtheta / 2.0 - dtheta * dtheta * dtheta / 24.0,
            )
        } else {
            (dtheta.sin() / dtheta, (1.0 - dtheta.cos()) / dtheta)
        };
        let local = Vector2::new(
            twist.dx * s - twist.dy * c,
            twist.dx * c + twist.dy * s,
        );
        Pose2d {
            translation: self.translation + self.rotation() * local,
            heading: wrap_angle(self.heading + dtheta),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.translation.x.is_finite() && self.translation.y.is_finite() && self.heading.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    const EPS: f64 = 1e-9;

    #[test]
    fn wrap_angle_keeps_pi_positive() {
        assert_abs_diff_eq!(wrap_angle(PI), PI, epsilon = EPS);
        assert_abs_diff_eq!(wrap_angle(-PI), PI, epsilon = EPS);
        assert_abs_diff_eq!(wrap_angle(3.0 * PI), PI, epsilon = EPS);
        assert_abs_diff_eq!(wrap_angle(0.1 - 2.0 * PI), 0.1, epsilon = EPS);
        assert_abs_diff_eq!(wrap_angle(-0.1), -0.1, epsilon = EPS);
    }

    #[test]
    fn angle_modulus_stays_near_reference() {
        // 170 deg -> -170 deg should be a 20 deg move in the continuous space.
        let reference = 170f64.to_radians();
        let target = (-170f64).to_radians();
        let continuous = angle_modulus(target, reference);
        assert_abs_diff_eq!(continuous, 190f64.to_radians(), epsilon = EPS);
    }

    #[test]
    fn optimize_flips_when_reversal_is_shorter() {
        let state = ModuleState::new(2.0, PI * 0.9);
        let optimized = state.optimize(0.0);
        assert!(optimized.speed < 0.0);
        assert!(optimized.angle.abs() <= FRAC_PI_2 + EPS);
        // The flipped command still describes the same velocity vector.
        assert_abs_diff_eq!(
            optimized.speed * optimized.angle.cos(),
            state.speed * state.angle.cos(),
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(
            optimized.speed * optimized.angle.sin(),
            state.speed * state.angle.sin(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn optimize_quarter_turn_is_a_tie_kept_unflipped() {
        // Exactly PI/2 away: either choice costs the same travel; the
        // unflipped command wins so the wheel keeps its drive direction.
        let state = ModuleState::new(1.0, FRAC_PI_2);
        let optimized = state.optimize(0.0);
        assert_abs_diff_eq!(optimized.speed, 1.0, epsilon = EPS);
        assert_abs_diff_eq!(optimized.angle, FRAC_PI_2, epsilon = EPS);
    }

    #[test]
    fn optimize_keeps_short_moves_unflipped() {
        let state = ModuleState::new(1.0, 0.3);
        let optimized = state.optimize(0.1);
        assert_abs_diff_eq!(optimized.speed, 1.0, epsilon = EPS);
        assert_abs_diff_eq!(optimized.angle, 0.3, epsilon = EPS);
    }

    #[test]
    fn exp_pure_translation() {
        let pose = Pose2d::new(1.0, 2.0, FRAC_PI_2);
        let moved = pose.exp(&Twist2d::new(1.0, 0.0, 0.0));
        // Forward in the body frame is +y in the field frame at 90 deg.
        assert_abs_diff_eq!(moved.translation.x, 1.0, epsilon = EPS);
        assert_abs_diff_eq!(moved.translation.y, 3.0, epsilon = EPS);
        assert_abs_diff_eq!(moved.heading, FRAC_PI_2, epsilon = EPS);
    }

    #[test]
    fn exp_quarter_arc_lands_on_the_arc() {
        // Driving a quarter circle of radius 1: arc length PI/2, turn PI/2.
        let pose = Pose2d::default();
        let moved = pose.exp(&Twist2d::new(FRAC_PI_2, 0.0, FRAC_PI_2));
        assert_abs_diff_eq!(moved.translation.x, 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(moved.translation.y, 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(moved.heading, FRAC_PI_2, epsilon = EPS);
    }

    #[test]
    fn field_relative_conversion() {
        // Robot facing +y; a field +x command is robot-frame -y (to its right).
        let speeds = ChassisSpeeds::from_field_relative(1.0, 0.0, 0.5, FRAC_PI_2);
        assert_abs_diff_eq!(speeds.vx, 0.0, epsilon = EPS);
        assert_abs_diff_eq!(speeds.vy, -1.0, epsilon = EPS);
        assert_abs_diff_eq!(speeds.omega, 0.5, epsilon = EPS);
    }
}
