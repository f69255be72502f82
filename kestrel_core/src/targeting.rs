// kestrel_core/src/targeting.rs

//! Shot solving against a fixed field goal from a moving chassis.
//!
//! The projectile leaves the shooter at a fixed speed relative to the
//! robot, so chassis velocity carries into its field-frame flight. The
//! solver finds the intercept time and the launch bearing that lands the
//! shot on the goal despite that carry.

use nalgebra::Vector2;

use crate::config::GoalConfig;
use crate::types::Pose2d;

/// Chassis speeds below this (m/s) solve as a stationary shot.
const MOVING_EPSILON: f64 = 1e-3;
/// Ranges below this (m) have no meaningful bearing.
const RANGE_EPSILON: f64 = 1e-6;

/// A firing solution for the current tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShotSolution {
    /// Field-frame launch bearing (rad).
    pub azimuth: f64,
    /// Straight-line distance to the goal (m).
    pub range: f64,
    /// Projectile flight time (s).
    pub time_of_flight: f64,
    /// Whether chassis motion was compensated for. False for stationary
    /// shots and for the static fallback when no intercept exists.
    pub moving: bool,
}

/// Solves the launch bearing toward `goal` from `pose`, compensating for
/// the chassis `field_velocity` the projectile inherits.
///
/// Falls back to a static solution (bearing straight at the goal, no
/// velocity compensation) when the chassis is effectively stationary or
/// when no forward-time intercept exists at the configured launch speed.
/// On top of the goal itself, the bearing degenerates to the current
/// heading.
pub fn solve_shot(pose: &Pose2d, field_velocity: Vector2<f64>, goal: &GoalConfig) -> ShotSolution {
    let displacement = goal.position_vector() - pose.translation;
    let range = displacement.norm();
    let launch_speed = goal.launch_speed;

    if range < RANGE_EPSILON {
        return ShotSolution {
            azimuth: pose.heading,
            range,
            time_of_flight: 0.0,
            moving: false,
        };
    }

    let static_solution = ShotSolution {
        azimuth: displacement.y.atan2(displacement.x),
        range,
        time_of_flight: range / launch_speed,
        moving: false,
    };

    if field_velocity.norm() < MOVING_EPSILON {
        return static_solution;
    }

    // The projectile's field velocity is v + s*u for unit aim direction u.
    // Requiring (v + s*u) t = d and eliminating u gives a quadratic in the
    // intercept time t.
    let a = field_velocity.norm_squared() - launch_speed * launch_speed;
    let b = -2.0 * displacement.dot(&field_velocity);
    let c = displacement.norm_squared();

    let time_of_flight = match intercept_time(a, b, c) {
        Some(t) => t,
        None => return static_solution,
    };

    let aim = displacement - field_velocity * time_of_flight;
    if aim.norm() < RANGE_EPSILON {
        return static_solution;
    }

    ShotSolution {
        azimuth: aim.y.atan2(aim.x),
        range,
        time_of_flight,
        moving: true,
    }
}

/// Smallest positive root of `a t^2 + b t + c = 0`, treating a near-zero
/// leading coefficient as linear.
fn intercept_time(a: f64, b: f64, c: f64) -> Option<f64> {
    if a.abs() < 1e-12 {
        if b.abs() < 1e-12 {
            return None;
        }
        let t = -c / b;
        return (t > 0.0).then_some(t);
    }

    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return None;
    }
    let sqrt = discriminant.sqrt();
    let (t1, t2) = ((-b - sqrt) / (2.0 * a), (-b + sqrt) / (2.0 * a));
    [t1.min(t2), t1.max(t2)].into_iter().find(|t| *t > 0.0)
}
