// kestrel_core/src/kinematics.rs

//! Swerve drive kinematics: the chassis-speeds-to-module-states map and its
//! least-squares inverse. Four modules over-determine the chassis's three
//! degrees of freedom, so the inverse solves the 8x3 system in the
//! least-squares sense using a pseudoinverse precomputed from the fixed
//! module geometry.

use nalgebra::{SMatrix, SVector, Vector2};

use crate::config::ConfigError;
use crate::types::{ChassisSpeeds, ModulePosition, ModuleState, Twist2d};

/// Module velocity vectors below this magnitude (m/s) hold the previous
/// steering angle instead of snapping to atan2(0, 0).
const SPEED_EPSILON: f64 = 1e-4;

pub struct SwerveKinematics {
    offsets: [Vector2<f64>; 4],
    /// Maps [vx, vy, omega] to the stacked per-module velocity vectors.
    inverse: SMatrix<f64, 8, 3>,
    /// Least-squares pseudoinverse of `inverse`.
    forward: SMatrix<f64, 3, 8>,
    /// Last commanded steering angles, held while the chassis is at rest.
    last_angles: [f64; 4],
}

impl SwerveKinematics {
    pub fn new(offsets: [Vector2<f64>; 4]) -> Result<Self, ConfigError> {
        let mut inverse = SMatrix::<f64, 8, 3>::zeros();
        for (i, offset) in offsets.iter().enumerate() {
            // Module velocity = translation + omega x offset.
            inverse[(2 * i, 0)] = 1.0;
            inverse[(2 * i, 2)] = -offset.y;
            inverse[(2 * i + 1, 1)] = 1.0;
            inverse[(2 * i + 1, 2)] = offset.x;
        }

        // Moore-Penrose pseudoinverse via the normal equations; the 3x3
        // Gram matrix is singular only for degenerate wheel placement.
        let gram = inverse.transpose() * inverse;
        let forward = gram
            .try_inverse()
            .map(|g| g * inverse.transpose())
            .ok_or(ConfigError::DegenerateGeometry)?;

        Ok(Self {
            offsets,
            inverse,
            forward,
            last_angles: [0.0; 4],
        })
    }

    pub fn module_offsets(&self) -> &[Vector2<f64>; 4] {
        &self.offsets
    }

    /// Converts a chassis velocity into per-module (speed, angle) states.
    /// Modules whose commanded vector is effectively zero keep their
    /// previously commanded angle so the steering does not chatter when the
    /// robot is stationary.
    pub fn to_module_states(&mut self, speeds: &ChassisSpeeds) -> [ModuleState; 4] {
        let command = SVector::<f64, 3>::new(speeds.vx, speeds.vy, speeds.omega);
        let wheel_vectors = self.inverse * command;

        let mut states = [ModuleState::default(); 4];
        for i in 0..4 {
            let vx = wheel_vectors[2 * i];
            let vy = wheel_vectors[2 * i + 1];
            let speed = vx.hypot(vy);
            if speed < SPEED_EPSILON {
                states[i] = ModuleState::new(0.0, self.last_angles[i]);
            } else {
                let angle = vy.atan2(vx);
                self.last_angles[i] = angle;
                states[i] = ModuleState::new(speed, angle);
            }
        }
        states
    }

    /// Least-squares solve from measured module states back to a chassis
    /// velocity, used to derive the odometry velocity estimate.
    pub fn to_chassis_speeds(&self, states: &[ModuleState; 4]) -> ChassisSpeeds {
        let mut wheel_vectors = SVector::<f64, 8>::zeros();
        for (i, state) in states.iter().enumerate() {
            wheel_vectors[2 * i] = state.speed * state.angle.cos();
            wheel_vectors[2 * i + 1] = state.speed * state.angle.sin();
        }
        let solved = self.forward * wheel_vectors;
        ChassisSpeeds::new(solved[0], solved[1], solved[2])
    }

    /// Least-squares solve from per-module travel deltas to an incremental
    /// robot-frame twist. The caller replaces `dtheta` with the gyro delta;
    /// the wheel-derived rotation is only a fallback.
    pub fn twist(&self, deltas: &[ModulePosition; 4]) -> Twist2d {
        let mut wheel_vectors = SVector::<f64, 8>::zeros();
        for (i, delta) in deltas.iter().enumerate() {
            wheel_vectors[2 * i] = delta.distance * delta.angle.cos();
            wheel_vectors[2 * i + 1] = delta.distance * delta.angle.sin();
        }
        let solved = self.forward * wheel_vectors;
        Twist2d::new(solved[0], solved[1], solved[2])
    }

    /// Scales all four module speeds by the identical factor if any exceeds
    /// `max_speed`, preserving the ratios between modules and therefore the
    /// commanded shape of motion. Clamping modules independently would
    /// distort the intended path.
    pub fn desaturate(states: &mut [ModuleState; 4], max_speed: f64) {
        let highest = states
            .iter()
            .map(|s| s.speed.abs())
            .fold(0.0f64, f64::max);
        if highest > max_speed {
            let scale = max_speed / highest;
            for state in states.iter_mut() {
                state.speed *= scale;
            }
        }
    }
}
