// kestrel_core/src/interfaces.rs

//! Seams between the control core and whatever supplies its inputs and
//! consumes its outputs. Real hardware, a physics simulation, and a log
//! replay all implement the same traits, so the tick loop and everything
//! inside it stays identical across the three.

use crate::estimation::VisionMeasurement;
use crate::types::{ModulePosition, ModuleState, Pose2d};

/// One synchronized odometry reading: all four module positions and the
/// gyro heading, stamped with a shared capture time.
#[derive(Debug, Clone, Copy)]
pub struct OdometrySample {
    pub positions: [ModulePosition; 4],
    /// Gyro yaw (rad), continuous.
    pub gyro_heading: f64,
    /// Capture time (s, monotonic clock shared with vision).
    pub timestamp: f64,
}

/// Normalized operator request for one tick. Axes are in [-1, 1].
#[derive(Debug, Clone, Copy, Default)]
pub struct OperatorIntent {
    /// Forward axis, +1 is full speed ahead (field +x when field-relative).
    pub x: f64,
    /// Lateral axis, +1 is full speed left.
    pub y: f64,
    /// Rotation axis, +1 is full counter-clockwise rate.
    pub rotation: f64,
    /// When set, hold this field heading (rad) and ignore the rotation axis.
    pub heading_hold: Option<f64>,
    /// When set, re-seed the pose estimator at this pose.
    pub reset_pose: Option<Pose2d>,
}

/// Supplies synchronized odometry readings. Returning `None` signals a
/// missed sample; the estimator coasts and eventually flags itself stale.
pub trait OdometrySource {
    fn sample(&mut self) -> Option<OdometrySample>;
}

/// Supplies vision fixes. Implementations append every measurement that
/// arrived since the previous call; ordering is not required.
pub trait VisionSource {
    fn drain(&mut self, out: &mut Vec<VisionMeasurement>);
}

/// Accepts the optimized module commands for one tick.
pub trait ActuatorSink {
    fn apply(&mut self, states: &[ModuleState; 4]);
}

/// Supplies the operator's request for one tick.
pub trait OperatorInput {
    fn intent(&mut self) -> OperatorIntent;
}
