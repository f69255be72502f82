// kestrel_core/src/estimation/mod.rs

//! Chassis pose estimation: wheel-odometry integration corrected by late,
//! lower-rate, variable-confidence vision fixes.

use crate::types::Pose2d;

pub mod pose_estimator;

pub use pose_estimator::PoseEstimator;

/// An absolute pose fix from an external vision pipeline. Transient input:
/// consumed (or rejected) immediately, never stored. May arrive late or
/// out of order relative to the estimator's current time.
#[derive(Debug, Clone, Copy)]
pub struct VisionMeasurement {
    /// Field-frame pose implied by the detection.
    pub pose: Pose2d,
    /// Capture time of the underlying camera frame (s, same clock as
    /// odometry timestamps).
    pub timestamp: f64,
    /// Declared standard deviation of the fix (m); larger means less
    /// trusted.
    pub std_dev: f64,
}

impl VisionMeasurement {
    pub fn is_finite(&self) -> bool {
        self.pose.is_finite() && self.timestamp.is_finite() && self.std_dev.is_finite()
    }
}
