// kestrel_core/src/prelude.rs

// --- Core Abstractions (the seams a platform implements) ---
pub use crate::interfaces::{
    ActuatorSink, OdometrySample, OdometrySource, OperatorInput, OperatorIntent, VisionSource,
};

// --- Core Data Structures ---
pub use crate::config::{ConfigError, GoalConfig, PidGains, RobotConfig};
pub use crate::types::{ChassisSpeeds, ModulePosition, ModuleState, Pose2d, Twist2d};

// --- Algorithms ---
pub use crate::control::{DriveController, DriveIntent};
pub use crate::estimation::{PoseEstimator, VisionMeasurement};
pub use crate::kinematics::SwerveKinematics;
pub use crate::targeting::{solve_shot, ShotSolution};
