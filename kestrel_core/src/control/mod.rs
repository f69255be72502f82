// kestrel_core/src/control/mod.rs

//! Converts operator or autonomous intent into chassis speed commands.

pub mod drive;
pub mod pid;

pub use drive::{DriveController, DriveIntent};
pub use pid::PidController;
