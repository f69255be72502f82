// kestrel_core/src/lib.rs

pub mod config;
pub mod control;
pub mod estimation;
pub mod interfaces;
pub mod kinematics;
pub mod prelude;
pub mod targeting;
pub mod types;
