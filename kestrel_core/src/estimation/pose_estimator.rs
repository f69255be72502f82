// kestrel_core/src/estimation/pose_estimator.rs

//! Owner of the single authoritative chassis pose.
//!
//! Every tick the estimator composes the pose with the twist derived from
//! the *change* in module positions (forward kinematics of the delta, never
//! of absolute wheel state), with the rotational component replaced by the
//! gyro heading delta: gyro drift is far slower than wheel-slip heading
//! error, so heading comes from the gyro and translation from the wheels.
//!
//! Vision fixes are blended in by confidence- and age-weighted
//! interpolation. A short window of odometry records is buffered so that a
//! fix stamped in the past is applied *at its own timestamp* and the
//! intervening odometry is replayed on top, which makes the end pose
//! independent of measurement arrival order.

use std::collections::VecDeque;

use nalgebra::Vector2;
use tracing::{debug, warn};

use crate::config::{ConfigError, EstimatorConfig};
use crate::estimation::VisionMeasurement;
use crate::kinematics::SwerveKinematics;
use crate::types::{wrap_angle, ChassisSpeeds, ModulePosition, Pose2d, Twist2d};

/// A vision correction anchored to an odometry record, replayed whenever
/// history upstream of it changes.
#[derive(Debug, Clone, Copy)]
struct Correction {
    pose: Pose2d,
    weight: f64,
}

/// One tick of odometry history. `pose` is the estimate at `timestamp`
/// after applying this record's twist and any corrections anchored here.
#[derive(Debug, Clone)]
struct OdometryRecord {
    timestamp: f64,
    twist: Twist2d,
    pose: Pose2d,
    /// Extrapolated during a missed tick rather than measured; discarded
    /// once real odometry covering the gap arrives.
    synthetic: bool,
    corrections: Vec<Correction>,
}

#[derive(Debug, Clone, Copy)]
struct LastSample {
    timestamp: f64,
    positions: [ModulePosition; 4],
    gyro_heading: f64,
}

pub struct PoseEstimator {
    config: EstimatorConfig,
    kinematics: SwerveKinematics,
    /// Current best estimate; always the pose of the newest history record.
    pose: Pose2d,
    /// Pose immediately before the oldest history record's twist.
    origin: Pose2d,
    velocity: ChassisSpeeds,
    last_sample: Option<LastSample>,
    history: VecDeque<OdometryRecord>,
    /// Consecutive missed ticks covered by extrapolation.
    coast_ticks: u32,
    stale: bool,
}

impl PoseEstimator {
    pub fn new(
        module_offsets: [Vector2<f64>; 4],
        config: EstimatorConfig,
    ) -> Result<Self, ConfigError> {
        let kinematics = SwerveKinematics::new(module_offsets)?;
        Ok(Self {
            config,
            kinematics,
            pose: Pose2d::default(),
            origin: Pose2d::default(),
            velocity: ChassisSpeeds::default(),
            last_sample: None,
            history: VecDeque::new(),
            coast_ticks: 0,
            stale: false,
        })
    }

    /// Non-blocking read of the current best estimate.
    pub fn estimated_pose(&self) -> Pose2d {
        self.pose
    }

    /// Robot-frame velocity derived from the most recent odometry delta.
    pub fn velocity(&self) -> ChassisSpeeds {
        self.velocity
    }

    /// Field-frame linear velocity, for consumers that reason in field
    /// coordinates (e.g. the targeting solver).
    pub fn field_velocity(&self) -> Vector2<f64> {
        self.pose.rotation() * self.velocity.translation()
    }

    /// True once odometry has been missing long enough that the estimate
    /// carries degraded confidence. Advisory only; cleared by the next good
    /// observation.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Discontinuous jump to a known pose (match start, manual placement).
    /// Clears the correction history; wheel positions remain valid for the
    /// next delta.
    pub fn reset_pose(&mut self, pose: Pose2d) {
        self.pose = pose;
        self.origin = pose;
        self.velocity = ChassisSpeeds::default();
        self.history.clear();
        self.coast_ticks = 0;
        self.stale = false;
        if let Some(last) = &self.last_sample {
            self.history.push_back(OdometryRecord {
                timestamp: last.timestamp,
                twist: Twist2d::default(),
                pose,
                synthetic: false,
                corrections: Vec::new(),
            });
        }
    }

    /// Integrates one tick of measured module positions and gyro heading.
    /// Must be called every control tick; returns the updated estimate.
    pub fn add_odometry_observation(
        &mut self,
        positions: &[ModulePosition; 4],
        gyro_heading: f64,
        timestamp: f64,
    ) -> Pose2d {
        if !positions.iter().all(|p| p.is_finite())
            || !gyro_heading.is_finite()
            || !timestamp.is_finite()
        {
            warn!(timestamp, "dropping non-finite odometry sample");
            return self.pose;
        }

        // Real odometry covers any gap we coasted through; the synthetic
        // extrapolation records would double-count it.
        if self.coast_ticks > 0 {
            self.drop_synthetic_records();
            self.coast_ticks = 0;
        }

        let Some(last) = self.last_sample else {
            self.last_sample = Some(LastSample {
                timestamp,
                positions: *positions,
                gyro_heading,
            });
            self.history.push_back(OdometryRecord {
                timestamp,
                twist: Twist2d::default(),
                pose: self.pose,
                synthetic: false,
                corrections: Vec::new(),
            });
            self.origin = self.pose;
            return self.pose;
        };

        let dt = timestamp - last.timestamp;
        if dt <= 0.0 {
            warn!(
                timestamp,
                last_timestamp = last.timestamp,
                "non-monotonic odometry timestamp; dropping sample"
            );
            return self.pose;
        }

        // A sample arriving after more than two nominal periods of silence
        // still integrates (the distances are cumulative and cover the gap)
        // but the whole gap collapses into a single twist, losing any
        // curvature within it. Flag the estimate until an on-time sample
        // follows.
        self.stale = dt > 2.0 * self.config.nominal_period + 1e-9;
        if self.stale {
            warn!(
                dt,
                nominal_period = self.config.nominal_period,
                "odometry gap integrated as a single twist; pose estimate is stale"
            );
        }

        let mut deltas = [ModulePosition::default(); 4];
        for i in 0..4 {
            deltas[i] = ModulePosition::new(
                positions[i].distance - last.positions[i].distance,
                positions[i].angle,
            );
        }

        let mut twist = self.kinematics.twist(&deltas);
        // The gyro's absolute heading is trusted over wheel-integrated
        // rotation; only its delta is used so reset_pose stays honored.
        twist.dtheta = wrap_angle(gyro_heading - last.gyro_heading);

        self.pose = self.pose.exp(&twist);
        self.velocity = ChassisSpeeds::new(twist.dx / dt, twist.dy / dt, twist.dtheta / dt);
        self.last_sample = Some(LastSample {
            timestamp,
            positions: *positions,
            gyro_heading,
        });

        self.history.push_back(OdometryRecord {
            timestamp,
            twist,
            pose: self.pose,
            synthetic: false,
            corrections: Vec::new(),
        });
        self.prune_history(timestamp);

        self.pose
    }

    /// Advances the estimate across a missed odometry tick. The first
    /// missed period is covered by constant-velocity extrapolation; any
    /// further misses raise the staleness flag instead.
    pub fn coast(&mut self, timestamp: f64) {
        if self.last_sample.is_none() {
            return;
        }
        if self.coast_ticks == 0 {
            let dt = self.config.nominal_period;
            let twist = Twist2d::new(
                self.velocity.vx * dt,
                self.velocity.vy * dt,
                self.velocity.omega * dt,
            );
            self.pose = self.pose.exp(&twist);
            self.history.push_back(OdometryRecord {
                timestamp,
                twist,
                pose: self.pose,
                synthetic: true,
                corrections: Vec::new(),
            });
            debug!(timestamp, "odometry tick missed; extrapolating one period");
        } else {
            self.stale = true;
            warn!(
                timestamp,
                missed = self.coast_ticks + 1,
                "odometry still missing; pose estimate is stale"
            );
        }
        self.coast_ticks += 1;
    }

    /// Blends in an absolute vision fix. Non-finite measurements are
    /// dropped, implausible jumps rejected, and fixes stamped in the past
    /// are applied at their own timestamp with the subsequent odometry
    /// replayed on top.
    pub fn add_vision_observation(&mut self, measurement: &VisionMeasurement) {
        if !measurement.is_finite() || measurement.std_dev < 0.0 {
            warn!(
                timestamp = measurement.timestamp,
                "dropping malformed vision measurement"
            );
            return;
        }

        let Some(newest) = self.history.back() else {
            debug!("vision measurement before any odometry; ignoring");
            return;
        };
        let now = newest.timestamp;
        // A fix stamped ahead of our clock is treated as current.
        let timestamp = measurement.timestamp.min(now);

        let oldest = self
            .history
            .front()
            .map(|r| r.timestamp)
            .unwrap_or(now);
        if timestamp < oldest {
            debug!(
                timestamp,
                oldest, "vision measurement predates odometry history; discarding"
            );
            return;
        }

        // Anchor record: newest record at or before the fix's capture time.
        let idx = match self.history.iter().rposition(|r| r.timestamp <= timestamp) {
            Some(idx) => idx,
            None => return,
        };

        let anchor = self.history[idx].pose;
        let jump = (measurement.pose.translation - anchor.translation).norm();
        if jump > self.config.max_vision_jump {
            warn!(
                jump,
                limit = self.config.max_vision_jump,
                "vision measurement implies an implausible pose jump; rejecting"
            );
            return;
        }

        let age = now - timestamp;
        let confidence = 1.0 / (1.0 + measurement.std_dev);
        let weight = confidence * (-age / self.config.vision_time_constant).exp();

        self.history[idx].corrections.push(Correction {
            pose: measurement.pose,
            weight,
        });
        self.replay_from(idx);
    }

    /// Recomputes record poses from `idx` onward by replaying twists and
    /// anchored corrections, then republishes the newest pose.
    fn replay_from(&mut self, idx: usize) {
        let mut pose = if idx == 0 {
            self.origin
        } else {
            self.history[idx - 1].pose
        };
        for i in idx..self.history.len() {
            pose = pose.exp(&self.history[i].twist);
            for correction in &self.history[i].corrections {
                pose = blend(pose, correction.pose, correction.weight);
            }
            self.history[i].pose = pose;
        }
        self.pose = pose;
    }

    /// Removes extrapolated records once real odometry covers the gap.
    /// Corrections that were anchored to a removed record survive: they are
    /// re-anchored to the newest real record and replayed.
    fn drop_synthetic_records(&mut self) {
        let mut orphaned: Vec<Correction> = Vec::new();
        while self.history.back().is_some_and(|r| r.synthetic) {
            if let Some(popped) = self.history.pop_back() {
                orphaned.extend(popped.corrections);
            }
        }

        if orphaned.is_empty() {
            self.pose = self
                .history
                .back()
                .map(|r| r.pose)
                .unwrap_or(self.origin);
            return;
        }

        match self.history.len().checked_sub(1) {
            Some(idx) => {
                self.history[idx].corrections.extend(orphaned);
                self.replay_from(idx);
            }
            None => {
                let mut pose = self.origin;
                for correction in &orphaned {
                    pose = blend(pose, correction.pose, correction.weight);
                }
                self.origin = pose;
                self.pose = pose;
            }
        }
    }

    fn prune_history(&mut self, now: f64) {
        let cutoff = now - self.config.history_window;
        while self.history.len() > 1 {
            match self.history.front() {
                Some(front) if front.timestamp < cutoff => {
                    // The popped record's (corrected) pose becomes the new origin.
                    if let Some(popped) = self.history.pop_front() {
                        self.origin = popped.pose;
                    }
                }
                _ => break,
            }
        }
    }
}

/// Weighted interpolation from `base` toward `measurement`: translation is
/// lerped, heading moves along the shortest arc.
fn blend(base: Pose2d, measurement: Pose2d, weight: f64) -> Pose2d {
    let weight = weight.clamp(0.0, 1.0);
    Pose2d {
        translation: base.translation + (measurement.translation - base.translation) * weight,
        heading: wrap_angle(base.heading + weight * wrap_angle(measurement.heading - base.heading)),
    }
}
