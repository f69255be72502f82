// kestrel_sim/src/platform.rs

//! The simulated robot: ground-truth chassis physics plus noisy
//! implementations of every hardware seam the core exposes. One struct
//! plays all the roles so a runner generic over the trait bounds works
//! the same against real hardware.

use nalgebra::Vector2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

use kestrel_core::estimation::VisionMeasurement;
use kestrel_core::interfaces::{
    ActuatorSink, OdometrySample, OdometrySource, OperatorInput, OperatorIntent, VisionSource,
};
use kestrel_core::kinematics::SwerveKinematics;
use kestrel_core::types::{ModulePosition, ModuleState, Pose2d, Twist2d};

use crate::scenario::{ScenarioConfig, ScenarioError, ScriptSegment};

/// Ground-truth chassis state. Integrates the commanded module states
/// exactly; all imperfection lives in the sensor models layered on top.
struct ChassisTruth {
    kinematics: SwerveKinematics,
    pose: Pose2d,
    commanded: [ModuleState; 4],
    distances: [f64; 4],
}

impl ChassisTruth {
    fn step(&mut self, dt: f64) {
        let speeds = self.kinematics.to_chassis_speeds(&self.commanded);
        self.pose = self.pose.exp(&Twist2d::new(
            speeds.vx * dt,
            speeds.vy * dt,
            speeds.omega * dt,
        ));
        for (distance, state) in self.distances.iter_mut().zip(&self.commanded) {
            *distance += state.speed * dt;
        }
    }
}

pub struct SimPlatform {
    clock: f64,
    truth: ChassisTruth,
    rng: ChaCha8Rng,
    distance_noise: Normal<f64>,
    gyro_noise: Normal<f64>,
    vision_noise: Normal<f64>,
    odometry_dropout: f64,
    vision_std: f64,
    vision_period: f64,
    vision_latency: f64,
    next_vision_capture: f64,
    /// Captured fixes waiting out their delivery latency.
    in_flight: Vec<(f64, VisionMeasurement)>,
    script: Vec<ScriptSegment>,
    /// Truth heading plus white noise; no bias model.
    gyro_reading: f64,
}

impl SimPlatform {
    pub fn new(scenario: &ScenarioConfig) -> Result<Self, ScenarioError> {
        let noise = &scenario.noise;
        let [x, y, heading] = scenario.simulation.start_pose;

        let kinematics = SwerveKinematics::new(scenario.robot.module_offsets())?;
        let truth = ChassisTruth {
            kinematics,
            pose: Pose2d::new(x, y, heading),
            commanded: [ModuleState::default(); 4],
            distances: [0.0; 4],
        };

        Ok(Self {
            clock: 0.0,
            truth,
            rng: ChaCha8Rng::seed_from_u64(scenario.simulation.seed),
            distance_noise: gaussian(noise.odometry_distance_std)?,
            gyro_noise: gaussian(noise.gyro_std)?,
            vision_noise: gaussian(noise.vision_std)?,
            odometry_dropout: noise.odometry_dropout,
            vision_std: noise.vision_std,
            vision_period: 1.0 / noise.vision_rate,
            vision_latency: noise.vision_latency,
            next_vision_capture: 0.0,
            in_flight: Vec::new(),
            script: scenario.script.clone(),
            gyro_reading: heading,
        })
    }

    /// Advances ground truth by one tick and captures any vision frames
    /// that fall within it.
    pub fn step(&mut self, dt: f64) {
        self.truth.step(dt);
        self.clock += dt;
        self.gyro_reading = self.truth.pose.heading;

        while self.next_vision_capture <= self.clock {
            let captured_at = self.next_vision_capture;
            let noisy = Pose2d::new(
                self.truth.pose.translation.x + self.vision_noise.sample(&mut self.rng),
                self.truth.pose.translation.y + self.vision_noise.sample(&mut self.rng),
                self.truth.pose.heading,
            );
            self.in_flight.push((
                captured_at + self.vision_latency,
                VisionMeasurement {
                    pose: noisy,
                    timestamp: captured_at,
                    std_dev: self.vision_std,
                },
            ));
            self.next_vision_capture += self.vision_period;
        }
    }

    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn truth_pose(&self) -> Pose2d {
        self.truth.pose
    }

    pub fn truth_field_velocity(&self) -> Vector2<f64> {
        let speeds = self.truth.kinematics.to_chassis_speeds(&self.truth.commanded);
        self.truth.pose.rotation() * speeds.translation()
    }
}

fn gaussian(std_dev: f64) -> Result<Normal<f64>, ScenarioError> {
    Normal::new(0.0, std_dev).map_err(|_| ScenarioError::BadNoise)
}

impl OdometrySource for SimPlatform {
    fn sample(&mut self) -> Option<OdometrySample> {
        if self.odometry_dropout > 0.0 && self.rng.gen::<f64>() < self.odometry_dropout {
            return None;
        }
        let mut positions = [ModulePosition::default(); 4];
        for (position, (distance, state)) in positions
            .iter_mut()
            .zip(self.truth.distances.iter().zip(&self.truth.commanded))
        {
            *position = ModulePosition::new(
                distance + self.distance_noise.sample(&mut self.rng),
                state.angle,
            );
        }
        Some(OdometrySample {
            positions,
            gyro_heading: self.gyro_reading + self.gyro_noise.sample(&mut self.rng),
            timestamp: self.clock,
        })
    }
}

impl VisionSource for SimPlatform {
    fn drain(&mut self, out: &mut Vec<VisionMeasurement>) {
        let clock = self.clock;
        self.in_flight.retain(|(deliver_at, measurement)| {
            if *deliver_at <= clock {
                out.push(*measurement);
                false
            } else {
                true
            }
        });
    }
}

impl ActuatorSink for SimPlatform {
    fn apply(&mut self, states: &[ModuleState; 4]) {
        self.truth.commanded = *states;
    }
}

impl OperatorInput for SimPlatform {
    fn intent(&mut self) -> OperatorIntent {
        // Past the last segment the operator lets go of the sticks.
        match self.script.iter().find(|segment| self.clock < segment.until) {
            Some(segment) => OperatorIntent {
                x: segment.x,
                y: segment.y,
                rotation: segment.rotation,
                heading_hold: segment.heading_hold,
                reset_pose: None,
            },
            None => OperatorIntent::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::test_scenario;
    use approx::assert_abs_diff_eq;

    #[test]
    fn truth_integrates_commanded_forward_motion() {
        let scenario = test_scenario();
        let mut platform = SimPlatform::new(&scenario).expect("platform");
        platform.apply(&[ModuleState::new(1.0, 0.0); 4]);
        for _ in 0..50 {
            platform.step(0.02);
        }
        assert_abs_diff_eq!(platform.truth_pose().translation.x, 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(platform.truth_pose().translation.y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn vision_arrives_after_latency() {
        let scenario = test_scenario();
        let mut platform = SimPlatform::new(&scenario).expect("platform");
        let mut fixes = Vec::new();

        // Latency is 0.08 s; the frame captured at t=0 is not deliverable
        // until t=0.08.
        platform.step(0.02);
        platform.drain(&mut fixes);
        assert!(fixes.is_empty());

        for _ in 0..4 {
            platform.step(0.02);
        }
        platform.drain(&mut fixes);
        assert!(!fixes.is_empty());
        assert!(fixes.iter().all(|f| f.timestamp + 0.08 <= platform.clock() + 1e-9));
    }

    #[test]
    fn script_segments_switch_on_time() {
        let scenario = test_scenario();
        let mut platform = SimPlatform::new(&scenario).expect("platform");
        assert_abs_diff_eq!(platform.intent().x, 0.6, epsilon = 1e-12);
        for _ in 0..150 {
            platform.step(0.02);
        }
        // Past t = 2.0: second segment, holding PI/2.
        let intent = platform.intent();
        assert_abs_diff_eq!(intent.y, 0.5, epsilon = 1e-12);
        assert!(intent.heading_hold.is_some());
    }

    #[test]
    fn same_seed_gives_identical_samples() {
        let scenario = test_scenario();
        let mut a = SimPlatform::new(&scenario).expect("platform");
        let mut b = SimPlatform::new(&scenario).expect("platform");
        a.step(0.02);
        b.step(0.02);
        let (sa, sb) = (a.sample(), b.sample());
        match (sa, sb) {
            (Some(sa), Some(sb)) => {
                assert_eq!(sa.gyro_heading, sb.gyro_heading);
                assert_eq!(sa.positions[0].distance, sb.positions[0].distance);
            }
            _ => panic!("expected samples from both platforms"),
        }
    }
}
