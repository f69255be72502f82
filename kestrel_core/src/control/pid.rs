// kestrel_core/src/control/pid.rs

use crate::config::PidGains;
use crate::types::wrap_angle;

/// Integral accumulation is clamped to this band (in output units) so a
/// long hold against an obstruction cannot wind up.
const INTEGRAL_LIMIT: f64 = 1.0;

/// A small PID loop. With `continuous` set, the error input is treated as
/// an angle and wrapped to `(-PI, PI]` so the controller always takes the
/// shortest path around the circle.
#[derive(Debug, Clone)]
pub struct PidController {
    gains: PidGains,
    continuous: bool,
    integral: f64,
    previous_error: Option<f64>,
}

impl PidController {
    pub fn new(gains: PidGains, continuous: bool) -> Self {
        Self {
            gains,
            continuous,
            integral: 0.0,
            previous_error: None,
        }
    }

    /// Clears integral and derivative memory. Called when the loop is
    /// disengaged so stale windup never carries into the next engagement.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.previous_error = None;
    }

    pub fn calculate(&mut self, error: f64, dt: f64) -> f64 {
        let error = if self.continuous {
            wrap_angle(error)
        } else {
            error
        };

        if dt > 0.0 {
            self.integral = (self.integral + error * dt).clamp(-INTEGRAL_LIMIT, INTEGRAL_LIMIT);
        }

        let derivative = match self.previous_error {
            Some(previous) if dt > 0.0 => {
                let delta = if self.continuous {
                    wrap_angle(error - previous)
                } else {
                    error - previous
                };
                delta / dt
            }
            _ => 0.0,
        };
        self.previous_error = Some(error);

        self.gains.kp * error + self.gains.ki * self.integral + self.gains.kd * derivative
    }
}
