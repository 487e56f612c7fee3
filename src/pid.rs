// PID and modified-PID control laws
// Copyright © 2025 Hs293Go
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the "Software"),
// to deal in the Software without restriction, including without limitation
// the rights to use, copy, modify, merge, publish, distribute, sublicense,
// and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included
// in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES
// OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT.
// IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
// DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT,
// TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE
// OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

use crate::error::ConfigError;
use crate::law::{sgn, to_output, ControlLaw, LawContext};

/// Proportional, integral and derivative gains.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Gains {
    /// Proportional gain
    pub kp: f64,
    /// Integral gain, applied to the running sum of errors
    pub ki: f64,
    /// Derivative gain, applied to the error rate in units per second
    pub kd: f64,
}

impl Gains {
    /// Bundles three gains
    pub fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self { kp, ki, kd }
    }

    fn is_finite(&self) -> bool {
        self.kp.is_finite() && self.ki.is_finite() && self.kd.is_finite()
    }
}

/// Gains and integral clamp of a [`Pid`] law.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PidConfig {
    /// The three gains.
    /// Defaults to kP = 1, kI = 0, kD = 0, i.e. a pure proportional controller.
    gains: Gains,

    /// Minimum value the error sum can take.
    /// Defaults to `i32::MIN`, i.e. no limit.
    min_integral: i32,

    /// Maximum value the error sum can take.
    /// Defaults to `i32::MAX`, i.e. no limit.
    max_integral: i32,
}

impl Default for PidConfig {
    fn default() -> Self {
        PidConfig {
            gains: Gains::new(1.0, 0.0, 0.0),
            min_integral: i32::MIN,
            max_integral: i32::MAX,
        }
    }
}

impl PidConfig {
    /// Returns the proportional gain.
    pub fn kp(&self) -> f64 {
        self.gains.kp
    }

    /// Returns the integral gain.
    pub fn ki(&self) -> f64 {
        self.gains.ki
    }

    /// Returns the derivative gain.
    pub fn kd(&self) -> f64 {
        self.gains.kd
    }

    /// Convenience method that returns the three gains together.
    pub fn gains(&self) -> Gains {
        self.gains
    }

    /// Returns the lower clamp of the error sum.
    pub fn min_integral(&self) -> i32 {
        self.min_integral
    }

    /// Returns the upper clamp of the error sum.
    pub fn max_integral(&self) -> i32 {
        self.max_integral
    }

    /// Sets all three gains at once.
    ///
    /// Gains of any sign are accepted so that reverse-acting loops can be expressed, but they
    /// must be finite. On failure the previous gains are kept.
    pub fn set_gains(&mut self, gains: Gains) -> Result<(), ConfigError> {
        if !gains.is_finite() {
            return Err(ConfigError::InvalidGain);
        }
        self.gains = gains;
        Ok(())
    }

    /// Sets the clamp applied to the error sum after every accumulation.
    ///
    /// # Returns
    /// - `Ok(())` if the bounds were set successfully.
    /// - `Err(ConfigError::InvalidIntegralBounds)` if `min_integral > max_integral`.
    pub fn set_integral_limits(
        &mut self,
        min_integral: i32,
        max_integral: i32,
    ) -> Result<(), ConfigError> {
        if min_integral > max_integral {
            return Err(ConfigError::InvalidIntegralBounds);
        }
        self.min_integral = min_integral;
        self.max_integral = max_integral;
        Ok(())
    }
}

/// Builder for [`PidConfig`], validating everything in `build`.
#[derive(Copy, Clone, Debug, Default)]
pub struct PidConfigBuilder {
    config: PidConfig,
}

impl PidConfigBuilder {
    pub fn kp(mut self, kp: f64) -> Self {
        self.config.gains.kp = kp;
        self
    }

    pub fn ki(mut self, ki: f64) -> Self {
        self.config.gains.ki = ki;
        self
    }

    pub fn kd(mut self, kd: f64) -> Self {
        self.config.gains.kd = kd;
        self
    }

    pub fn integral_limits(mut self, min_integral: i32, max_integral: i32) -> Self {
        self.config.min_integral = min_integral;
        self.config.max_integral = max_integral;
        self
    }

    pub fn build(self) -> Result<PidConfig, ConfigError> {
        let mut config = PidConfig::default();
        config.set_gains(self.config.gains)?;
        config.set_integral_limits(self.config.min_integral, self.config.max_integral)?;
        Ok(config)
    }
}

/// The classical PID law.
///
/// `output = kP·e + kI·Σe + kD·de/dt`, where the error sum is clamped to the configured integral
/// limits after every accumulation.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Pid {
    config: PidConfig,
    integral: i64,
    prev_error: i32,
}

impl Pid {
    pub fn new(config: PidConfig) -> Self {
        Self {
            config,
            integral: 0,
            prev_error: 0,
        }
    }

    pub fn config(&self) -> &PidConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut PidConfig {
        &mut self.config
    }

    /// The clamped running sum of errors
    pub fn integral(&self) -> i64 {
        self.integral
    }

    pub fn prev_error(&self) -> i32 {
        self.prev_error
    }
}

impl ControlLaw for Pid {
    fn compute(&mut self, ctx: &LawContext, error: i32) -> i32 {
        self.integral = num_traits::clamp(
            self.integral + i64::from(error),
            i64::from(self.config.min_integral),
            i64::from(self.config.max_integral),
        );

        let derivative = ctx.derivative(error, self.prev_error);
        self.prev_error = error;

        let gains = self.config.gains;
        to_output(
            gains.kp * f64::from(error) + gains.ki * self.integral as f64 + gains.kd * derivative,
        )
    }

    fn reset(&mut self) {
        self.integral = 0;
        self.prev_error = 0;
    }
}

/// PID with feedforward on the goal, suited to velocity loops.
///
/// Instead of clamping, the error sum is halved every time the error changes sign, so the
/// integrator bleeds off after an overshoot. Between sign changes the sum is unbounded.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct PidMod {
    gains: Gains,
    kf: f64,
    integral: i64,
    prev_error: i32,
}

impl PidMod {
    /// Creates the law from its gains and the feedforward constant, which multiplies the goal.
    pub fn new(gains: Gains, kf: f64) -> Result<Self, ConfigError> {
        if !gains.is_finite() || !kf.is_finite() {
            return Err(ConfigError::InvalidGain);
        }
        Ok(Self {
            gains,
            kf,
            integral: 0,
            prev_error: 0,
        })
    }

    pub fn gains(&self) -> Gains {
        self.gains
    }

    pub fn kf(&self) -> f64 {
        self.kf
    }

    pub fn integral(&self) -> i64 {
        self.integral
    }
}

impl ControlLaw for PidMod {
    fn compute(&mut self, ctx: &LawContext, error: i32) -> i32 {
        if sgn(error) != sgn(self.prev_error) {
            self.integral /= 2;
        } else {
            self.integral = self.integral.saturating_add(i64::from(error));
        }

        let derivative = ctx.derivative(error, self.prev_error);
        self.prev_error = error;

        to_output(
            self.gains.kp * f64::from(error)
                + self.gains.ki * self.integral as f64
                + self.gains.kd * derivative
                + self.kf * f64::from(ctx.goal),
        )
    }

    fn reset(&mut self) {
        self.integral = 0;
        self.prev_error = 0;
    }
}
