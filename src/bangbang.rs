// Bang-bang approach with proportional braking
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

/// Where the system stands relative to its goal in the current goal epoch.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Approach {
    /// The goal has not been crossed yet; drive at full speed
    #[default]
    Approaching,

    /// The goal has been crossed at least once; brake proportionally. Only a reset leaves this state.
    Passed,
}

/// A bang-bang law that switches to proportional braking once the goal is crossed.
///
/// Plain bang-bang control reverses at full speed on every crossing and oscillates around the
/// goal. Braking proportionally after the first crossing settles smoothly while still
/// accounting for the inertia of the mechanism.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct BangBang {
    k_brake: f64,
    full_speed: i32,
    approach: Approach,
}

impl BangBang {
    /// Creates the law.
    ///
    /// # Arguments
    /// - `k_brake`: proportional gain used after the goal has been crossed.
    /// - `full_speed`: output magnitude used during the approach. The maximum actuator command is
    ///   common, but a lower speed gives smoother movements. The direction comes from the sign
    ///   of the goal, so a negative speed is rejected with `ConfigError::InvalidSpeed`.
    pub fn new(k_brake: f64, full_speed: i32) -> Result<Self, ConfigError> {
        if !k_brake.is_finite() {
            return Err(ConfigError::InvalidGain);
        }
        if full_speed < 0 {
            return Err(ConfigError::InvalidSpeed);
        }
        Ok(Self {
            k_brake,
            full_speed,
            approach: Approach::Approaching,
        })
    }

    pub fn k_brake(&self) -> f64 {
        self.k_brake
    }

    pub fn full_speed(&self) -> i32 {
        self.full_speed
    }

    pub fn approach(&self) -> Approach {
        self.approach
    }
}

impl ControlLaw for BangBang {
    fn compute(&mut self, ctx: &LawContext, error: i32) -> i32 {
        if sgn(error) != sgn(ctx.goal) {
            self.approach = Approach::Passed;
        }

        match self.approach {
            Approach::Approaching => sgn(ctx.goal) * self.full_speed,
            Approach::Passed => to_output(self.k_brake * f64::from(error)),
        }
    }

    fn reset(&mut self) {
        self.approach = Approach::Approaching;
    }
}
