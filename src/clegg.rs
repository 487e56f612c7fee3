// Clegg reset integrator
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

/// A pure integrator whose state is dumped on every zero crossing of the error.
///
/// - When the goal changes, the output kicks to `sign(goal)·initial_output` and integration
///   restarts from zero.
/// - When the error changes sign, the output drops to zero and integration restarts from zero.
/// - Otherwise the output is `gain·Σe`.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Clegg {
    gain: f64,
    initial_output: u32,
    integral: i64,
    prev_goal: i32,
    prev_error: i32,
}

impl Clegg {
    pub fn new(gain: f64, initial_output: u32) -> Result<Self, ConfigError> {
        if !gain.is_finite() {
            return Err(ConfigError::InvalidGain);
        }
        Ok(Self {
            gain,
            initial_output,
            ..Default::default()
        })
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }

    pub fn initial_output(&self) -> u32 {
        self.initial_output
    }

    pub fn integral(&self) -> i64 {
        self.integral
    }
}

impl ControlLaw for Clegg {
    fn compute(&mut self, ctx: &LawContext, error: i32) -> i32 {
        let goal_changed = ctx.goal != self.prev_goal;
        let crossed = sgn(error) != sgn(self.prev_error);
        self.prev_goal = ctx.goal;
        self.prev_error = error;

        if goal_changed {
            self.integral = 0;
            let kick = i32::try_from(self.initial_output).unwrap_or(i32::MAX);
            sgn(ctx.goal) * kick
        } else if crossed {
            self.integral = 0;
            0
        } else {
            self.integral = self.integral.saturating_add(i64::from(error));
            to_output(self.gain * self.integral as f64)
        }
    }

    fn reset(&mut self) {
        self.integral = 0;
        self.prev_error = 0;
        self.prev_goal = 0;
    }
}
