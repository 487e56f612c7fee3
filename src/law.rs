// The control law abstraction shared by every feedback strategy
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

use core::time::Duration;

use num_traits::Signed;

use crate::bangbang::BangBang;
use crate::clegg::Clegg;
use crate::pid::{Pid, PidMod};

/// Intervals shorter than this are too short to difference the error over; the derivative term
/// is dropped for that iteration instead.
pub const MIN_DERIVATIVE_DT: Duration = Duration::from_micros(100);

/// The slice of controller state a control law may read during one iteration.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LawContext {
    /// The controller's current goal
    pub goal: i32,

    /// Seconds since the previous iteration, or `None` if there was no previous iteration or the
    /// interval is below [`MIN_DERIVATIVE_DT`]
    pub dt: Option<f64>,
}

impl LawContext {
    /// Builds a context, discarding intervals too short to compute a derivative over
    pub fn new(goal: i32, elapsed: Option<Duration>) -> Self {
        let dt = elapsed
            .filter(|elapsed| *elapsed >= MIN_DERIVATIVE_DT)
            .map(|elapsed| elapsed.as_secs_f64());
        Self { goal, dt }
    }

    /// The backward-difference derivative of the error, or zero if no usable interval exists
    pub fn derivative(&self, error: i32, prev_error: i32) -> f64 {
        match self.dt {
            Some(dt) => (f64::from(error) - f64::from(prev_error)) / dt,
            None => 0.0,
        }
    }
}

/// A feedback strategy mapping an error signal to an actuator command.
pub trait ControlLaw {
    /// Computes the raw (pre-deadband) output for `error = goal - reading`
    fn compute(&mut self, ctx: &LawContext, error: i32) -> i32;

    /// Returns every accumulator to its initial state
    fn reset(&mut self);
}

/// The control law attached to a controller.
///
/// Every variant owns its gains and accumulators; swapping the variant swaps both.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Law {
    /// Proportional-integral-derivative with a clamped integral
    Pid(Pid),

    /// PID with goal feedforward and an integral that halves on every zero crossing
    PidMod(PidMod),

    /// Full-speed approach followed by proportional braking
    BangBang(BangBang),

    /// Reset integrator
    Clegg(Clegg),
}

impl Law {
    /// The PID law, if that is the attached variant
    pub fn as_pid(&self) -> Option<&Pid> {
        match self {
            Law::Pid(pid) => Some(pid),
            _ => None,
        }
    }

    /// Mutable access to the PID law, if that is the attached variant
    pub fn as_pid_mut(&mut self) -> Option<&mut Pid> {
        match self {
            Law::Pid(pid) => Some(pid),
            _ => None,
        }
    }
}

impl Default for Law {
    fn default() -> Self {
        Law::Pid(Pid::default())
    }
}

impl ControlLaw for Law {
    fn compute(&mut self, ctx: &LawContext, error: i32) -> i32 {
        match self {
            Law::Pid(law) => law.compute(ctx, error),
            Law::PidMod(law) => law.compute(ctx, error),
            Law::BangBang(law) => law.compute(ctx, error),
            Law::Clegg(law) => law.compute(ctx, error),
        }
    }

    fn reset(&mut self) {
        match self {
            Law::Pid(law) => law.reset(),
            Law::PidMod(law) => law.reset(),
            Law::BangBang(law) => law.reset(),
            Law::Clegg(law) => law.reset(),
        }
    }
}

impl From<Pid> for Law {
    fn from(law: Pid) -> Self {
        Law::Pid(law)
    }
}

impl From<PidMod> for Law {
    fn from(law: PidMod) -> Self {
        Law::PidMod(law)
    }
}

impl From<BangBang> for Law {
    fn from(law: BangBang) -> Self {
        Law::BangBang(law)
    }
}

impl From<Clegg> for Law {
    fn from(law: Clegg) -> Self {
        Law::Clegg(law)
    }
}

/// -1, 0 or 1 following the sign of `value`
pub(crate) fn sgn<T: Signed>(value: T) -> T {
    value.signum()
}

/// Converts a floating-point command to an integer one, truncating toward zero and saturating at
/// the bounds of `i32`. NaN maps to zero.
pub(crate) fn to_output(value: f64) -> i32 {
    value as i32
}
