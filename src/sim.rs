// Simulated plants for closed-loop testing
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

use core::cell::RefCell;
use core::time::Duration;

use nalgebra as na;

use crate::controller::{Actuator, Sensor};
use crate::time::{Clock, InstantLike, ManualClock, Micros};

/// Integration step of the plant
pub const SIM_STEP: Duration = Duration::from_millis(1);

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MotorParams {
    /// Steady-state speed per unit of effective command, in counts per second
    pub speed_gain: f64,
    /// Mechanical time constant, in seconds
    pub time_constant: f64,
    /// Commands of this magnitude or less don't overcome static friction
    pub static_friction: i32,
    /// The motor driver saturates commands at ± this value
    pub max_command: i32,
}

impl Default for MotorParams {
    fn default() -> Self {
        Self {
            speed_gain: 10.0,
            time_constant: 0.1,
            static_friction: 15,
            max_command: 127,
        }
    }
}

impl MotorParams {
    /// Implements the state-space realization of a first-order DC motor driving an encoder:
    /// ┌    ┐   ┌          ┐┌    ┐   ┌     ┐
    /// │ p' │ = │ 0   1    ││ p  │ + │ 0   │ u
    /// │ v' │   │ 0  -1/τ  ││ v  │   │ K/τ │
    /// └    ┘   └          ┘└    ┘   └     ┘
    pub fn f(&self, x: na::Vector2<f64>, u: f64) -> na::Vector2<f64> {
        let mat_a = na::Matrix2::new(0.0, 1.0, 0.0, -1.0 / self.time_constant);
        let mat_b = na::Vector2::new(0.0, self.speed_gain / self.time_constant);
        mat_a * x + mat_b * u
    }

    /// The command the motor actually responds to, after driver saturation and static friction.
    /// Only the magnitude of `max_command` is used.
    pub fn effective_command(&self, command: i32) -> f64 {
        let limit = self.max_command.saturating_abs();
        let saturated = command.clamp(-limit, limit);
        if saturated.abs() <= self.static_friction {
            0.0
        } else {
            f64::from(saturated)
        }
    }
}

/// One classical Runge-Kutta step of `x' = f(x, u)` with `u` held constant.
pub fn rk4<F>(f: F, x: na::Vector2<f64>, u: f64, h: f64) -> na::Vector2<f64>
where
    F: Fn(na::Vector2<f64>, f64) -> na::Vector2<f64>,
{
    let k1 = f(x, u);
    let k2 = f(x + k1 * (h / 2.0), u);
    let k3 = f(x + k2 * (h / 2.0), u);
    let k4 = f(x + k3 * h, u);
    x + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (h / 6.0)
}

#[derive(Debug)]
struct PlantState {
    x: na::Vector2<f64>,
    command: i32,
    updated: Micros,
    hard_stop: Option<(f64, f64)>,
}

/// A DC motor with an encoder, living on a [`ManualClock`].
///
/// The plant integrates lazily: every interaction first catches the state up with the clock in
/// [`SIM_STEP`] increments, holding the last command.
#[derive(Debug)]
pub struct MotorPlant<'c> {
    params: MotorParams,
    clock: &'c ManualClock,
    state: RefCell<PlantState>,
}

impl<'c> MotorPlant<'c> {
    pub fn new(params: MotorParams, clock: &'c ManualClock) -> Self {
        Self {
            params,
            clock,
            state: RefCell::new(PlantState {
                x: na::Vector2::zeros(),
                command: 0,
                updated: clock.now(),
                hard_stop: None,
            }),
        }
    }

    /// Confines the mechanism to `[min, max]` counts; hitting either end stops it dead.
    pub fn with_hard_stop(self, min: f64, max: f64) -> Self {
        self.set_hard_stop(Some((min, max)));
        self
    }

    pub fn set_hard_stop(&self, hard_stop: Option<(f64, f64)>) {
        self.sync();
        self.state.borrow_mut().hard_stop = hard_stop;
    }

    pub fn params(&self) -> &MotorParams {
        &self.params
    }

    /// A copyable handle that is both the actuator and the sensor of this plant
    pub fn handle(&self) -> PlantHandle<'_, 'c> {
        PlantHandle { plant: self }
    }

    pub fn position(&self) -> f64 {
        self.sync();
        self.state.borrow().x[0]
    }

    pub fn velocity(&self) -> f64 {
        self.sync();
        self.state.borrow().x[1]
    }

    pub fn command(&self) -> i32 {
        self.state.borrow().command
    }

    pub fn drive(&self, command: i32) {
        self.sync();
        self.state.borrow_mut().command = command;
    }

    /// The encoder reading, rounded to whole counts
    pub fn sense(&self) -> i32 {
        self.position().round() as i32
    }

    fn sync(&self) {
        let now = self.clock.now();
        let mut state = self.state.borrow_mut();
        let u = self.params.effective_command(state.command);
        let mut remaining = now.duration_since(state.updated).as_secs_f64();
        let step = SIM_STEP.as_secs_f64();

        while remaining > 0.0 {
            let h = remaining.min(step);
            let mut x = rk4(|x, u| self.params.f(x, u), state.x, u, h);
            if let Some((min, max)) = state.hard_stop {
                if x[0] <= min || x[0] >= max {
                    x[0] = x[0].clamp(min, max);
                    x[1] = 0.0;
                }
            }
            state.x = x;
            remaining -= h;
        }
        state.updated = now;
    }
}

/// Shared access to a [`MotorPlant`] as an [`Actuator`] and a [`Sensor`].
#[derive(Copy, Clone, Debug)]
pub struct PlantHandle<'p, 'c> {
    plant: &'p MotorPlant<'c>,
}

impl Actuator for PlantHandle<'_, '_> {
    fn drive(&mut self, output: i32) {
        self.plant.drive(output);
    }
}

impl Sensor for PlantHandle<'_, '_> {
    fn sense(&mut self) -> i32 {
        self.plant.sense()
    }
}
