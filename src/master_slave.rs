// Master-slave synchronization of two mechanically linked feedback loops
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

//! Two independently actuated subsystems that carry one mechanism, e.g. the two sides of a lift,
//! are kept level by an equalizer loop whose reading is the positional difference
//! `master - slave` and whose goal is always zero. Its output is subtracted from the master's
//! command and added to the slave's.
//!
//! Since the equalizer's error is `slave - master`, a correction that pulls the two sides
//! together needs a negative equalizer gain.

use core::time::Duration;

use log::debug;

use crate::controller::{
    Controller, ControllerConfig, Convergence, FeedbackLoop, Periodic, Sensor,
};
use crate::error::ConfigError;
use crate::pid::{Gains, Pid, PidConfigBuilder};
use crate::stall::NoStallDetect;
use crate::time::Clock;

/// Which half of the pair an output is generated for.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Side {
    Master,
    Slave,
}

/// The equalizer's sensor. The composite injects the current `master - slave` difference before
/// every equalizer iteration, so the reading always reflects the controllers currently owned.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DeltaSensor {
    delta: i32,
}

impl DeltaSensor {
    pub fn set(&mut self, delta: i32) {
        self.delta = delta;
    }
}

impl Sensor for DeltaSensor {
    fn sense(&mut self) -> i32 {
        self.delta
    }

    fn reset(&mut self) {
        self.delta = 0;
    }
}

/// The controller driving the positional difference between master and slave to zero.
pub type Equalizer<C> = Controller<(), DeltaSensor, C, NoStallDetect>;

/// A synchronized pair of feedback loops.
pub struct MasterSlave<M, S, C: Clock> {
    master: M,
    slave: S,
    equalizer: Equalizer<C>,
    manual_output: i32,
    manual: bool,
}

impl<M: FeedbackLoop, S: FeedbackLoop, C: Clock> MasterSlave<M, S, C> {
    /// Pairs two loops with a ready-made equalizer. The pair starts in goal-tracking mode.
    pub fn new(master: M, slave: S, equalizer: Equalizer<C>) -> Self {
        Self {
            master,
            slave,
            equalizer,
            manual_output: 0,
            manual: false,
        }
    }

    /// Pairs two loops with a PID equalizer built from `gains` and an integral clamp. The
    /// equalizer's loop period also paces [`run_to_completion`](Periodic::run_to_completion).
    pub fn with_equalizer_pid(
        master: M,
        slave: S,
        gains: Gains,
        (min_integral, max_integral): (i32, i32),
        clock: C,
    ) -> Result<Self, ConfigError> {
        let pid = PidConfigBuilder::default()
            .kp(gains.kp)
            .ki(gains.ki)
            .kd(gains.kd)
            .integral_limits(min_integral, max_integral)
            .build()?;
        let equalizer = Controller::new(
            ControllerConfig::default(),
            Pid::new(pid),
            (),
            DeltaSensor::default(),
            clock,
        )
        .without_stall_detection();
        Ok(Self::new(master, slave, equalizer))
    }

    /// The command for one side: its own output (or the manual output) biased by the
    /// equalizer. The master's sub-controller is iterated only for [`Side::Master`], and vice
    /// versa.
    pub fn generate_output(&mut self, side: Side) -> i32 {
        let base = match (self.manual, side) {
            (true, _) => self.manual_output,
            (false, Side::Master) => self.master.generate_output(),
            (false, Side::Slave) => self.slave.generate_output(),
        };

        let delta = self.master.sense().saturating_sub(self.slave.sense());
        self.equalizer.sensor_mut().set(delta);
        let correction = self.equalizer.generate_output();

        match side {
            Side::Master => base.saturating_sub(correction),
            Side::Slave => base.saturating_add(correction),
        }
    }

    /// Stalled if either side is stalled, confident only if both sides are confident.
    pub fn convergence(&self) -> Convergence {
        let master = self.master.convergence();
        let slave = self.slave.convergence();
        if master == Convergence::Stalled || slave == Convergence::Stalled {
            Convergence::Stalled
        } else if master == Convergence::Confident && slave == Convergence::Confident {
            Convergence::Confident
        } else {
            Convergence::Running
        }
    }

    /// Resets master, slave and the equalizer.
    pub fn reset(&mut self) {
        self.master.reset();
        self.slave.reset();
        self.equalizer.reset();
    }

    /// With `manual` set, switches to manual mode and commands `goal` as a raw output to both
    /// sides; the sub-controllers' goals are untouched. Otherwise leaves manual mode and hands
    /// `goal` to both sub-controllers.
    pub fn set_goal(&mut self, goal: i32, manual: bool) {
        self.manual = manual;
        if manual {
            self.manual_output = goal;
            return;
        }
        debug!("Synchronized goal {}", goal);
        self.master.set_goal(goal);
        self.slave.set_goal(goal);
    }

    /// One iteration of both sides, master first, each actuated as soon as it is computed.
    pub fn run_continuous(&mut self) -> Convergence {
        let master = self.generate_output(Side::Master);
        self.master.drive(master);
        let slave = self.generate_output(Side::Slave);
        self.slave.drive(slave);
        self.convergence()
    }

    /// See [`Periodic::run_to_completion`]
    pub fn run_to_completion(&mut self, timeout: Duration) -> bool {
        <Self as Periodic>::run_to_completion(self, timeout)
    }

    pub fn is_manual(&self) -> bool {
        self.manual
    }

    pub fn manual_output(&self) -> i32 {
        self.manual_output
    }

    pub fn master(&self) -> &M {
        &self.master
    }

    pub fn master_mut(&mut self) -> &mut M {
        &mut self.master
    }

    pub fn slave(&self) -> &S {
        &self.slave
    }

    pub fn slave_mut(&mut self) -> &mut S {
        &mut self.slave
    }

    pub fn equalizer(&self) -> &Equalizer<C> {
        &self.equalizer
    }

    pub fn equalizer_mut(&mut self) -> &mut Equalizer<C> {
        &mut self.equalizer
    }

    /// Dissolves the pair
    pub fn into_parts(self) -> (M, S, Equalizer<C>) {
        (self.master, self.slave, self.equalizer)
    }
}

impl<M: FeedbackLoop, S: FeedbackLoop, C: Clock> Periodic for MasterSlave<M, S, C> {
    type Clock = C;

    fn run_continuous(&mut self) -> Convergence {
        MasterSlave::run_continuous(self)
    }

    fn period(&self) -> Duration {
        self.equalizer.config().period()
    }

    fn clock(&self) -> &C {
        self.equalizer.clock()
    }
}
