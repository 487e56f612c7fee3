// The generic feedback controller: goal tracking, deadband clamping and convergence detection
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

use log::{debug, trace, warn};

use crate::error::ConfigError;
use crate::law::{ControlLaw, Law, LawContext};
use crate::stall::{MotionStallDetector, NoStallDetect, StallDetect, StallProbe};
use crate::time::{Clock, InstantLike};

/// The default period of every blocking or background control loop.
pub const DEFAULT_LOOP_PERIOD: Duration = Duration::from_millis(20);

/// Applies a signed command to the plant, e.g. a motor driver. Fire-and-forget: limits and slew
/// are the driver's business.
pub trait Actuator {
    /// Commands `output`
    fn drive(&mut self, output: i32);
}

impl<F: FnMut(i32)> Actuator for F {
    fn drive(&mut self, output: i32) {
        self(output)
    }
}

/// Discards every command. Used by controllers whose output is consumed by another controller.
impl Actuator for () {
    fn drive(&mut self, _output: i32) {}
}

/// Reads the scalar state of the plant, e.g. an encoder count.
pub trait Sensor {
    /// Samples the sensor
    fn sense(&mut self) -> i32;

    /// Returns the sensor to its zero, e.g. clears an encoder. Does nothing by default.
    fn reset(&mut self) {}
}

impl<F: FnMut() -> i32> Sensor for F {
    fn sense(&mut self) -> i32 {
        self()
    }
}

/// A sensor assembled from a sampling closure and a reset closure.
#[derive(Clone, Debug)]
pub struct ResettableSensor<F, R> {
    sense: F,
    reset: R,
}

impl<F: FnMut() -> i32, R: FnMut()> ResettableSensor<F, R> {
    pub fn new(sense: F, reset: R) -> Self {
        Self { sense, reset }
    }
}

impl<F: FnMut() -> i32, R: FnMut()> Sensor for ResettableSensor<F, R> {
    fn sense(&mut self) -> i32 {
        (self.sense)()
    }

    fn reset(&mut self) {
        (self.reset)()
    }
}

/// The tri-state outcome of a control loop.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Convergence {
    /// Still working toward the goal
    Running,
    /// Within tolerance for a full confidence window
    Confident,
    /// The stall detector fired in the latest iteration; takes priority over confidence
    Stalled,
}

impl Convergence {
    /// Whether a blocking loop should stop
    pub fn is_settled(&self) -> bool {
        *self != Convergence::Running
    }
}

/// Acceptance criteria and deadbands of a [`Controller`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ControllerConfig {
    /// The non-zero command closest to zero that still moves the plant in the negative direction.
    /// Defaults to 0.
    neg_deadband: i32,

    /// The non-zero command closest to zero that still moves the plant in the positive direction.
    /// Defaults to 0.
    pos_deadband: i32,

    /// Errors strictly below this magnitude count as on target.
    /// Defaults to 10.
    tolerance: u32,

    /// Number of consecutive on-target iterations required to be confident.
    /// Defaults to 5.
    confidence: u32,

    /// Period of the blocking and background loops.
    /// Defaults to 20ms.
    period: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            neg_deadband: 0,
            pos_deadband: 0,
            tolerance: 10,
            confidence: 5,
            period: DEFAULT_LOOP_PERIOD,
        }
    }
}

impl ControllerConfig {
    pub fn neg_deadband(&self) -> i32 {
        self.neg_deadband
    }

    pub fn pos_deadband(&self) -> i32 {
        self.pos_deadband
    }

    pub fn deadbands(&self) -> (i32, i32) {
        (self.neg_deadband, self.pos_deadband)
    }

    pub fn tolerance(&self) -> u32 {
        self.tolerance
    }

    pub fn confidence(&self) -> u32 {
        self.confidence
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Sets both deadbands.
    ///
    /// # Returns
    /// - `Ok(())` if the deadbands were set successfully.
    /// - `Err(ConfigError::InvalidDeadband)` unless `neg_deadband <= 0 <= pos_deadband`.
    pub fn set_deadbands(&mut self, neg_deadband: i32, pos_deadband: i32) -> Result<(), ConfigError> {
        if neg_deadband > 0 || pos_deadband < 0 {
            return Err(ConfigError::InvalidDeadband);
        }
        self.neg_deadband = neg_deadband;
        self.pos_deadband = pos_deadband;
        Ok(())
    }

    pub fn set_tolerance(&mut self, tolerance: u32) {
        self.tolerance = tolerance;
    }

    pub fn set_confidence(&mut self, confidence: u32) {
        self.confidence = confidence;
    }

    /// Sets the loop period; a zero period is rejected with `ConfigError::InvalidPeriod`.
    pub fn set_period(&mut self, period: Duration) -> Result<(), ConfigError> {
        if period.is_zero() {
            return Err(ConfigError::InvalidPeriod);
        }
        self.period = period;
        Ok(())
    }
}

/// Builder for [`ControllerConfig`], validating everything in `build`.
#[derive(Copy, Clone, Debug, Default)]
pub struct ControllerConfigBuilder {
    config: ControllerConfig,
}

impl ControllerConfigBuilder {
    pub fn deadbands(mut self, neg_deadband: i32, pos_deadband: i32) -> Self {
        self.config.neg_deadband = neg_deadband;
        self.config.pos_deadband = pos_deadband;
        self
    }

    pub fn tolerance(mut self, tolerance: u32) -> Self {
        self.config.tolerance = tolerance;
        self
    }

    pub fn confidence(mut self, confidence: u32) -> Self {
        self.config.confidence = confidence;
        self
    }

    pub fn period(mut self, period: Duration) -> Self {
        self.config.period = period;
        self
    }

    pub fn build(self) -> Result<ControllerConfig, ConfigError> {
        let mut config = ControllerConfig::default();
        config.set_deadbands(self.config.neg_deadband, self.config.pos_deadband)?;
        config.set_tolerance(self.config.tolerance);
        config.set_confidence(self.config.confidence);
        config.set_period(self.config.period)?;
        Ok(config)
    }
}

/// Something that can be driven one iteration at a time on a fixed period.
pub trait Periodic {
    /// The clock pacing the loop
    type Clock: Clock;

    /// One iteration: compute, actuate, report
    fn run_continuous(&mut self) -> Convergence;

    /// The loop period
    fn period(&self) -> Duration;

    fn clock(&self) -> &Self::Clock;

    /// Iterates every period until the loop is confident or stalled, or until `timeout` has
    /// elapsed. A zero timeout never expires.
    ///
    /// Returns `true` if the loop timed out. The last command is left applied in that case.
    fn run_to_completion(&mut self, timeout: Duration) -> bool {
        let start = self.clock().now();
        let mut next = start;
        loop {
            if self.run_continuous().is_settled() {
                return false;
            }
            if !timeout.is_zero() && self.clock().now().duration_since(start) >= timeout {
                warn!("Control loop timed out after {:?}", timeout);
                return true;
            }
            next = next + self.period();
            self.clock().delay_until(next);
        }
    }
}

/// A closed-loop feedback controller for one actuator/sensor pair.
///
/// Each iteration samples the sensor once, evaluates the attached [`Law`] on
/// `error = goal - reading`, snaps sub-deadband commands to the deadband, then updates the
/// confidence counter and the stall detector, in that order.
pub struct Controller<A, S, C: Clock, D = MotionStallDetector> {
    actuator: A,
    sensor: S,
    clock: C,
    law: Law,
    stall_detector: D,
    config: ControllerConfig,

    goal: i32,
    output: i32,
    confidence_count: u32,
    stalled: bool,
    prev_sense: i32,
    prev_execution: Option<C::Instant>,
}

impl<A: Actuator, S: Sensor, C: Clock> Controller<A, S, C, MotionStallDetector> {
    /// Creates a controller with a zero goal and the default stall detector.
    pub fn new(config: ControllerConfig, law: impl Into<Law>, actuator: A, sensor: S, clock: C) -> Self {
        let mut controller = Self {
            actuator,
            sensor,
            clock,
            law: law.into(),
            stall_detector: MotionStallDetector::default(),
            config,
            goal: 0,
            output: 0,
            confidence_count: 0,
            stalled: false,
            prev_sense: 0,
            prev_execution: None,
        };
        controller.reset();
        controller
    }
}

impl<A: Actuator, S: Sensor, C: Clock, D: StallDetect> Controller<A, S, C, D> {
    /// Replaces the stall detector
    pub fn with_stall_detector<D2: StallDetect>(self, stall_detector: D2) -> Controller<A, S, C, D2> {
        Controller {
            actuator: self.actuator,
            sensor: self.sensor,
            clock: self.clock,
            law: self.law,
            stall_detector,
            config: self.config,
            goal: self.goal,
            output: self.output,
            confidence_count: self.confidence_count,
            stalled: false,
            prev_sense: self.prev_sense,
            prev_execution: self.prev_execution,
        }
    }

    /// Removes stall detection; the controller never reports [`Convergence::Stalled`]
    pub fn without_stall_detection(self) -> Controller<A, S, C, NoStallDetect> {
        self.with_stall_detector(NoStallDetect)
    }

    /// Resets the sensor, the law's accumulators, the confidence counter and the stall state, and
    /// zeroes the goal.
    pub fn reset(&mut self) {
        self.confidence_count = 0;
        self.stalled = false;
        self.sensor.reset();
        self.law.reset();
        self.stall_detector.reset();
        self.goal = 0;
    }

    /// Adopts a new goal, starting a fresh goal epoch: everything [`reset`](Self::reset) clears
    /// is cleared, and the iteration clock is restarted.
    pub fn set_goal(&mut self, goal: i32) {
        self.reset();
        self.goal = goal;
        self.prev_execution = Some(self.clock.now());
        debug!("New goal {}", goal);
    }

    /// Runs one iteration against a fresh sensor sample and returns the command, without
    /// actuating.
    pub fn generate_output(&mut self) -> i32 {
        let reading = self.sensor.sense();
        self.generate_output_from(reading)
    }

    /// Runs one iteration against a reading supplied by the caller instead of the sensor.
    pub fn generate_output_from(&mut self, reading: i32) -> i32 {
        let error = self.goal.saturating_sub(reading);

        let now = self.clock.now();
        let elapsed = self.prev_execution.map(|prev| now.duration_since(prev));
        let ctx = LawContext::new(self.goal, elapsed);

        let raw = self.law.compute(&ctx, error);
        let output = self.clamp_to_deadband(raw);

        if error.unsigned_abs() < self.config.tolerance {
            self.confidence_count = self.confidence_count.saturating_add(1);
        } else {
            self.confidence_count = 0;
        }

        let mut probe = StallProbe::new(
            output,
            self.config.deadbands(),
            self.config.tolerance,
            self.config.confidence,
            reading,
            &mut self.prev_sense,
        );
        self.stalled = self.stall_detector.detect(&mut probe);

        self.prev_sense = reading;
        self.prev_execution = Some(now);
        self.output = output;

        trace!(
            "goal {} reading {} error {} raw {} output {} confidence {}",
            self.goal,
            reading,
            error,
            raw,
            output,
            self.confidence_count
        );
        output
    }

    /// Commands that move the plant no faster than the deadband are raised to the deadband; an
    /// exact zero is left alone.
    fn clamp_to_deadband(&self, raw: i32) -> i32 {
        if raw > 0 && raw < self.config.pos_deadband {
            self.config.pos_deadband
        } else if raw < 0 && raw > self.config.neg_deadband {
            self.config.neg_deadband
        } else {
            raw
        }
    }

    /// Running, confident or stalled, as of the latest iteration
    pub fn convergence(&self) -> Convergence {
        if self.stall_detector.is_attached() && self.stalled {
            Convergence::Stalled
        } else if self.confidence_count >= self.config.confidence {
            Convergence::Confident
        } else {
            Convergence::Running
        }
    }

    /// One iteration followed by actuation
    pub fn run_continuous(&mut self) -> Convergence {
        let output = self.generate_output();
        self.actuator.drive(output);
        self.convergence()
    }

    /// See [`Periodic::run_to_completion`]
    pub fn run_to_completion(&mut self, timeout: Duration) -> bool {
        <Self as Periodic>::run_to_completion(self, timeout)
    }

    /// Commands the actuator directly, bypassing the control law
    pub fn drive(&mut self, output: i32) {
        self.actuator.drive(output);
    }

    /// Samples the sensor outside of an iteration
    pub fn sense(&mut self) -> i32 {
        self.sensor.sense()
    }

    pub fn goal(&self) -> i32 {
        self.goal
    }

    /// The command produced by the latest iteration
    pub fn output(&self) -> i32 {
        self.output
    }

    pub fn confidence_count(&self) -> u32 {
        self.confidence_count
    }

    pub fn is_stalled(&self) -> bool {
        self.stalled
    }

    /// The sensor reading of the latest iteration
    pub fn prev_sense(&self) -> i32 {
        self.prev_sense
    }

    pub fn law(&self) -> &Law {
        &self.law
    }

    pub fn law_mut(&mut self) -> &mut Law {
        &mut self.law
    }

    /// Attaches a different control law. Goal, confidence and stall state are kept.
    pub fn set_law(&mut self, law: impl Into<Law>) {
        self.law = law.into();
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ControllerConfig {
        &mut self.config
    }

    pub fn stall_detector(&self) -> &D {
        &self.stall_detector
    }

    pub fn actuator_mut(&mut self) -> &mut A {
        &mut self.actuator
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}

impl<A: Actuator, S: Sensor, C: Clock, D: StallDetect> Periodic for Controller<A, S, C, D> {
    type Clock = C;

    fn run_continuous(&mut self) -> Convergence {
        Controller::run_continuous(self)
    }

    fn period(&self) -> Duration {
        self.config.period
    }

    fn clock(&self) -> &C {
        &self.clock
    }
}

/// The operations a composite needs from each of the loops it coordinates.
pub trait FeedbackLoop {
    /// One iteration without actuation
    fn generate_output(&mut self) -> i32;

    /// Samples the sensor outside of an iteration
    fn sense(&mut self) -> i32;

    /// Commands the actuator
    fn drive(&mut self, output: i32);

    fn convergence(&self) -> Convergence;

    fn set_goal(&mut self, goal: i32);

    fn reset(&mut self);
}

impl<A: Actuator, S: Sensor, C: Clock, D: StallDetect> FeedbackLoop for Controller<A, S, C, D> {
    fn generate_output(&mut self) -> i32 {
        Controller::generate_output(self)
    }

    fn sense(&mut self) -> i32 {
        Controller::sense(self)
    }

    fn drive(&mut self, output: i32) {
        Controller::drive(self, output)
    }

    fn convergence(&self) -> Convergence {
        Controller::convergence(self)
    }

    fn set_goal(&mut self, goal: i32) {
        Controller::set_goal(self, goal)
    }

    fn reset(&mut self) {
        Controller::reset(self)
    }
}

/// Sets the goal of a controller that may be absent.
///
/// Returns `false`, without doing anything else, if there is no controller.
pub fn try_set_goal<A, S, C, D>(controller: Option<&mut Controller<A, S, C, D>>, goal: i32) -> bool
where
    A: Actuator,
    S: Sensor,
    C: Clock,
    D: StallDetect,
{
    match controller {
        Some(controller) => {
            controller.set_goal(goal);
            true
        }
        None => {
            debug!("Ignoring goal {} for an absent controller", goal);
            false
        }
    }
}
