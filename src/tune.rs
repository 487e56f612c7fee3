// Empirical tuning on live hardware: PSO gain search and deadband discovery
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

//! Both routines physically move the mechanism. They take the controller by exclusive
//! reference for their whole duration, so no other loop can drive it meanwhile.

use core::time::Duration;

use log::{debug, error, info};
use rand::Rng;

use crate::controller::{Actuator, Controller, ControllerConfig, Convergence, Sensor};
use crate::error::{ConfigError, TuneError};
use crate::pid::Gains;
use crate::stall::StallDetect;
use crate::time::Clock;

/// Hard cap on the swarm size; the swarm lives in a fixed-size array.
pub const MAX_PARTICLES: usize = 30;

/// Weight of a particle's current velocity in its next velocity
pub const INERTIA: f64 = 0.5;

/// Weight of the pull toward the particle's own best position
pub const CONF_SELF: f64 = 1.1;

/// Weight of the pull toward the swarm's best position
pub const CONF_SWARM: f64 = 1.2;

/// Time-step scale of the particle kinematics
pub const INCREMENT: f64 = 5.0;

/// ITAE is accumulated as `t_ms·|error| / ITAE_DIVISOR` every loop step.
pub const ITAE_DIVISOR: f64 = 10_000.0;

/// The inclusive search range of one gain.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.min.is_finite() || !self.max.is_finite() || self.min > self.max {
            return Err(ConfigError::InvalidBounds);
        }
        Ok(())
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.min + (self.max - self.min) * rng.random::<f64>()
    }

    fn clamp(&self, value: f64) -> f64 {
        num_traits::clamp(value, self.min, self.max)
    }
}

/// Search ranges for kP, kI and kD.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GainBounds {
    pub kp: Bounds,
    pub ki: Bounds,
    pub kd: Bounds,
}

impl GainBounds {
    pub fn new(kp: Bounds, ki: Bounds, kd: Bounds) -> Self {
        Self { kp, ki, kd }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.kp.validate()?;
        self.ki.validate()?;
        self.kd.validate()
    }
}

/// Position, velocity and personal best of a particle along one gain axis.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Dimension {
    pub position: f64,
    pub velocity: f64,
    pub best: f64,
}

impl Dimension {
    fn spawn<R: Rng + ?Sized>(bounds: &Bounds, rng: &mut R) -> Self {
        let position = bounds.sample(rng);
        Self {
            position,
            velocity: position / INCREMENT,
            best: position,
        }
    }

    fn advance<R: Rng + ?Sized>(&mut self, global_best: f64, rng: &mut R) {
        self.velocity *= INERTIA;
        self.velocity += CONF_SELF * ((self.best - self.position) / INCREMENT) * rng.random::<f64>();
        self.velocity +=
            CONF_SWARM * ((global_best - self.position) / INCREMENT) * rng.random::<f64>();
        self.position += self.velocity * INCREMENT;
    }
}

/// One candidate tuning.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Particle {
    pub kp: Dimension,
    pub ki: Dimension,
    pub kd: Dimension,
    pub best_fitness: f64,
}

impl Default for Particle {
    fn default() -> Self {
        Self {
            kp: Dimension::default(),
            ki: Dimension::default(),
            kd: Dimension::default(),
            best_fitness: f64::INFINITY,
        }
    }
}

impl Particle {
    /// The gains this particle currently proposes
    pub fn position(&self) -> Gains {
        Gains::new(self.kp.position, self.ki.position, self.kd.position)
    }

    /// The best gains this particle has tried
    pub fn best(&self) -> Gains {
        Gains::new(self.kp.best, self.ki.best, self.kd.best)
    }
}

/// A particle swarm over the (kP, kI, kD) space. Lower fitness is better.
#[derive(Clone, Debug)]
pub struct Swarm {
    particles: [Particle; MAX_PARTICLES],
    len: usize,
    bounds: GainBounds,
    global_best: Gains,
    global_best_fitness: f64,
}

impl Swarm {
    /// Scatters `num_particles` particles uniformly inside `bounds`, each with a velocity of a
    /// fifth of its position and no recorded fitness.
    pub fn new<R: Rng + ?Sized>(
        bounds: GainBounds,
        num_particles: usize,
        rng: &mut R,
    ) -> Result<Self, ConfigError> {
        if num_particles == 0 || num_particles > MAX_PARTICLES {
            error!(
                "Can't have {} particles; the swarm holds 1 to {}",
                num_particles, MAX_PARTICLES
            );
            return Err(ConfigError::InvalidParticleCount);
        }
        bounds.validate()?;

        let mut particles = [Particle::default(); MAX_PARTICLES];
        for particle in particles.iter_mut().take(num_particles) {
            particle.kp = Dimension::spawn(&bounds.kp, rng);
            particle.ki = Dimension::spawn(&bounds.ki, rng);
            particle.kd = Dimension::spawn(&bounds.kd, rng);
        }

        Ok(Self {
            particles,
            len: num_particles,
            bounds,
            global_best: Gains::default(),
            global_best_fitness: f64::INFINITY,
        })
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn global_best(&self) -> Gains {
        self.global_best
    }

    pub fn global_best_fitness(&self) -> f64 {
        self.global_best_fitness
    }

    /// Records the fitness scored by particle `index` at its current position, updating the
    /// particle's and the swarm's bests. Returns `true` if this is a new swarm best.
    pub fn record(&mut self, index: usize, fitness: f64) -> bool {
        let Some(particle) = self.particles[..self.len].get_mut(index) else {
            return false;
        };
        if fitness >= particle.best_fitness {
            return false;
        }

        particle.kp.best = particle.kp.position;
        particle.ki.best = particle.ki.position;
        particle.kd.best = particle.kd.position;
        particle.best_fitness = fitness;

        if fitness < self.global_best_fitness {
            self.global_best = particle.position();
            self.global_best_fitness = fitness;
            return true;
        }
        false
    }

    /// Moves every particle once: inertia plus randomly weighted pulls toward its own best and
    /// the swarm's best, then clamps the position back into the bounds.
    pub fn advance<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let global = self.global_best;
        let bounds = self.bounds;
        for particle in self.particles[..self.len].iter_mut() {
            particle.kp.advance(global.kp, rng);
            particle.ki.advance(global.ki, rng);
            particle.kd.advance(global.kd, rng);

            particle.kp.position = bounds.kp.clamp(particle.kp.position);
            particle.ki.position = bounds.ki.clamp(particle.ki.position);
            particle.kd.position = bounds.kd.clamp(particle.kd.position);
        }
    }
}

/// Parameters of an autotuning run.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AutotuneConfig {
    /// Trial goal; successive trials alternate between `goal` and `-goal`
    goal: i32,
    bounds: GainBounds,

    /// Defaults to 5
    iterations: usize,

    /// Defaults to 16
    particles: usize,

    /// Trials not settled by then are cut short. Defaults to 5s.
    trial_timeout: Duration,

    /// Weight of the settle time in milliseconds. Defaults to 1.
    k_settle: f64,

    /// Weight of the ITAE. Defaults to 2.
    k_itae: f64,

    /// Idle time between trials for the mechanism to come to rest. Defaults to 1s.
    settle_pause: Duration,
}

impl AutotuneConfig {
    pub fn goal(&self) -> i32 {
        self.goal
    }

    pub fn bounds(&self) -> &GainBounds {
        &self.bounds
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn particles(&self) -> usize {
        self.particles
    }

    pub fn trial_timeout(&self) -> Duration {
        self.trial_timeout
    }

    pub fn k_settle(&self) -> f64 {
        self.k_settle
    }

    pub fn k_itae(&self) -> f64 {
        self.k_itae
    }

    pub fn settle_pause(&self) -> Duration {
        self.settle_pause
    }

    /// Scores a trial
    pub fn fitness(&self, settle_ms: f64, itae: f64) -> f64 {
        self.k_settle * settle_ms + self.k_itae * itae
    }
}

/// Builder for [`AutotuneConfig`], validating everything in `build`.
#[derive(Copy, Clone, Debug)]
pub struct AutotuneConfigBuilder {
    config: AutotuneConfig,
}

impl AutotuneConfigBuilder {
    pub fn new(goal: i32, bounds: GainBounds) -> Self {
        Self {
            config: AutotuneConfig {
                goal,
                bounds,
                iterations: 5,
                particles: 16,
                trial_timeout: Duration::from_secs(5),
                k_settle: 1.0,
                k_itae: 2.0,
                settle_pause: Duration::from_secs(1),
            },
        }
    }

    pub fn bounds(mut self, bounds: GainBounds) -> Self {
        self.config.bounds = bounds;
        self
    }

    pub fn iterations(mut self, iterations: usize) -> Self {
        self.config.iterations = iterations;
        self
    }

    pub fn particles(mut self, particles: usize) -> Self {
        self.config.particles = particles;
        self
    }

    pub fn trial_timeout(mut self, trial_timeout: Duration) -> Self {
        self.config.trial_timeout = trial_timeout;
        self
    }

    pub fn weights(mut self, k_settle: f64, k_itae: f64) -> Self {
        self.config.k_settle = k_settle;
        self.config.k_itae = k_itae;
        self
    }

    pub fn settle_pause(mut self, settle_pause: Duration) -> Self {
        self.config.settle_pause = settle_pause;
        self
    }

    pub fn build(self) -> Result<AutotuneConfig, ConfigError> {
        let config = self.config;
        if config.particles == 0 || config.particles > MAX_PARTICLES {
            error!(
                "Can't have {} particles; the swarm holds 1 to {}",
                config.particles, MAX_PARTICLES
            );
            return Err(ConfigError::InvalidParticleCount);
        }
        if config.iterations == 0 {
            return Err(ConfigError::InvalidIterationCount);
        }
        if !config.k_settle.is_finite() || !config.k_itae.is_finite() {
            return Err(ConfigError::InvalidGain);
        }
        config.bounds.validate()?;
        Ok(config)
    }
}

/// An optional display for tuning results, e.g. a two-line character LCD.
pub trait Readout {
    fn show_gains(&mut self, _gains: &Gains) {}

    fn show_deadband(&mut self, _deadband: &Deadband) {}
}

/// The outcome of [`autotune`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TuneReport {
    /// The best gains found; already installed in the controller
    pub gains: Gains,
    /// Their fitness
    pub fitness: f64,
    /// Number of trial movements performed
    pub trials: usize,
}

/// Searches for PID gains minimizing `k_settle·settle_ms + k_itae·ITAE` by particle swarm
/// optimization, scoring every candidate with a real movement of the mechanism.
///
/// Every trial installs the candidate's gains, sets the trial goal (alternating sign from
/// particle to particle so the mechanism shuttles back and forth instead of drifting), and runs
/// the controller until it is confident, stalled or the trial timeout has elapsed. A stalled
/// trial is charged the full timeout. The actuator is then stopped for `settle_pause`. While
/// searching, the confidence window is doubled for a stricter notion of "settled"; it is
/// restored before returning.
///
/// On success the best gains are installed in the controller and reported to `readout`.
///
/// # Errors
/// - `TuneError::NotPid` if the controller does not run a [`Pid`](crate::pid::Pid) law.
/// - `TuneError::Config` if the swarm cannot be built from `config`.
pub fn autotune<A, S, C, D, R>(
    controller: &mut Controller<A, S, C, D>,
    config: &AutotuneConfig,
    rng: &mut R,
    readout: Option<&mut dyn Readout>,
) -> Result<TuneReport, TuneError>
where
    A: Actuator,
    S: Sensor,
    C: Clock,
    D: StallDetect,
    R: Rng + ?Sized,
{
    if controller.law().as_pid().is_none() {
        error!("Autotuning requires a PID control law");
        return Err(TuneError::NotPid);
    }
    let mut swarm = Swarm::new(*config.bounds(), config.particles(), rng)?;

    let confidence = controller.config().confidence();
    controller
        .config_mut()
        .set_confidence(confidence.saturating_mul(2));

    let mut trials = 0;
    for iteration in 0..config.iterations() {
        let mut invert_goal = false;
        for index in 0..swarm.len() {
            let candidate = swarm.particles()[index].position();
            install_gains(controller, candidate)?;

            controller.set_goal(if invert_goal {
                -config.goal()
            } else {
                config.goal()
            });
            invert_goal = !invert_goal;

            let (settle_ms, itae) = run_trial(controller, config.trial_timeout());
            let fitness = config.fitness(settle_ms, itae);
            trials += 1;

            if swarm.record(index, fitness) {
                info!(
                    "New best fitness {:.3} with kP {:.4} kI {:.4} kD {:.4}",
                    fitness, candidate.kp, candidate.ki, candidate.kd
                );
            }
            debug!(
                "Trial {}.{}: settle {} ms, ITAE {:.3}, fitness {:.3}, best {:.3}",
                iteration,
                index,
                settle_ms,
                itae,
                fitness,
                swarm.global_best_fitness()
            );

            controller.reset();
            controller.drive(0);
            pause(controller.clock(), config.settle_pause());
        }

        swarm.advance(rng);
        debug!("Iteration {} complete", iteration);
    }

    controller.drive(0);
    controller.config_mut().set_confidence(confidence);

    let gains = swarm.global_best();
    install_gains(controller, gains)?;
    info!(
        "Final constants: kP {:.4} kI {:.4} kD {:.4}",
        gains.kp, gains.ki, gains.kd
    );
    if let Some(readout) = readout {
        readout.show_gains(&gains);
    }

    Ok(TuneReport {
        gains,
        fitness: swarm.global_best_fitness(),
        trials,
    })
}

fn install_gains<A, S, C, D>(
    controller: &mut Controller<A, S, C, D>,
    gains: Gains,
) -> Result<(), TuneError>
where
    A: Actuator,
    S: Sensor,
    C: Clock,
    D: StallDetect,
{
    let pid = controller.law_mut().as_pid_mut().ok_or(TuneError::NotPid)?;
    pid.config_mut().set_gains(gains)?;
    Ok(())
}

/// Runs one trial movement, returning the time spent in milliseconds and the ITAE.
///
/// A trial that stalls is scored as if the mechanism had stayed stuck at its last reading until
/// the timeout, so failing to move is never cheaper than moving slowly.
fn run_trial<A, S, C, D>(controller: &mut Controller<A, S, C, D>, timeout: Duration) -> (f64, f64)
where
    A: Actuator,
    S: Sensor,
    C: Clock,
    D: StallDetect,
{
    let period = controller.config().period();
    let period_ms = period.as_secs_f64() * 1000.0;
    let timeout_ms = timeout.as_secs_f64() * 1000.0;

    let mut settle_ms = 0.0;
    let mut itae = 0.0;
    let mut next = controller.clock().now();
    loop {
        match controller.convergence() {
            Convergence::Running => {}
            Convergence::Confident => return (settle_ms, itae),
            Convergence::Stalled => break,
        }

        settle_ms += period_ms;
        if settle_ms > timeout_ms {
            return (settle_ms, itae);
        }

        itae += settle_ms * tracking_error(controller) as f64 / ITAE_DIVISOR;

        controller.run_continuous();
        next = next + period;
        controller.clock().delay_until(next);
    }

    debug!("Trial stalled after {} ms", settle_ms);
    let error = tracking_error(controller) as f64;
    loop {
        settle_ms += period_ms;
        if settle_ms > timeout_ms {
            return (settle_ms, itae);
        }
        itae += settle_ms * error / ITAE_DIVISOR;
    }
}

fn tracking_error<A, S, C, D>(controller: &mut Controller<A, S, C, D>) -> u64
where
    A: Actuator,
    S: Sensor,
    C: Clock,
    D: StallDetect,
{
    (i64::from(controller.sense()) - i64::from(controller.goal())).unsigned_abs()
}

/// The smallest commands that visibly move the mechanism in each direction.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Deadband {
    /// Zero if no negative command up to the probe limit moved the mechanism
    pub neg: i32,
    /// Zero if no positive command up to the probe limit moved the mechanism
    pub pos: i32,
}

impl Deadband {
    /// Installs these deadbands in a controller configuration
    pub fn apply(&self, config: &mut ControllerConfig) -> Result<(), ConfigError> {
        config.set_deadbands(self.neg, self.pos)
    }
}

/// Largest command magnitude tried by [`find_deadband`]
pub const DEADBAND_PROBE_LIMIT: i32 = 127;

/// How long each probe command is held
pub const DEADBAND_DWELL: Duration = Duration::from_millis(500);

/// Rest between the positive and the negative sweep
pub const DEADBAND_REST: Duration = Duration::from_secs(2);

/// Ramps the command from 0 upward, then from 0 downward, holding each value for
/// [`DEADBAND_DWELL`], until the sensor moves by more than `delta_sense` during a hold.
pub fn find_deadband<A, S, C, D>(
    controller: &mut Controller<A, S, C, D>,
    delta_sense: u32,
    readout: Option<&mut dyn Readout>,
) -> Deadband
where
    A: Actuator,
    S: Sensor,
    C: Clock,
    D: StallDetect,
{
    let pos = probe_direction(controller, delta_sense, 0..=DEADBAND_PROBE_LIMIT);
    pause(controller.clock(), DEADBAND_REST);
    let neg = probe_direction(
        controller,
        delta_sense,
        (0..=DEADBAND_PROBE_LIMIT).map(|magnitude| -magnitude),
    );

    let deadband = Deadband { neg, pos };
    info!("Deadband: positive {}, negative {}", pos, neg);
    if let Some(readout) = readout {
        readout.show_deadband(&deadband);
    }
    deadband
}

fn probe_direction<A, S, C, D>(
    controller: &mut Controller<A, S, C, D>,
    delta_sense: u32,
    outputs: impl Iterator<Item = i32>,
) -> i32
where
    A: Actuator,
    S: Sensor,
    C: Clock,
    D: StallDetect,
{
    for output in outputs {
        let before = controller.sense();
        controller.drive(output);
        pause(controller.clock(), DEADBAND_DWELL);
        controller.drive(0);
        let moved = (i64::from(controller.sense()) - i64::from(before)).unsigned_abs();
        if moved > u64::from(delta_sense) {
            return output;
        }
    }
    0
}

fn pause<C: Clock>(clock: &C, duration: Duration) {
    clock.delay_until(clock.now() + duration);
}
