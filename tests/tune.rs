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

mod fixtures;

use std::time::Duration;

use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use discrete_fbc::error::{ConfigError, TuneError};
use discrete_fbc::pid::Gains;
use discrete_fbc::tune::{
    AutotuneConfigBuilder, Bounds, Deadband, GainBounds, Readout, Swarm, TuneReport,
    MAX_PARTICLES,
};

const SEED: u64 = 7;

fn make_bounds() -> GainBounds {
    GainBounds::new(
        Bounds::new(0.0, 10.0),
        Bounds::new(0.0, 1.0),
        Bounds::new(-1.0, 1.0),
    )
}

mod test_swarm {
    use super::*;

    #[test]
    fn test_particle_count_is_capped() {
        let mut rng = StdRng::seed_from_u64(SEED);
        for count in [0, MAX_PARTICLES + 1] {
            assert_eq!(
                Swarm::new(make_bounds(), count, &mut rng).err(),
                Some(ConfigError::InvalidParticleCount)
            );
        }

        let swarm = Swarm::new(make_bounds(), MAX_PARTICLES, &mut rng).unwrap();
        assert_eq!(swarm.len(), MAX_PARTICLES);
    }

    #[test]
    fn test_bounds_are_validated() {
        let mut rng = StdRng::seed_from_u64(SEED);
        let inverted = GainBounds::new(
            Bounds::new(1.0, 0.0),
            Bounds::new(0.0, 1.0),
            Bounds::new(0.0, 1.0),
        );
        assert_eq!(
            Swarm::new(inverted, 4, &mut rng).err(),
            Some(ConfigError::InvalidBounds)
        );

        let not_finite = GainBounds::new(
            Bounds::new(0.0, 1.0),
            Bounds::new(0.0, f64::NAN),
            Bounds::new(0.0, 1.0),
        );
        assert_eq!(
            Swarm::new(not_finite, 4, &mut rng).err(),
            Some(ConfigError::InvalidBounds)
        );
    }

    /// Particles are scattered uniformly, drawing kP, kI, then kD for each particle in turn
    #[test]
    fn test_initial_scatter() {
        let mut rng = StdRng::seed_from_u64(SEED);
        let mut replay = StdRng::seed_from_u64(SEED);
        let swarm = Swarm::new(make_bounds(), 4, &mut rng).unwrap();

        for particle in swarm.particles() {
            let kp = 10.0 * replay.random::<f64>();
            let ki = replay.random::<f64>();
            let kd = -1.0 + 2.0 * replay.random::<f64>();

            assert_relative_eq!(particle.kp.position, kp, epsilon = 1e-12);
            assert_relative_eq!(particle.ki.position, ki, epsilon = 1e-12);
            assert_relative_eq!(particle.kd.position, kd, epsilon = 1e-12);

            assert_relative_eq!(particle.kp.velocity, kp / 5.0, epsilon = 1e-12);
            assert_eq!(particle.best(), particle.position());
            assert!(particle.best_fitness.is_infinite());
        }
        assert!(swarm.global_best_fitness().is_infinite());
    }

    #[test]
    fn test_record_tracks_personal_and_global_best() {
        let mut rng = StdRng::seed_from_u64(SEED);
        let mut swarm = Swarm::new(make_bounds(), 3, &mut rng).unwrap();

        assert!(swarm.record(0, 10.0));
        assert_eq!(swarm.global_best(), swarm.particles()[0].position());

        // A personal best that does not beat the swarm
        assert!(!swarm.record(1, 20.0));
        assert_eq!(swarm.particles()[1].best_fitness, 20.0);
        assert_eq!(swarm.global_best_fitness(), 10.0);

        assert!(swarm.record(1, 5.0));
        assert_eq!(swarm.global_best(), swarm.particles()[1].position());

        // Worse than its own best: nothing changes
        assert!(!swarm.record(0, 50.0));
        assert_eq!(swarm.particles()[0].best_fitness, 10.0);

        // No such particle
        assert!(!swarm.record(3, 0.0));
        assert_eq!(swarm.global_best_fitness(), 5.0);
    }

    /// With one particle its own best and the swarm's best coincide with its position, so only
    /// inertia acts: v = 0.5 · p/5 and p' = p + 5v = 1.5p, whatever the random draws.
    #[test]
    fn test_single_particle_step_is_deterministic() {
        let bounds = GainBounds::new(
            Bounds::new(0.0, 10.0),
            Bounds::new(0.0, 10.0),
            Bounds::new(0.0, 10.0),
        );
        let mut rng = StdRng::seed_from_u64(SEED);
        let mut swarm = Swarm::new(bounds, 1, &mut rng).unwrap();
        let start = swarm.particles()[0];

        swarm.record(0, 1.0);
        swarm.advance(&mut rng);

        let moved = swarm.particles()[0];
        for (before, after) in [
            (start.kp, moved.kp),
            (start.ki, moved.ki),
            (start.kd, moved.kd),
        ] {
            assert_relative_eq!(after.velocity, before.position / 10.0, epsilon = 1e-12);
            assert_relative_eq!(
                after.position,
                (1.5 * before.position).min(10.0),
                epsilon = 1e-12
            );
            assert_eq!(after.best, before.position);
        }
    }

    #[test]
    fn test_positions_stay_within_bounds() {
        let bounds = make_bounds();
        let mut rng = StdRng::seed_from_u64(SEED);
        let mut swarm = Swarm::new(bounds, 8, &mut rng).unwrap();

        for _ in 0..50 {
            for index in 0..swarm.len() {
                let fitness = rng.random::<f64>() * 100.0;
                swarm.record(index, fitness);
            }
            swarm.advance(&mut rng);

            for particle in swarm.particles() {
                assert!((0.0..=10.0).contains(&particle.kp.position));
                assert!((0.0..=1.0).contains(&particle.ki.position));
                assert!((-1.0..=1.0).contains(&particle.kd.position));
            }
        }
    }
}

mod test_autotune_config {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AutotuneConfigBuilder::new(300, make_bounds()).build().unwrap();
        assert_eq!(config.goal(), 300);
        assert_eq!(config.iterations(), 5);
        assert_eq!(config.particles(), 16);
        assert_eq!(config.k_settle(), 1.0);
        assert_eq!(config.k_itae(), 2.0);
        assert_eq!(config.settle_pause(), Duration::from_secs(1));
        assert_eq!(config.trial_timeout(), Duration::from_secs(5));

        assert_eq!(config.fitness(100.0, 3.0), 106.0);
    }

    #[test]
    fn test_validation() {
        let builder = AutotuneConfigBuilder::new(300, make_bounds());
        assert_eq!(
            builder.particles(0).build(),
            Err(ConfigError::InvalidParticleCount)
        );
        assert_eq!(
            builder.particles(MAX_PARTICLES + 1).build(),
            Err(ConfigError::InvalidParticleCount)
        );
        assert_eq!(
            builder.iterations(0).build(),
            Err(ConfigError::InvalidIterationCount)
        );
        assert_eq!(
            builder.weights(f64::NAN, 1.0).build(),
            Err(ConfigError::InvalidGain)
        );

        let inverted = GainBounds::new(
            Bounds::new(0.0, 1.0),
            Bounds::new(0.0, 1.0),
            Bounds::new(1.0, -1.0),
        );
        assert_eq!(
            AutotuneConfigBuilder::new(300, inverted).build(),
            Err(ConfigError::InvalidBounds)
        );
    }
}

#[derive(Debug, Default)]
struct Display {
    gains: Option<Gains>,
    deadband: Option<Deadband>,
}

impl Readout for Display {
    fn show_gains(&mut self, gains: &Gains) {
        self.gains = Some(*gains);
    }

    fn show_deadband(&mut self, deadband: &Deadband) {
        self.deadband = Some(*deadband);
    }
}

mod test_autotune {
    use super::fixtures::test_fbc::{make_controller, Integrator};
    use super::*;

    use std::cell::RefCell;
    use std::rc::Rc;

    use discrete_fbc::bangbang::BangBang;
    use discrete_fbc::controller::{Actuator, Controller, ControllerConfig};
    use discrete_fbc::pid::Pid;
    use discrete_fbc::time::ManualClock;
    use discrete_fbc::tune::autotune;

    #[test]
    fn test_requires_pid_law() {
        let clock = ManualClock::default();
        let (mut controller, _, commands) = make_controller(
            &clock,
            ControllerConfig::default(),
            BangBang::new(1.0, 127).unwrap(),
        );
        let config = AutotuneConfigBuilder::new(300, make_bounds()).build().unwrap();
        let mut rng = StdRng::seed_from_u64(SEED);

        assert_eq!(
            autotune(&mut controller, &config, &mut rng, None).err(),
            Some(TuneError::NotPid)
        );
        assert_eq!(commands.len(), 0);
        assert_eq!(controller.config().confidence(), 5);
    }

    #[test]
    fn test_search_installs_best_gains() {
        let clock = ManualClock::default();
        let plant = Integrator::default();
        let log = Rc::new(RefCell::new(Vec::new()));

        let actuator = {
            let mut plant = plant.clone();
            let log = Rc::clone(&log);
            move |output: i32| {
                log.borrow_mut().push(output);
                plant.drive(output);
            }
        };
        let mut controller = Controller::new(
            ControllerConfig::default(),
            Pid::default(),
            actuator,
            plant.clone(),
            &clock,
        );

        let bounds = GainBounds::new(
            Bounds::new(0.2, 1.0),
            Bounds::new(0.0, 0.0),
            Bounds::new(0.0, 0.0),
        );
        let config = AutotuneConfigBuilder::new(300, bounds)
            .particles(3)
            .iterations(2)
            .trial_timeout(Duration::from_secs(2))
            .settle_pause(Duration::from_millis(100))
            .build()
            .unwrap();
        let mut rng = StdRng::seed_from_u64(SEED);
        let mut display = Display::default();

        let report = autotune(
            &mut controller,
            &config,
            &mut rng,
            Some(&mut display as &mut dyn Readout),
        )
        .unwrap();

        assert_eq!(report.trials, 6);
        assert!((0.2..=1.0).contains(&report.gains.kp));
        assert_eq!(report.gains.ki, 0.0);
        assert_eq!(report.gains.kd, 0.0);
        assert!(report.fitness.is_finite());

        let pid = controller.law().as_pid().unwrap();
        assert_eq!(pid.config().gains(), report.gains);
        assert_eq!(display.gains, Some(report.gains));

        // Search-time settings are undone and the mechanism is left stopped
        assert_eq!(controller.config().confidence(), 5);
        assert_eq!(log.borrow().last(), Some(&0));

        // Every trial is followed by a stop
        assert!(log.borrow().iter().filter(|output| **output == 0).count() >= 6);
    }

    /// Tunes a friction-bound integrator over a search space pinned to a single kP, returning
    /// the report and every command issued
    fn tune_pinned(
        kp: f64,
        friction: i32,
        config: AutotuneConfigBuilder,
    ) -> (TuneReport, Vec<i32>) {
        let clock = ManualClock::default();
        let plant = Integrator::with_friction(friction);
        let log = Rc::new(RefCell::new(Vec::new()));

        let actuator = {
            let mut plant = plant.clone();
            let log = Rc::clone(&log);
            move |output: i32| {
                log.borrow_mut().push(output);
                plant.drive(output);
            }
        };
        let mut controller = Controller::new(
            ControllerConfig::default(),
            Pid::default(),
            actuator,
            plant,
            &clock,
        );

        let bounds = GainBounds::new(
            Bounds::new(kp, kp),
            Bounds::new(0.0, 0.0),
            Bounds::new(0.0, 0.0),
        );
        let config = config.bounds(bounds).build().unwrap();
        let mut rng = StdRng::seed_from_u64(SEED);
        let report = autotune(&mut controller, &config, &mut rng, None).unwrap();
        let commands = log.borrow().clone();
        (report, commands)
    }

    fn single_trial(goal: i32) -> AutotuneConfigBuilder {
        AutotuneConfigBuilder::new(goal, make_bounds())
            .particles(1)
            .iterations(1)
    }

    /// kP = 0.5 on a frictionless integrator toward 300 sees the errors
    /// 300, 150, 75, 38, 19, 10, 5, 3, 2, then 1 for good. Errors below 10 start on the 7th
    /// step, so the doubled window of 10 is full after step 16: 320 ms.
    /// ITAE = 20 · Σ step·error / 10000, where the sum is
    /// 300 + 2·150 + 3·75 + 4·38 + 5·19 + 6·10 + 7·5 + 8·3 + 9·2 + (10 + ... + 16) = 1300
    #[test]
    fn test_fitness_weighs_settle_time_and_itae() {
        let (report, _) = tune_pinned(0.5, 0, single_trial(300).weights(1.0, 0.0));
        assert_relative_eq!(report.fitness, 320.0, epsilon = 1e-9);

        let (report, _) = tune_pinned(0.5, 0, single_trial(300).weights(0.0, 1.0));
        assert_relative_eq!(report.fitness, 2.6, epsilon = 1e-9);

        let (report, _) = tune_pinned(0.5, 0, single_trial(300));
        assert_relative_eq!(report.fitness, 320.0 + 2.0 * 2.6, epsilon = 1e-9);
        assert_eq!(report.trials, 1);
    }

    /// With kP = 1 the integrator lands on the goal in one step, then has to hold it for the
    /// doubled confidence window of 10 steps before the trial ends. Goals alternate in sign from
    /// one particle to the next, restarting positive on every iteration.
    #[test]
    fn test_trials_alternate_goal_sign_with_doubled_window() {
        let config = single_trial(300).particles(2).iterations(2);
        let (report, commands) = tune_pinned(1.0, 0, config);
        assert_eq!(report.trials, 4);

        // Each trial: the move, 10 holding steps and the stop. Then the final stop.
        assert_eq!(commands.len(), 4 * 12 + 1);
        let moves: Vec<i32> = commands.chunks(12).map(|trial| trial[0]).collect();
        // 0 -> 300 -> -300, then 300 again from -300 and back
        assert_eq!(moves, vec![300, -600, 600, -600, 0]);
        for trial in commands.chunks(12).take(4) {
            assert!(trial[1..].iter().all(|output| *output == 0));
        }

        // Settle time 11 steps, ITAE from the move only
        assert_relative_eq!(report.fitness, 220.0 + 2.0 * 0.6, epsilon = 1e-9);
    }

    /// A kP too weak to overcome friction stalls after the doubled window and is charged as if
    /// stuck at 300 counts of error until the 1s timeout:
    /// 1020 ms + 2 · 20 · 300 · (1 + ... + 50) / 10000 = 1020 + 2 · 765
    #[test]
    fn test_stalled_trial_scores_worse_than_moving_one() {
        let config = single_trial(300).trial_timeout(Duration::from_secs(1));

        let (stalled, commands) = tune_pinned(0.05, 20, config);
        assert_relative_eq!(stalled.fitness, 1020.0 + 2.0 * 765.0, epsilon = 1e-9);
        // 11 stuck steps at 15, then the stops
        assert_eq!(commands.len(), 11 + 2);
        assert!(commands[..11].iter().all(|output| *output == 15));

        // 300 -> 150 -> 225 -> 262, then stuck at 262 until the stall
        let (moving, _) = tune_pinned(0.5, 20, config);
        assert!(
            moving.fitness < stalled.fitness,
            "{} vs {}",
            moving.fitness,
            stalled.fitness
        );
    }
}

mod test_find_deadband {
    use super::fixtures::test_fbc::make_integrator_controller;
    use super::*;

    use discrete_fbc::controller::ControllerConfig;
    use discrete_fbc::pid::Pid;
    use discrete_fbc::time::{Clock, ManualClock, Micros};
    use discrete_fbc::tune::find_deadband;

    #[test]
    fn test_finds_first_moving_command() {
        let clock = ManualClock::default();
        let (mut controller, _) =
            make_integrator_controller(&clock, ControllerConfig::default(), Pid::default(), 15);
        let mut display = Display::default();

        let deadband = find_deadband(&mut controller, 2, Some(&mut display as &mut dyn Readout));
        assert_eq!(deadband, Deadband { neg: -16, pos: 16 });
        assert_eq!(display.deadband, Some(deadband));

        // 17 probes per direction at 500ms each, with a 2s rest in between
        assert_eq!(clock.now(), Micros(19_000_000));

        let mut config = ControllerConfig::default();
        assert!(deadband.apply(&mut config).is_ok());
        assert_eq!(config.deadbands(), (-16, 16));
    }

    #[test]
    fn test_reports_zero_when_nothing_moves() {
        let clock = ManualClock::default();
        let (mut controller, plant) =
            make_integrator_controller(&clock, ControllerConfig::default(), Pid::default(), 200);

        let deadband = find_deadband(&mut controller, 2, None);
        assert_eq!(deadband, Deadband::default());
        assert_eq!(plant.position(), 0);
        assert_eq!(clock.now(), Micros(130_000_000));
    }
}
