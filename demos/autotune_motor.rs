//! Finds the deadband of a simulated motor, autotunes its PID gains, then replays a few moves.
//! This example requires the `--features simulation` flag to be enabled.
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

#[cfg(feature = "simulation")]
pub fn main() {
    use std::time::Duration;

    use discrete_fbc::controller::{Controller, ControllerConfig};
    use discrete_fbc::pid::{Gains, Pid, PidConfigBuilder};
    use discrete_fbc::sim::{MotorParams, MotorPlant};
    use discrete_fbc::time::{Clock, InstantLike, ManualClock};
    use discrete_fbc::tune::{
        autotune, find_deadband, AutotuneConfigBuilder, Bounds, Deadband, GainBounds, Readout,
    };

    /// Stands in for the robot's two-line LCD
    struct Console;

    impl Readout for Console {
        fn show_gains(&mut self, gains: &Gains) {
            println!("P {:.4}  I {:.5}  D {:.4}", gains.kp, gains.ki, gains.kd);
        }

        fn show_deadband(&mut self, deadband: &Deadband) {
            println!("DB+ {}  DB- {}", deadband.pos, deadband.neg);
        }
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let clock = ManualClock::default();
    let plant = MotorPlant::new(MotorParams::default(), &clock);
    let pid = PidConfigBuilder::default()
        .integral_limits(-2000, 2000)
        .build()
        .unwrap();
    let mut controller = Controller::new(
        ControllerConfig::default(),
        Pid::new(pid),
        plant.handle(),
        plant.handle(),
        &clock,
    );

    let deadband = find_deadband(&mut controller, 2, Some(&mut Console as &mut dyn Readout));
    deadband.apply(controller.config_mut()).unwrap();

    let bounds = GainBounds::new(
        Bounds::new(0.1, 3.0),
        Bounds::new(0.0, 0.002),
        Bounds::new(0.0, 0.1),
    );
    let config = AutotuneConfigBuilder::new(400, bounds)
        .particles(12)
        .iterations(5)
        .build()
        .unwrap();
    let started = clock.now();
    let mut rng = rand::rng();
    let report = autotune(
        &mut controller,
        &config,
        &mut rng,
        Some(&mut Console as &mut dyn Readout),
    )
    .unwrap();
    println!(
        "{} trials in {:.0}s of simulated time, best fitness {:.1}",
        report.trials,
        clock.now().duration_since(started).as_secs_f64(),
        report.fitness
    );

    for goal in [0, 600, -250, 100] {
        let start = clock.now();
        controller.set_goal(goal);
        let timed_out = controller.run_to_completion(Duration::from_secs(5));
        println!(
            "goal {:>5}: reached {:>5} in {:>4} ms ({:?}{})",
            goal,
            plant.sense(),
            clock.now().duration_since(start).as_millis(),
            controller.convergence(),
            if timed_out { ", timed out" } else { "" }
        );
    }
}

#[cfg(not(feature = "simulation"))]
fn main() {
    eprintln!("This example requires `--features simulation` to run.");
}
