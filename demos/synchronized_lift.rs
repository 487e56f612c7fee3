//! Two unequal motors raising one platform, kept level by a master-slave equalizer.
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

    use discrete_fbc::controller::{Controller, ControllerConfigBuilder, Convergence};
    use discrete_fbc::master_slave::MasterSlave;
    use discrete_fbc::pid::{Gains, Pid, PidConfigBuilder};
    use discrete_fbc::sim::{MotorParams, MotorPlant};
    use discrete_fbc::time::{Clock, InstantLike, ManualClock};

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let clock = ManualClock::default();
    let left = MotorPlant::new(MotorParams::default(), &clock);
    // A worn gearbox on the right side
    let right = MotorPlant::new(
        MotorParams {
            speed_gain: 7.5,
            static_friction: 20,
            ..MotorParams::default()
        },
        &clock,
    );

    let config = ControllerConfigBuilder::default()
        .deadbands(-21, 21)
        .build()
        .unwrap();
    let pid = PidConfigBuilder::default().kp(0.25).build().unwrap();
    let master = Controller::new(config, Pid::new(pid), left.handle(), left.handle(), &clock);
    let slave = Controller::new(config, Pid::new(pid), right.handle(), right.handle(), &clock);

    // The equalizer reads master - slave, so it needs a negative gain to pull the sides together
    let mut lift = MasterSlave::with_equalizer_pid(
        master,
        slave,
        Gains::new(-1.0, -0.01, 0.0),
        (-500, 500),
        &clock,
    )
    .unwrap();

    lift.set_goal(800, false);
    let start = clock.now();
    let mut next = start;
    let mut worst: f64 = 0.0;
    loop {
        let convergence = lift.run_continuous();
        let spread = left.position() - right.position();
        worst = worst.max(spread.abs());

        let elapsed = clock.now().duration_since(start);
        if elapsed.as_millis() % 200 == 0 {
            println!(
                "t = {:>4} ms  left {:>6.1}  right {:>6.1}  spread {:>5.1}",
                elapsed.as_millis(),
                left.position(),
                right.position(),
                spread
            );
        }
        if convergence != Convergence::Running || elapsed > Duration::from_secs(10) {
            println!("{:?} after {} ms", convergence, elapsed.as_millis());
            break;
        }
        next = next + Duration::from_millis(20);
        clock.delay_until(next);
    }
    println!("Worst spread while raising: {:.1} counts", worst);

    // Lower the platform open-loop, still level
    lift.set_goal(-60, true);
    for _ in 0..50 {
        lift.run_continuous();
        next = next + Duration::from_millis(20);
        clock.delay_until(next);
    }
    println!(
        "After lowering by hand: left {:.1}, right {:.1}",
        left.position(),
        right.position()
    );
}

#[cfg(not(feature = "simulation"))]
fn main() {
    eprintln!("This example requires `--features simulation` to run.");
}
