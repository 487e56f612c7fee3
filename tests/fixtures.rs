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

#![allow(dead_code)]

#[cfg(test)]
pub mod test_fbc {

    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use discrete_fbc::controller::{Actuator, Controller, ControllerConfig, Sensor};
    use discrete_fbc::law::Law;
    use discrete_fbc::time::ManualClock;

    /// A sensor whose reading is dictated by the test
    #[derive(Clone, Debug, Default)]
    pub struct Reading(Rc<Cell<i32>>);

    impl Reading {
        pub fn set(&self, value: i32) {
            self.0.set(value);
        }

        pub fn get(&self) -> i32 {
            self.0.get()
        }
    }

    impl Sensor for Reading {
        fn sense(&mut self) -> i32 {
            self.0.get()
        }
    }

    /// An actuator recording every command it receives
    #[derive(Clone, Debug, Default)]
    pub struct Commands(Rc<RefCell<Vec<i32>>>);

    impl Commands {
        pub fn last(&self) -> Option<i32> {
            self.0.borrow().last().copied()
        }

        pub fn len(&self) -> usize {
            self.0.borrow().len()
        }

        pub fn all(&self) -> Vec<i32> {
            self.0.borrow().clone()
        }
    }

    impl Actuator for Commands {
        fn drive(&mut self, output: i32) {
            self.0.borrow_mut().push(output);
        }
    }

    pub type TestController<'c> = Controller<Commands, Reading, &'c ManualClock>;

    pub fn make_controller(
        clock: &ManualClock,
        config: ControllerConfig,
        law: impl Into<Law>,
    ) -> (TestController<'_>, Reading, Commands) {
        let reading = Reading::default();
        let commands = Commands::default();
        let controller = Controller::new(config, law, commands.clone(), reading.clone(), clock);
        (controller, reading, commands)
    }

    /// A plant that moves by exactly the commanded amount, but only once the command overcomes
    /// a static friction of `friction`
    #[derive(Clone, Debug, Default)]
    pub struct Integrator {
        position: Rc<Cell<i32>>,
        friction: i32,
    }

    impl Integrator {
        pub fn with_friction(friction: i32) -> Self {
            Self {
                position: Rc::default(),
                friction,
            }
        }

        pub fn position(&self) -> i32 {
            self.position.get()
        }
    }

    impl Actuator for Integrator {
        fn drive(&mut self, output: i32) {
            if output.abs() > self.friction {
                self.position.set(self.position.get() + output);
            }
        }
    }

    impl Sensor for Integrator {
        fn sense(&mut self) -> i32 {
            self.position.get()
        }
    }

    pub type IntegratorController<'c> = Controller<Integrator, Integrator, &'c ManualClock>;

    pub fn make_integrator_controller(
        clock: &ManualClock,
        config: ControllerConfig,
        law: impl Into<Law>,
        friction: i32,
    ) -> (IntegratorController<'_>, Integrator) {
        let plant = Integrator::with_friction(friction);
        let controller = Controller::new(config, law, plant.clone(), plant.clone(), clock);
        (controller, plant)
    }
}
