//! # Discrete Feedback Controller Framework
//!
//! This library closes the loop between an integer actuator command and an integer sensor
//! reading, iterating on a fixed period, for embedded mechanisms such as motor-driven arms, lifts
//! and drivetrains.
//!
//! ## Features
//!
//! - Pluggable control laws behind one controller:
//!   - PID with a clamped integral, and a modified PID that halves its integral on error sign
//!     flips and adds a goal feedforward.
//!   - Bang-bang with a latched braking phase.
//!   - Clegg reset integrator.
//!
//! - Practical motor-control plumbing:
//!   - Deadband compensation: commands too small to move the plant are raised to the deadband.
//!   - Confidence counting: a goal is reached only after several consecutive on-target samples.
//!   - Pluggable stall detection flagging a mechanism that does not move under load.
//!
//! - Master-slave synchronization of two loops carrying one mechanism.
//!
//! - Empirical tuning on live hardware: particle swarm optimization of PID gains and deadband
//!   discovery.
//!
//! - Runs without `std`. Time and scheduling come from a user-supplied [`time::Clock`].
//!
//! ## Usage
//!
//! ### Blocking move
//!
//! ```rust
//! use core::time::Duration;
//!
//! use discrete_fbc::controller::{Controller, ControllerConfigBuilder};
//! use discrete_fbc::pid::{Pid, PidConfigBuilder};
//! use discrete_fbc::time::ManualClock;
//!
//! let clock = ManualClock::default();
//! let pid = PidConfigBuilder::default()
//!     .kp(0.5)
//!     .build()
//!     .expect("Invalid PID config");
//! let config = ControllerConfigBuilder::default()
//!     .tolerance(10)
//!     .confidence(3)
//!     .build()
//!     .expect("Invalid controller config");
//!
//! // A toy plant that moves by the commanded amount every iteration
//! let position = core::cell::Cell::new(0);
//! let mut controller = Controller::new(
//!     config,
//!     Pid::new(pid),
//!     |output: i32| position.set(position.get() + output),
//!     || position.get(),
//!     &clock,
//! );
//!
//! controller.set_goal(1000);
//! let timed_out = controller.run_to_completion(Duration::from_secs(5));
//! assert!(!timed_out);
//! assert!((controller.sense() - 1000).abs() < 10);
//! ```
//!
//! ### Background loop
//!
//! With `std`, [`runtime::run_parallel`] moves a controller onto its own thread, iterating at the
//! controller's period, and [`runtime::ParallelTask::lock`] gives exclusive access to it, e.g. to
//! change the goal.
//!
//! ### Plugging in your clock
//!
//! ``` rust
//! use core::time::Duration;
//! use discrete_fbc::time::{Clock, Millis};
//!
//! struct RtosClock;
//!
//! impl Clock for RtosClock {
//!     type Instant = Millis;
//!
//!     fn now(&self) -> Millis {
//!         Millis(0) // read the RTOS tick counter here
//!     }
//!
//!     fn delay_until(&self, _deadline: Millis) {
//!         // call the RTOS's delay-until here
//!     }
//! }
//! ```
//!
//! ## License
//!
#![no_std]

#[cfg(feature = "std")]
extern crate std;

/// The attachable stall predicates
pub mod stall;

/// The closed-loop controller and the actuator/sensor capabilities it drives
pub mod controller;

/// The control-law interface and the tagged union of laws
pub mod law;

/// PID and modified PID
pub mod pid;

pub mod bangbang;

pub mod clegg;

/// Synchronization of two loops through an equalizer
pub mod master_slave;

/// Particle swarm gain autotuning and deadband discovery
pub mod tune;

/// The module containing time-related utilities to support sampling time handling
pub mod time;

pub mod error;

/// Background execution of controllers
#[cfg(feature = "std")]
pub mod runtime;

#[doc(hidden)]
#[cfg(feature = "simulation")]
pub mod sim;

pub use controller::{Controller, Convergence};
pub use error::{ConfigError, TuneError};
pub use law::{ControlLaw, Law};

#[doc = include_str!("../README.md")]
#[cfg(doctest)]
pub struct ReadmeDoctests;
