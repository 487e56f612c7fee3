// Time sources for the feedback loop: instants, clocks and cooperative delays
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

use core::cell::Cell;
use core::ops::Add;
use core::time::Duration;

use core::fmt::Debug;

/// A trait for time-like objects that can be used to measure elapsed time.
///
/// Controllers stamp every iteration with an instant and measure the interval to the next one to
/// form the discrete derivative of the error.
pub trait InstantLike:
    Sized + Add<Duration, Output = Self> + Clone + Copy + Debug + PartialEq<Self> + Send + Sync
{
    /// Returns the amount of time elapsed from another instant to this one, saturating at zero
    /// if `earlier` is actually later than `self`
    #[must_use]
    fn duration_since(&self, earlier: Self) -> Duration;
}

/// A wrapper around an unsigned 64-bit integer representing milliseconds, e.g. the tick counter
/// of an RTOS
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Millis(pub u64);

impl InstantLike for Millis {
    fn duration_since(&self, earlier: Self) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for Millis {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Millis(self.0 + rhs.as_millis() as u64)
    }
}

/// A wrapper around an unsigned 64-bit integer representing microseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Micros(pub u64);

impl InstantLike for Micros {
    fn duration_since(&self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for Micros {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Micros(self.0 + rhs.as_micros() as u64)
    }
}

/// A source of time that can also put the calling task to sleep.
///
/// This is the only scheduling primitive the controllers need: `now` to stamp iterations and
/// `delay_until` to run a loop at a fixed period without accumulating drift, like
/// `taskDelayUntil` on an RTOS.
pub trait Clock {
    /// The instant type produced by this clock
    type Instant: InstantLike;

    /// Reads the current time
    fn now(&self) -> Self::Instant;

    /// Blocks the calling task until `deadline`. Returns immediately if the deadline has passed.
    fn delay_until(&self, deadline: Self::Instant);
}

impl<C: Clock + ?Sized> Clock for &C {
    type Instant = C::Instant;

    fn now(&self) -> Self::Instant {
        (**self).now()
    }

    fn delay_until(&self, deadline: Self::Instant) {
        (**self).delay_until(deadline)
    }
}

/// A simulated clock. Time only moves when a task delays on it or when it is advanced explicitly,
/// which makes closed-loop runs fully deterministic.
///
/// Share one `ManualClock` between several controllers by handing each of them a reference.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_us: Cell<u64>,
}

impl ManualClock {
    /// Creates a clock reading `start`
    pub fn new(start: Micros) -> Self {
        Self {
            now_us: Cell::new(start.0),
        }
    }

    /// Moves time forward by `step`
    pub fn advance(&self, step: Duration) {
        self.now_us.set(self.now_us.get() + step.as_micros() as u64);
    }
}

impl Clock for ManualClock {
    type Instant = Micros;

    fn now(&self) -> Micros {
        Micros(self.now_us.get())
    }

    fn delay_until(&self, deadline: Micros) {
        if deadline.0 > self.now_us.get() {
            self.now_us.set(deadline.0);
        }
    }
}

/// A convenient wrapper around `std::time::Instant` satisfying the `InstantLike` trait.
#[cfg(feature = "std")]
mod std_instant {

    use super::{Add, Clock, Duration, InstantLike};

    #[derive(Debug, Clone, Copy)]
    pub struct StdInstant(pub std::time::Instant);

    impl StdInstant {
        pub fn now() -> Self {
            StdInstant(std::time::Instant::now())
        }
    }

    impl InstantLike for StdInstant {
        fn duration_since(&self, other: Self) -> Duration {
            self.0.saturating_duration_since(other.0)
        }
    }

    impl Add<Duration> for StdInstant {
        type Output = Self;

        fn add(self, rhs: Duration) -> Self::Output {
            StdInstant(self.0 + rhs)
        }
    }

    impl PartialEq for StdInstant {
        fn eq(&self, other: &Self) -> bool {
            self.0 == other.0
        }
    }

    /// The wall clock, sleeping the current thread on `delay_until`
    #[derive(Debug, Clone, Copy, Default)]
    pub struct StdClock;

    impl Clock for StdClock {
        type Instant = StdInstant;

        fn now(&self) -> StdInstant {
            StdInstant::now()
        }

        fn delay_until(&self, deadline: StdInstant) {
            let remaining = deadline.duration_since(StdInstant::now());
            if !remaining.is_zero() {
                std::thread::sleep(remaining);
            }
        }
    }

    /// Tests that StdInstant is just one constructor call away from std::time::Instant
    /// and calling duration_since is equivalent to calling the same method on the underlying Instant.
    #[cfg(test)]
    #[test]
    fn test_std_instant_wrapper() {
        let start = StdInstant::now();
        let end = StdInstant(std::time::Instant::now());
        let result = end.duration_since(start);
        let expected = end.0.duration_since(start.0);
        assert_eq!(result, expected);
    }

    /// An elapsed deadline does not put the thread to sleep
    #[cfg(test)]
    #[test]
    fn test_std_clock_skips_elapsed_deadline() {
        let clock = StdClock;
        let past = clock.now();
        let before = std::time::Instant::now();
        clock.delay_until(past);
        assert!(before.elapsed() < Duration::from_millis(50));
    }
}

#[cfg(feature = "std")]
pub use std_instant::{StdClock, StdInstant};
