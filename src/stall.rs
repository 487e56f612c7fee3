// Stall detection predicates
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

use log::debug;

/// What a stall predicate gets to see at the end of an iteration.
///
/// `output` is the already deadband-clamped command and `reading` is the sensor value sampled in
/// this iteration. `prev_reading` is the sample from the previous iteration.
#[derive(Debug)]
pub struct StallProbe<'a> {
    pub output: i32,
    pub neg_deadband: i32,
    pub pos_deadband: i32,
    pub tolerance: u32,
    pub confidence: u32,
    pub reading: i32,
    prev_reading: &'a mut i32,
}

impl<'a> StallProbe<'a> {
    pub(crate) fn new(
        output: i32,
        (neg_deadband, pos_deadband): (i32, i32),
        tolerance: u32,
        confidence: u32,
        reading: i32,
        prev_reading: &'a mut i32,
    ) -> Self {
        Self {
            output,
            neg_deadband,
            pos_deadband,
            tolerance,
            confidence,
            reading,
            prev_reading,
        }
    }

    pub fn prev_reading(&self) -> i32 {
        *self.prev_reading
    }

    /// Zeroes the controller's record of the previous reading
    pub fn clear_prev_reading(&mut self) {
        *self.prev_reading = 0;
    }
}

/// A predicate flagging mechanical stalls from recent sensor motion against the commanded output.
pub trait StallDetect {
    /// Returns `true` if the mechanism is stalled
    fn detect(&mut self, probe: &mut StallProbe<'_>) -> bool;

    /// Forgets any accumulated evidence
    fn reset(&mut self) {}

    /// Whether this detector can ever report a stall. Controllers without a detector never leave
    /// the running/confident states.
    fn is_attached(&self) -> bool {
        true
    }
}

/// No stall detection at all.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoStallDetect;

impl StallDetect for NoStallDetect {
    fn detect(&mut self, _probe: &mut StallProbe<'_>) -> bool {
        false
    }

    fn is_attached(&self) -> bool {
        false
    }
}

/// Flags a stall when the sensor barely moves for longer than a confidence window while a
/// non-trivial output is commanded.
///
/// Movement below `max(1, tolerance / 8)` per iteration counts as stuck. A zero or
/// exactly-deadband command is never a stall and clears the evidence. Once a stall is declared
/// the evidence and the previous reading are cleared, so a persistent stall has to accumulate a
/// full window again before it is reported a second time.
#[derive(Copy, Clone, Debug, Default)]
pub struct MotionStallDetector {
    stuck_count: u32,
}

impl MotionStallDetector {
    pub fn stuck_count(&self) -> u32 {
        self.stuck_count
    }
}

impl StallDetect for MotionStallDetector {
    fn detect(&mut self, probe: &mut StallProbe<'_>) -> bool {
        if probe.output == 0
            || probe.output == probe.neg_deadband
            || probe.output == probe.pos_deadband
        {
            self.stuck_count = 0;
            return false;
        }

        let min_movement = (probe.tolerance >> 3).max(1);
        let delta = (i64::from(probe.reading) - i64::from(probe.prev_reading())).unsigned_abs();

        if delta < u64::from(min_movement) {
            self.stuck_count += 1;
        } else {
            self.stuck_count = 0;
        }

        let stalled = self.stuck_count > probe.confidence;
        if stalled {
            debug!(
                "Stall: output {} moved the sensor < {} for {} iterations",
                probe.output, min_movement, self.stuck_count
            );
            self.stuck_count = 0;
            probe.clear_prev_reading();
        }
        stalled
    }

    fn reset(&mut self) {
        self.stuck_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(output: i32, reading: i32, prev: &mut i32) -> StallProbe<'_> {
        StallProbe::new(output, (-10, 10), 40, 3, reading, prev)
    }

    #[test]
    fn test_commanded_zero_is_never_a_stall() {
        let mut detector = MotionStallDetector::default();
        let mut prev = 0;
        for _ in 0..10 {
            assert!(!detector.detect(&mut probe(0, 0, &mut prev)));
            assert!(!detector.detect(&mut probe(10, 0, &mut prev)));
            assert!(!detector.detect(&mut probe(-10, 0, &mut prev)));
        }
        assert_eq!(detector.stuck_count(), 0);
    }

    #[test]
    fn test_stall_declared_after_window_then_cooldown() {
        let mut detector = MotionStallDetector::default();
        let mut prev = 100;

        // tolerance 40 -> a movement of 5 or more is motion, confidence 3 -> stall on the 4th stuck sample
        for _ in 0..3 {
            assert!(!detector.detect(&mut probe(50, 104, &mut prev)));
        }
        assert!(detector.detect(&mut probe(50, 104, &mut prev)));
        assert_eq!(prev, 0);
        assert_eq!(detector.stuck_count(), 0);

        // Evidence must accumulate again from scratch
        prev = 104;
        for _ in 0..3 {
            assert!(!detector.detect(&mut probe(50, 104, &mut prev)));
        }
        assert!(detector.detect(&mut probe(50, 104, &mut prev)));
    }

    #[test]
    fn test_motion_clears_evidence() {
        let mut detector = MotionStallDetector::default();
        let mut prev = 0;
        assert!(!detector.detect(&mut probe(50, 0, &mut prev)));
        assert!(!detector.detect(&mut probe(50, 0, &mut prev)));
        assert_eq!(detector.stuck_count(), 2);
        assert!(!detector.detect(&mut probe(50, 5, &mut prev)));
        assert_eq!(detector.stuck_count(), 0);
    }
}
