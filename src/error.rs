// Error types for controller configuration and gain tuning
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

/// Errors raised when validating controller, control law or tuning parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum ConfigError {
    /// A gain is NaN or infinite
    #[cfg_attr(feature = "std", error("Gains must be finite"))]
    InvalidGain,

    /// The integral clamp is inverted
    #[cfg_attr(
        feature = "std",
        error("The minimum integral must not exceed the maximum integral")
    )]
    InvalidIntegralBounds,

    /// The deadbands do not bracket zero
    #[cfg_attr(
        feature = "std",
        error("The negative deadband must be <= 0 and the positive deadband must be >= 0")
    )]
    InvalidDeadband,

    /// The bang-bang approach speed is negative
    #[cfg_attr(feature = "std", error("The approach speed must not be negative"))]
    InvalidSpeed,

    /// The control loop period is zero
    #[cfg_attr(feature = "std", error("The loop period must be greater than zero"))]
    InvalidPeriod,

    /// A search range for a gain is inverted or not finite
    #[cfg_attr(
        feature = "std",
        error("Gain bounds must be finite with the lower bound not exceeding the upper bound")
    )]
    InvalidBounds,

    /// The particle count is zero or above the swarm cap
    #[cfg_attr(
        feature = "std",
        error("The particle count must be between 1 and the swarm capacity")
    )]
    InvalidParticleCount,

    /// The number of search iterations is zero
    #[cfg_attr(feature = "std", error("At least one search iteration is required"))]
    InvalidIterationCount,
}

/// Errors raised by the tuning routines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum TuneError {
    /// The controller being tuned does not run a PID law
    #[cfg_attr(feature = "std", error("Autotuning requires a PID control law"))]
    NotPid,

    /// The tuning request itself is invalid
    #[cfg_attr(feature = "std", error("Invalid tuning request: {0}"))]
    Config(#[cfg_attr(feature = "std", from)] ConfigError),
}

#[cfg(not(feature = "std"))]
impl From<ConfigError> for TuneError {
    fn from(err: ConfigError) -> Self {
        TuneError::Config(err)
    }
}
