//! Exact time arithmetic for timelines.
//!
//! A [`Timecode`] is a non-negative position or length held as whole
//! milliseconds. Clients speak seconds (`f64`) on the wire; converting once at
//! the boundary keeps splice arithmetic exact, so an insert followed by the
//! matching delete lands on precisely the original boundaries.

use std::fmt;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Milliseconds per second.
const MILLIS_PER_SEC: f64 = 1000.0;

/// Largest accepted value in seconds (roughly 31 years of footage).
pub const MAX_SECONDS: f64 = 1.0e9;

/// A time position or duration in milliseconds, serialized as seconds.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "f64", into = "f64")]
pub struct Timecode(i64);

impl Timecode {
    pub const ZERO: Timecode = Timecode(0);

    /// [`MAX_SECONDS`] in milliseconds.
    pub const MAX: Timecode = Timecode(1_000_000_000_000);

    /// Build a timecode from whole milliseconds. Negative input clamps to zero.
    pub const fn from_millis(ms: i64) -> Self {
        if ms < 0 {
            Self(0)
        } else {
            Self(ms)
        }
    }

    /// Convert seconds to a timecode, rounding to the nearest millisecond.
    pub fn from_secs_f64(secs: f64) -> Result<Self, CoreError> {
        if !secs.is_finite() {
            return Err(CoreError::Validation(format!(
                "time value must be a finite number, got {secs}"
            )));
        }
        if secs < 0.0 {
            return Err(CoreError::Validation(format!(
                "time value must be >= 0, got {secs}"
            )));
        }
        if secs > MAX_SECONDS {
            return Err(CoreError::Validation(format!(
                "time value must be <= {MAX_SECONDS}, got {secs}"
            )));
        }
        Ok(Self((secs * MILLIS_PER_SEC).round() as i64))
    }

    pub const fn as_millis(self) -> i64 {
        self.0
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / MILLIS_PER_SEC
    }

    /// Difference that never goes below zero.
    pub fn saturating_sub(self, rhs: Timecode) -> Timecode {
        Timecode((self.0 - rhs.0).max(0))
    }
}

impl Add for Timecode {
    type Output = Timecode;

    fn add(self, rhs: Timecode) -> Timecode {
        Timecode(self.0 + rhs.0)
    }
}

impl Sub for Timecode {
    type Output = Timecode;

    /// Callers only subtract a smaller timecode from a larger one; the result
    /// saturates at zero otherwise.
    fn sub(self, rhs: Timecode) -> Timecode {
        self.saturating_sub(rhs)
    }
}

impl TryFrom<f64> for Timecode {
    type Error = CoreError;

    fn try_from(secs: f64) -> Result<Self, Self::Error> {
        Self::from_secs_f64(secs)
    }
}

impl From<Timecode> for f64 {
    fn from(tc: Timecode) -> f64 {
        tc.as_secs_f64()
    }
}

impl fmt::Display for Timecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.as_secs_f64())
    }
}
