//! Unix-time values and swappable clocks
//!
//! Token lifetimes are tracked with whole-second precision. The [`Clock`]
//! trait is the only way the rest of the workspace asks for the current
//! time, so tests can drive staleness deterministically with a
//! [`TestClock`].

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unused_must_use
)]
#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

use std::{
    ops,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, SystemTime},
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Unix time
///
/// Seconds elapsed since 1970/01/01 at 00:00:00 UTC.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
#[repr(transparent)]
pub struct UnixTime(pub u64);

impl From<SystemTime> for UnixTime {
    #[inline]
    fn from(t: SystemTime) -> Self {
        // A wall clock set before the epoch is clamped rather than trusted.
        let secs = t
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        UnixTime(secs)
    }
}

/// A span of whole seconds
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
#[repr(transparent)]
pub struct DurationSecs(pub u64);

impl DurationSecs {
    /// A zero-length duration
    pub const ZERO: Self = Self(0);

    /// Constructs a duration from a number of minutes
    #[inline]
    pub const fn from_mins(mins: u64) -> Self {
        Self(mins * 60)
    }

    /// Whether this duration is zero seconds long
    #[inline]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// The given whole percentage of this duration, rounded down
    ///
    /// ```
    /// use dsql_clock::DurationSecs;
    ///
    /// assert_eq!(DurationSecs(1800).percent(20), DurationSecs(360));
    /// assert_eq!(DurationSecs(7).percent(20), DurationSecs(1));
    /// ```
    #[inline]
    pub const fn percent(self, pct: u32) -> Self {
        Self(self.0.saturating_mul(pct as u64) / 100)
    }
}

impl From<DurationSecs> for Duration {
    #[inline]
    fn from(d: DurationSecs) -> Self {
        Duration::from_secs(d.0)
    }
}

impl From<Duration> for DurationSecs {
    /// Truncates any sub-second remainder
    #[inline]
    fn from(d: Duration) -> Self {
        Self(d.as_secs())
    }
}

impl ops::Add<DurationSecs> for UnixTime {
    type Output = UnixTime;

    #[inline]
    fn add(self, rhs: DurationSecs) -> Self::Output {
        UnixTime(self.0.saturating_add(rhs.0))
    }
}

impl ops::AddAssign<DurationSecs> for UnixTime {
    #[inline]
    fn add_assign(&mut self, rhs: DurationSecs) {
        *self = *self + rhs;
    }
}

impl ops::Sub<DurationSecs> for UnixTime {
    type Output = UnixTime;

    #[inline]
    fn sub(self, rhs: DurationSecs) -> Self::Output {
        UnixTime(self.0.saturating_sub(rhs.0))
    }
}

impl ops::Sub<UnixTime> for UnixTime {
    type Output = DurationSecs;

    /// Time elapsed from `rhs` until `self`, or zero if `rhs` is later
    #[inline]
    fn sub(self, rhs: UnixTime) -> Self::Output {
        DurationSecs(self.0.saturating_sub(rhs.0))
    }
}

impl ops::Add for DurationSecs {
    type Output = DurationSecs;

    #[inline]
    fn add(self, rhs: DurationSecs) -> Self::Output {
        DurationSecs(self.0.saturating_add(rhs.0))
    }
}

impl ops::Sub for DurationSecs {
    type Output = DurationSecs;

    #[inline]
    fn sub(self, rhs: DurationSecs) -> Self::Output {
        DurationSecs(self.0.saturating_sub(rhs.0))
    }
}

/// Represents a clock, which can tell the current time
pub trait Clock {
    /// Gets the current time according to this clock
    fn now(&self) -> UnixTime;
}

impl<C: Clock + ?Sized> Clock for &C {
    #[inline]
    fn now(&self) -> UnixTime {
        (**self).now()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    #[inline]
    fn now(&self) -> UnixTime {
        (**self).now()
    }
}

/// The system clock as provided by `std::time::SystemTime`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct System;

impl Clock for System {
    #[inline]
    fn now(&self) -> UnixTime {
        UnixTime::from(SystemTime::now())
    }
}

/// A manually driven clock
///
/// Clones share the same instant, so a handle kept by a test can move time
/// forward underneath a component that was handed another clone.
#[derive(Clone, Debug, Default)]
pub struct TestClock(Arc<AtomicU64>);

impl Clock for TestClock {
    #[inline]
    fn now(&self) -> UnixTime {
        UnixTime(self.0.load(Ordering::SeqCst))
    }
}

impl TestClock {
    /// Creates a new test clock reading the specified time
    pub fn new(time: UnixTime) -> Self {
        Self(Arc::new(AtomicU64::new(time.0)))
    }

    /// Moves the clock to `time`
    pub fn set(&self, time: UnixTime) {
        self.0.store(time.0, Ordering::SeqCst);
    }

    /// Moves the clock forward by `by`
    pub fn advance(&self, by: DurationSecs) {
        self.0.fetch_add(by.0, Ordering::SeqCst);
    }
}
