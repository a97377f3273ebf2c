//! Environment abstraction for deterministic testing.
//!
//! Decouples synchronization logic from system time. The core state machines
//! never read a clock: every method that needs time takes a [`Timepoint`]
//! parameter, and drivers obtain it from an [`Environment`]. Production uses
//! the system clock; simulation uses a virtual clock that only moves when the
//! test advances it.

use std::{
    fmt::Debug,
    future::Future,
    ops::{Add, Sub},
    time::Duration,
};

/// Instant type accepted by the core state machines.
///
/// Implemented for any monotonic instant that supports duration arithmetic,
/// such as `std::time::Instant` or a simulated instant.
pub trait Timepoint:
    Copy + Ord + Debug + Sub<Output = Duration> + Add<Duration, Output = Self> + 'static
{
}

impl<T> Timepoint for T where
    T: Copy + Ord + Debug + Sub<Output = Duration> + Add<Duration, Output = T> + 'static
{
}

/// Abstract environment providing time and async sleeping.
///
/// # Invariants
///
/// - `now()` never goes backwards within one execution context.
/// - `sleep(d)` completes no earlier than `d` after it was called, as measured
///   by `now()`.
pub trait Environment: Clone + Send + Sync + 'static {
    /// The instant type used by this environment.
    type Instant: Timepoint;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// Only driver code awaits this; the core state machines never sleep.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;

    /// Duration from now until `deadline`, zero if it already passed.
    fn until(&self, deadline: Self::Instant) -> Duration {
        let now = self.now();
        if deadline > now { deadline - now } else { Duration::ZERO }
    }
}
