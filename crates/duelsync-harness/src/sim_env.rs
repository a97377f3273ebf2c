//! Simulated environment with a virtual clock.
//!
//! Time starts at zero and only moves when something sleeps or the test calls
//! [`SimEnv::advance`]. A sleep does not wait: when first polled it jumps the
//! clock to its deadline and completes. A driver racing a ready transport
//! against a sleep with `biased` selection therefore always takes the
//! transport first, and a sleep that loses the race leaves the clock alone.

use std::{
    fmt,
    future::Future,
    ops::{Add, Sub},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use duelsync_core::Environment;

/// Instant on the virtual clock: an offset from the start of the simulation.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimInstant(Duration);

impl SimInstant {
    /// Start of the simulation.
    pub const ZERO: Self = Self(Duration::ZERO);

    /// Instant `offset` after the start.
    pub fn from_start(offset: Duration) -> Self {
        Self(offset)
    }

    /// Offset from the start.
    pub fn since_start(self) -> Duration {
        self.0
    }
}

impl fmt::Debug for SimInstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T+{:?}", self.0)
    }
}

impl Add<Duration> for SimInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self {
        Self(self.0.saturating_add(rhs))
    }
}

impl Sub for SimInstant {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Duration {
        self.0.saturating_sub(rhs.0)
    }
}

/// Simulated environment. Clones share one clock.
#[derive(Debug, Clone, Default)]
pub struct SimEnv {
    nanos: Arc<AtomicU64>,
}

impl SimEnv {
    /// Environment with the clock at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(to_nanos(by), Ordering::SeqCst);
    }

    /// Time elapsed since the start.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

impl Environment for SimEnv {
    type Instant = SimInstant;

    fn now(&self) -> SimInstant {
        SimInstant(self.elapsed())
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        let nanos = Arc::clone(&self.nanos);
        let deadline = self.nanos.load(Ordering::SeqCst).saturating_add(to_nanos(duration));
        async move {
            nanos.fetch_max(deadline, Ordering::SeqCst);
        }
    }
}

fn to_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}
