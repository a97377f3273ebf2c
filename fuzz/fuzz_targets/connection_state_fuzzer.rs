//! Fuzz target for the ConnectionManager state machine
//!
//! # Strategy
//!
//! - Feed arbitrary interleavings of connect, open outcomes, drops, ticks and
//!   disconnects with monotonically advancing time
//! - Random policies, including zero attempts and multipliers below one
//!
//! # Invariants
//!
//! - Never panics
//! - A retry is only ever scheduled while reconnecting
//! - Attempt counter never exceeds the policy's maximum
//! - Connected status flag matches the link state

#![no_main]

use std::time::Duration;

use arbitrary::Arbitrary;
use duelsync_core::{ConnectionManager, Dispatcher, LinkState, ReconnectPolicy};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
enum LinkOp {
    Connect,
    OpenSucceeded,
    OpenFailed,
    Dropped,
    Tick { advance_ms: u16 },
    Disconnect,
}

#[derive(Debug, Clone, Arbitrary)]
struct Input {
    initial_ms: u16,
    multiplier_tenths: u8,
    max_ms: u16,
    max_attempts: u8,
    ops: Vec<LinkOp>,
}

fuzz_target!(|input: Input| {
    let policy = ReconnectPolicy {
        initial_delay: Duration::from_millis(u64::from(input.initial_ms)),
        multiplier: f64::from(input.multiplier_tenths) / 10.0,
        max_delay: Duration::from_millis(u64::from(input.max_ms)),
        max_attempts: u32::from(input.max_attempts % 8),
    };
    let mut link: ConnectionManager<Duration> = ConnectionManager::new(Dispatcher::new(), policy);
    let mut now = Duration::ZERO;

    for op in input.ops {
        match op {
            LinkOp::Connect => {
                let _ = link.connect(now);
            },
            LinkOp::OpenSucceeded => {
                let _ = link.on_open_succeeded();
            },
            LinkOp::OpenFailed => {
                let _ = link.on_open_failed("refused", now);
            },
            LinkOp::Dropped => link.on_transport_dropped("reset", now),
            LinkOp::Tick { advance_ms } => {
                now += Duration::from_millis(u64::from(advance_ms));
                let _ = link.tick(now);
            },
            LinkOp::Disconnect => {
                let _ = link.disconnect();
            },
        }

        if link.next_wakeup().is_some() {
            assert_eq!(link.state(), LinkState::Reconnecting);
        }
        assert!(link.status().reconnect_attempt <= link.policy().max_attempts);
        assert_eq!(link.status().connected, link.state() == LinkState::Connected);
    }
});
