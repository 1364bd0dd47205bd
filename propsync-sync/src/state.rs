//! Connection state tracking.
//!
//! The notification channel is driven by this transition table:
//!
//! | from                          | event                  | to            |
//! |-------------------------------|------------------------|---------------|
//! | idle, backing-off, given-up   | connect                | connecting    |
//! | connecting                    | stream established     | open          |
//! | connecting, open              | transport failure      | backing-off   |
//! | connecting, open              | failure, budget spent  | given-up      |
//! | connecting, open, backing-off | disconnect             | idle          |
//!
//! The attempt counter goes up by one per failure and returns to zero on
//! every successful open and on every explicit connect.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Lifecycle of the notification channel's single stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Open,
    BackingOff,
    /// Retry budget exhausted. Only an explicit connect leaves this state.
    GivenUp,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::BackingOff => "backing-off",
            Self::GivenUp => "given-up",
        };
        f.write_str(name)
    }
}

/// Capped exponential backoff: `min(base * 2^attempt, cap)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// Retries allowed after consecutive failures before giving up.
    pub max_attempts: u32,
    /// Base delay in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound on any single delay, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        let ms = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(ms)
    }
}

/// State machine for one logical subscription.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    state: ConnectionState,
    attempts: u32,
    policy: ReconnectPolicy,
}

impl ConnectionTracker {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            state: ConnectionState::Idle,
            attempts: 0,
            policy,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Consecutive failures since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Explicit connect: clears the retry budget and starts connecting.
    pub fn connect(&mut self) {
        self.attempts = 0;
        self.state = ConnectionState::Connecting;
    }

    /// The backoff delay elapsed; try again without touching the counter.
    pub fn retry(&mut self) {
        if self.state == ConnectionState::BackingOff {
            self.state = ConnectionState::Connecting;
        }
    }

    /// The stream is established.
    pub fn opened(&mut self) {
        self.attempts = 0;
        self.state = ConnectionState::Open;
    }

    /// The stream failed to open or dropped.
    ///
    /// Returns the delay before the next attempt, or `None` when the retry
    /// budget is spent and the tracker has moved to `GivenUp`.
    pub fn failed(&mut self) -> Option<Duration> {
        if self.attempts >= self.policy.max_attempts {
            self.state = ConnectionState::GivenUp;
            return None;
        }
        self.attempts += 1;
        self.state = ConnectionState::BackingOff;
        Some(self.policy.delay_for(self.attempts))
    }

    /// Explicit disconnect. `Idle` and `GivenUp` are left as they are.
    pub fn closed(&mut self) {
        if matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Open | ConnectionState::BackingOff
        ) {
            self.state = ConnectionState::Idle;
        }
    }
}
