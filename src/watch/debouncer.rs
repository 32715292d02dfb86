//! ChangeDebouncer: the reload scheduling state machine.
//!
//! ```text
//! Idle --event--> Scheduled --deadline--> Firing --finish--> Idle
//!                    ^                      |
//!                    +---finish (rearm)-----+
//! ```
//!
//! The debouncer owns no timer. The runtime asks it for the current deadline,
//! sleeps until then, and reports back; all transitions take `now` explicitly.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Default quiet window between the first relevant event and the reload.
pub const DEFAULT_QUIET_WINDOW: Duration = Duration::from_millis(50);

/// How further events affect an armed timer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoalescePolicy {
    /// The deadline is fixed by the first event, so latency is bounded.
    #[default]
    Fixed,
    /// Every event pushes the deadline out by a full window.
    Sliding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    Scheduled { deadline: Instant },
    /// A reload is running. `rearm` records events that arrived meanwhile.
    Firing { rearm: bool },
}

#[derive(Debug, Clone)]
pub struct ChangeDebouncer {
    window: Duration,
    policy: CoalescePolicy,
    state: DebounceState,
}

impl ChangeDebouncer {
    pub fn new(window: Duration, policy: CoalescePolicy) -> Self {
        Self {
            window,
            policy,
            state: DebounceState::Idle,
        }
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Deadline of the armed timer, if any.
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            DebounceState::Scheduled { deadline } => Some(deadline),
            _ => None,
        }
    }

    pub fn is_scheduled(&self) -> bool {
        matches!(self.state, DebounceState::Scheduled { .. })
    }

    pub fn is_firing(&self) -> bool {
        matches!(self.state, DebounceState::Firing { .. })
    }

    /// Record a relevant change event.
    pub fn notify(&mut self, now: Instant) {
        self.state = match self.state {
            DebounceState::Idle => DebounceState::Scheduled {
                deadline: now + self.window,
            },
            DebounceState::Scheduled { deadline } => DebounceState::Scheduled {
                deadline: match self.policy {
                    CoalescePolicy::Fixed => deadline,
                    CoalescePolicy::Sliding => now + self.window,
                },
            },
            DebounceState::Firing { .. } => DebounceState::Firing { rearm: true },
        };
    }

    /// Enter `Firing` if the armed deadline has passed. Returns whether the
    /// caller should run a reload now.
    pub fn try_fire(&mut self, now: Instant) -> bool {
        match self.state {
            DebounceState::Scheduled { deadline } if now >= deadline => {
                self.state = DebounceState::Firing { rearm: false };
                true
            }
            _ => false,
        }
    }

    /// Enter `Firing` regardless of the deadline, e.g. when the event source
    /// closes with a reload still pending.
    pub fn fire_now(&mut self) -> bool {
        if self.is_scheduled() {
            self.state = DebounceState::Firing { rearm: false };
            true
        } else {
            false
        }
    }

    /// Leave `Firing`: back to `Idle`, or re-armed when events arrived during
    /// the reload.
    pub fn finish(&mut self, now: Instant) {
        self.state = match self.state {
            DebounceState::Firing { rearm: true } => DebounceState::Scheduled {
                deadline: now + self.window,
            },
            DebounceState::Firing { rearm: false } => DebounceState::Idle,
            other => other,
        };
    }
}

impl Default for ChangeDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_QUIET_WINDOW, CoalescePolicy::default())
    }
}
