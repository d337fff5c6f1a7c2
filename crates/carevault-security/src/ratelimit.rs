// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fixed-window rate governor for sensitive endpoints.
//
// Per-identifier counters under a single map lock; the whole
// read-increment-compare sequence runs inside the lock, so concurrent
// requests for one identifier cannot both slip under the ceiling. A periodic
// sweep removes expired windows, bounding memory to currently-active
// identifiers rather than historical traffic.
//
// Single-process only. Each additional process multiplies the effective
// ceiling; horizontal scaling needs an external shared counter store with
// atomic increment.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use carevault_core::error::{CareVaultError, Result};

/// Policy-level constants for one class of traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatePolicy {
    /// Requests admitted per window.
    pub max_requests: u32,
    /// Fixed window length.
    pub window: Duration,
}

impl RatePolicy {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    /// Authentication endpoints: 5 requests per 15 minutes.
    pub fn strict() -> Self {
        Self::new(5, Duration::from_secs(15 * 60))
    }

    /// General API traffic: 100 requests per 15 minutes.
    pub fn standard() -> Self {
        Self::new(100, Duration::from_secs(15 * 60))
    }

    /// Read-only traffic: 300 requests per 15 minutes.
    pub fn lenient() -> Self {
        Self::new(300, Duration::from_secs(15 * 60))
    }

    /// Sensitive one-time operations (credential reset): 3 per hour.
    pub fn very_strict() -> Self {
        Self::new(3, Duration::from_secs(60 * 60))
    }
}

impl Default for RatePolicy {
    fn default() -> Self {
        Self::standard()
    }
}

/// One identifier's window. `count` includes denied attempts, so repeated
/// hammering keeps incrementing and rejection telemetry stays accurate.
#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    count: u32,
    reset_at: Instant,
}

/// Outcome of a rate check. Denial is an expected result, not a failure —
/// callers that prefer `?` can bridge through [`RateDecision::into_result`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed {
        limit: u32,
        /// Requests left in the current window (for response headers).
        remaining: u32,
    },
    Denied {
        limit: u32,
        /// Always zero; present so response headers can be filled uniformly.
        remaining: u32,
        /// Whole seconds until the window resets, rounded up, at least 1.
        retry_after_secs: u64,
    },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }

    /// Bridge to the error taxonomy for call sites that propagate with `?`.
    pub fn into_result(self) -> Result<()> {
        match self {
            Self::Allowed { .. } => Ok(()),
            Self::Denied {
                limit,
                retry_after_secs,
                ..
            } => Err(CareVaultError::RateLimitExceeded {
                retry_after_secs,
                limit,
            }),
        }
    }
}

/// In-memory fixed-window rate governor.
pub struct RateGovernor {
    policy: RatePolicy,
    windows: Mutex<HashMap<String, WindowEntry>>,
}

impl RateGovernor {
    pub fn new(policy: RatePolicy) -> Self {
        Self {
            policy,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> RatePolicy {
        self.policy
    }

    /// A panicked holder cannot corrupt a window entry (entries are plain
    /// counters), so a poisoned lock is recovered rather than propagated.
    fn locked(&self) -> MutexGuard<'_, HashMap<String, WindowEntry>> {
        match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Check (and count) one request from `identifier`.
    ///
    /// A missing or expired entry becomes a fresh window with `count = 1`.
    /// Otherwise the count increments first; crossing the ceiling denies
    /// with a retry-after hint derived from the window's reset time.
    pub fn check(&self, identifier: &str) -> RateDecision {
        let now = Instant::now();
        let limit = self.policy.max_requests;
        let mut windows = self.locked();

        let entry = windows
            .entry(identifier.to_owned())
            .and_modify(|entry| {
                if now >= entry.reset_at {
                    entry.count = 1;
                    entry.reset_at = now + self.policy.window;
                } else {
                    entry.count += 1;
                }
            })
            .or_insert(WindowEntry {
                count: 1,
                reset_at: now + self.policy.window,
            });

        if entry.count > limit {
            let remaining_ms = entry.reset_at.duration_since(now).as_millis() as u64;
            let retry_after_secs = remaining_ms.div_ceil(1000).max(1);
            warn!(identifier, count = entry.count, limit, "rate limit exceeded");
            RateDecision::Denied {
                limit,
                remaining: 0,
                retry_after_secs,
            }
        } else {
            RateDecision::Allowed {
                limit,
                remaining: limit - entry.count,
            }
        }
    }

    /// Remove every window whose reset time has passed. Returns the number
    /// of entries removed. Holds the same lock as [`check`](Self::check), so
    /// an in-flight check never observes a half-removed entry.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut windows = self.locked();
        let before = windows.len();
        windows.retain(|_, entry| entry.reset_at > now);
        let removed = before - windows.len();
        if removed > 0 {
            debug!(removed, active = windows.len(), "swept expired rate windows");
        }
        removed
    }

    /// Number of currently tracked identifiers.
    pub fn active_windows(&self) -> usize {
        self.locked().len()
    }

    /// Spawn the periodic expiry sweep on the current tokio runtime.
    ///
    /// The task holds only a weak reference: when the last `Arc` to the
    /// governor drops, the sweeper exits on its next tick.
    pub fn run_sweeper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let governor = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; skip it so a fresh governor
            // is not swept before it has served a request.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match governor.upgrade() {
                    Some(governor) => {
                        governor.sweep();
                    }
                    None => break,
                }
            }
        })
    }
}
