// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Security layer configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Deployment posture. Controls how strictly the security layer treats
/// missing key material and which audit output format is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Posture {
    /// Missing encryption key is fatal; audit events are machine-parseable.
    Production,
    /// Missing key falls back to an insecure development key (with a loud
    /// warning); audit events are human-readable.
    Development,
}

impl Posture {
    /// Parse from an environment string. Only the exact value `production`
    /// selects the production posture.
    pub fn from_env_value(value: &str) -> Self {
        if value.eq_ignore_ascii_case("production") {
            Self::Production
        } else {
            Self::Development
        }
    }

    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

/// Settings consumed by the security layer. Owned by the process's
/// composition root and passed into each component explicitly — there is no
/// ambient global configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// 32-byte encryption key, hex-encoded (64 characters). `None` means no
    /// key is configured; see [`Posture`] for how that is treated.
    pub encryption_key: Option<String>,
    /// Deployment posture.
    pub posture: Posture,
    /// How often the rate governor's expiry sweep runs.
    pub rate_sweep_interval: Duration,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            encryption_key: None,
            posture: Posture::Development,
            rate_sweep_interval: Duration::from_secs(60),
        }
    }
}

impl SecurityConfig {
    /// Load configuration from process environment variables:
    /// `CAREVAULT_ENCRYPTION_KEY`, `CAREVAULT_ENV`, and
    /// `CAREVAULT_RATE_SWEEP_SECS`. Unset variables fall back to defaults.
    pub fn from_env() -> Self {
        let encryption_key = std::env::var("CAREVAULT_ENCRYPTION_KEY")
            .ok()
            .filter(|k| !k.is_empty());

        let posture = std::env::var("CAREVAULT_ENV")
            .map(|v| Posture::from_env_value(&v))
            .unwrap_or(Posture::Development);

        let rate_sweep_interval = std::env::var("CAREVAULT_RATE_SWEEP_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(60));

        Self {
            encryption_key,
            posture,
            rate_sweep_interval,
        }
    }
}
