// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for CareVault.

use thiserror::Error;

/// Top-level error type for all CareVault security operations.
#[derive(Debug, Error)]
pub enum CareVaultError {
    // -- Crypto errors --
    /// No encryption key is configured and the posture requires one.
    #[error("encryption unavailable: no key configured")]
    EncryptionUnavailable,

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Deliberately undifferentiated: a tampered envelope, a wrong key, and a
    /// corrupted blob all look identical to the caller so that failure
    /// reasons cannot be probed.
    #[error("decryption failed")]
    DecryptionFailed,

    #[error("hashing failed: {0}")]
    HashingFailed(String),

    // -- Rate limiting --
    #[error("rate limit exceeded: retry after {retry_after_secs}s (limit {limit})")]
    RateLimitExceeded { retry_after_secs: u64, limit: u32 },

    // -- Audit --
    /// Produced by audit sinks. Always absorbed by the audit trail itself;
    /// this variant never crosses the audit module boundary.
    #[error("audit write failed: {0}")]
    AuditWriteFailed(String),

    // -- Configuration --
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // -- Data access --
    #[error("store operation failed: {0}")]
    Store(String),

    #[error("record not found in {0}")]
    NotFound(String),

    // -- Pass-through --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CareVaultError>;
