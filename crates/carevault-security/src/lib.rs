// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// carevault-security — Security infrastructure for the CareVault platform.
//
// This crate is the only place in the codebase that touches key material,
// ciphertext, or request counters. It provides field-level authenticated
// encryption at rest, transparent encrypt/decrypt around the data-access
// seam, salted one-way hashing for matchable-but-unrecoverable fields, a
// fixed-window rate governor, and a structured audit trail.

pub mod audit;
pub mod codec;
pub mod crypto;
pub mod intercept;
pub mod ratelimit;

// PUBLIC API: Re-export the security primitives consumers compose with.
pub use audit::{AuditAction, AuditContext, AuditEvent, AuditSink, AuditTrail, TracingSink};
pub use codec::{FieldCodec, FieldRegistry};
pub use crypto::{generate_secure_token, hash_with_salt, mask_sensitive, verify_hash, FieldCipher};
pub use intercept::{EncryptedStore, RecordStore};
pub use ratelimit::{RateDecision, RateGovernor, RatePolicy};
