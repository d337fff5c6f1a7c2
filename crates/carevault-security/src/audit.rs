// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Audit trail — one structured event per security-relevant action,
// regardless of that action's success or failure.
//
// The trail only PRODUCES events; durable storage is an external
// collaborator consuming the sink. Logging an event must never abort the
// business operation it describes: sink failures are downgraded to a
// warning on the process log and dropped.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};
use uuid::Uuid;

use carevault_core::config::Posture;
use carevault_core::error::{CareVaultError, Result};
use carevault_core::types::RequestMeta;

/// Closed taxonomy of security-relevant actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    // Authentication outcomes
    LoginSuccess,
    LoginFailure,
    Logout,
    PasswordChanged,
    PasswordResetRequested,
    // Record access
    RecordViewed,
    RecordCreated,
    RecordUpdated,
    RecordDeleted,
    // Sensitive operations
    AlertTriggered,
    AlertResolved,
    PrescriptionIssued,
    AppointmentScheduled,
    AppointmentCancelled,
    // Account management
    AccountCreated,
    AccountDeactivated,
    // System anomalies
    UnauthorizedAttempt,
    RateLimitTripped,
    ValidationFailure,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LoginSuccess => "LOGIN_SUCCESS",
            Self::LoginFailure => "LOGIN_FAILURE",
            Self::Logout => "LOGOUT",
            Self::PasswordChanged => "PASSWORD_CHANGED",
            Self::PasswordResetRequested => "PASSWORD_RESET_REQUESTED",
            Self::RecordViewed => "RECORD_VIEWED",
            Self::RecordCreated => "RECORD_CREATED",
            Self::RecordUpdated => "RECORD_UPDATED",
            Self::RecordDeleted => "RECORD_DELETED",
            Self::AlertTriggered => "ALERT_TRIGGERED",
            Self::AlertResolved => "ALERT_RESOLVED",
            Self::PrescriptionIssued => "PRESCRIPTION_ISSUED",
            Self::AppointmentScheduled => "APPOINTMENT_SCHEDULED",
            Self::AppointmentCancelled => "APPOINTMENT_CANCELLED",
            Self::AccountCreated => "ACCOUNT_CREATED",
            Self::AccountDeactivated => "ACCOUNT_DEACTIVATED",
            Self::UnauthorizedAttempt => "UNAUTHORIZED_ATTEMPT",
            Self::RateLimitTripped => "RATE_LIMIT_TRIPPED",
            Self::ValidationFailure => "VALIDATION_FAILURE",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable audit record. Constructed, emitted, never updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    /// Who performed the action, if authenticated.
    pub actor: Option<String>,
    /// What the action was performed on (record id, account id, ...).
    pub target: Option<String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub success: bool,
    /// Error summary on failure. Never carries cryptographic detail.
    pub error: Option<String>,
    pub duration_ms: Option<u64>,
    /// Structured extra fields supplied by the call site.
    pub details: Map<String, Value>,
}

impl AuditEvent {
    pub fn new(action: AuditAction) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            action,
            actor: None,
            target: None,
            ip: None,
            user_agent: None,
            success: true,
            error: None,
            duration_ms: None,
            details: Map::new(),
        }
    }

    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn meta(mut self, meta: &RequestMeta) -> Self {
        self.ip = meta.ip.map(|ip| ip.to_string());
        self.user_agent = meta.user_agent.clone();
        self
    }

    pub fn success(mut self, success: bool) -> Self {
        self.success = success;
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self.success = false;
        self
    }

    pub fn duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn detail(mut self, key: &str, value: Value) -> Self {
        self.details.insert(key.to_owned(), value);
        self
    }
}

/// Per-call identity for the audit combinator.
#[derive(Debug, Clone, Default)]
pub struct AuditContext {
    pub actor: Option<String>,
    pub target: Option<String>,
    pub meta: Option<RequestMeta>,
}

impl AuditContext {
    pub fn new(meta: RequestMeta) -> Self {
        Self {
            actor: None,
            target: None,
            meta: Some(meta),
        }
    }

    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

/// Destination for audit events. Implementations must be cheap and must not
/// block; durable storage belongs behind the sink, not in it.
pub trait AuditSink: Send + Sync {
    fn emit(&self, event: &AuditEvent) -> Result<()>;
}

/// Default sink: emits through the `carevault::audit` tracing target.
/// Production posture emits one machine-parseable JSON line per event;
/// other postures emit a human-readable line.
pub struct TracingSink {
    structured: bool,
}

impl TracingSink {
    pub fn for_posture(posture: Posture) -> Self {
        Self {
            structured: posture.is_production(),
        }
    }
}

impl AuditSink for TracingSink {
    fn emit(&self, event: &AuditEvent) -> Result<()> {
        if self.structured {
            let line = serde_json::to_string(event)
                .map_err(|e| CareVaultError::AuditWriteFailed(e.to_string()))?;
            info!(target: "carevault::audit", "{line}");
        } else {
            info!(
                target: "carevault::audit",
                action = %event.action,
                actor = event.actor.as_deref().unwrap_or("-"),
                target_id = event.target.as_deref().unwrap_or("-"),
                ip = event.ip.as_deref().unwrap_or("-"),
                success = event.success,
                duration_ms = event.duration_ms,
                error = event.error.as_deref(),
                "audit"
            );
        }
        Ok(())
    }
}

/// Produces audit events and guarantees they never disturb the operations
/// they describe.
pub struct AuditTrail {
    sink: Box<dyn AuditSink>,
}

impl AuditTrail {
    pub fn new(sink: Box<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Trail with the default tracing sink for the given posture.
    pub fn for_posture(posture: Posture) -> Self {
        Self::new(Box::new(TracingSink::for_posture(posture)))
    }

    /// Emit one event. Infallible outward: a sink failure is reported on the
    /// process log (the secondary diagnostic channel) and dropped, because
    /// audit logging must never abort the operation it describes.
    pub fn log(&self, event: AuditEvent) {
        if let Err(e) = self.sink.emit(&event) {
            warn!(
                action = %event.action,
                error = %e,
                "audit event dropped: sink write failed"
            );
        }
    }

    /// Run `op` and emit exactly one audit event carrying its outcome and
    /// duration. The result — success value or error — is returned
    /// unchanged, so wrapping is transparent to the caller.
    pub fn with_audit<T, F>(&self, action: AuditAction, ctx: AuditContext, op: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let started = Instant::now();
        let result = op();
        let duration_ms = started.elapsed().as_millis() as u64;

        let mut event = AuditEvent::new(action).duration_ms(duration_ms);
        if let Some(actor) = ctx.actor {
            event = event.actor(actor);
        }
        if let Some(target) = ctx.target {
            event = event.target(target);
        }
        if let Some(meta) = &ctx.meta {
            event = event.meta(meta);
        }
        event = match &result {
            Ok(_) => event.success(true),
            Err(e) => event.error(e.to_string()),
        };
        self.log(event);

        result
    }
}
