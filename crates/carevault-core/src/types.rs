// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the CareVault security layer.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use uuid::Uuid;

/// Unique identifier for an actor (any authenticated user of the platform).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(pub Uuid);

impl ActorId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ActorId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Platform roles. The security layer does not enforce authorization — roles
/// appear here only so audit events can record who acted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Mother,
    Doctor,
    Midwife,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mother => "mother",
            Self::Doctor => "doctor",
            Self::Midwife => "midwife",
            Self::Admin => "admin",
        }
    }
}

/// Network metadata extracted from an inbound request.
///
/// Carried into audit events and used to derive rate-limit identifiers. The
/// HTTP layer constructs one of these per request; the security core never
/// touches transport types directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMeta {
    /// Remote peer address, if known.
    pub ip: Option<IpAddr>,
    /// Client user agent string, if supplied.
    pub user_agent: Option<String>,
}

impl RequestMeta {
    pub fn new(ip: IpAddr, user_agent: Option<String>) -> Self {
        Self {
            ip: Some(ip),
            user_agent,
        }
    }

    /// Metadata for requests with no usable network origin (internal jobs,
    /// CLI invocations).
    pub fn anonymous() -> Self {
        Self {
            ip: None,
            user_agent: None,
        }
    }

    /// Rate-limit identifier for this request origin, e.g. `"ip:10.0.0.7"`.
    /// Origins with no address share the `"ip:unknown"` bucket.
    pub fn rate_key(&self) -> String {
        match self.ip {
            Some(ip) => format!("ip:{ip}"),
            None => "ip:unknown".to_owned(),
        }
    }
}
