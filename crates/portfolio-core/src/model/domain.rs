// Registrar-neutral domain and DNS record shapes.
//
// Registrar clients normalise their API payloads into these types so the
// sync handlers never see provider-specific formats.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Domain lifecycle status as reported by the registrar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainStatus {
    Active,
    Expired,
    Pending,
    PendingTransfer,
    Redemption,
    Locked,
    Unknown,
}

/// A domain registered at an external registrar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    /// Fully qualified domain name
    pub name: String,
    /// Provider type that reported the domain
    pub registrar: String,
    /// Lifecycle status
    pub status: DomainStatus,
    /// Expiry date, when the registrar exposes it
    pub expires_at: Option<DateTime<Utc>>,
    /// Whether auto-renew is on
    pub auto_renew: bool,
    /// Whether the transfer lock is on
    pub locked: bool,
    /// Current nameservers
    #[serde(default)]
    pub nameservers: Vec<String>,
}

impl Domain {
    /// Create an active domain with no extra metadata
    pub fn new(name: impl Into<String>, registrar: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            registrar: registrar.into(),
            status: DomainStatus::Active,
            expires_at: None,
            auto_renew: false,
            locked: false,
            nameservers: Vec::new(),
        }
    }
}

/// A DNS record held at the registrar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    /// Record name (e.g. "www" or "@")
    pub name: String,
    /// Record type (A, AAAA, CNAME, MX, TXT, ...)
    pub record_type: String,
    /// Record value
    pub value: String,
    /// Time-to-live in seconds
    pub ttl: Option<u32>,
    /// Priority for MX/SRV records
    pub priority: Option<u16>,
}
