//! Authorization audit logging.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use warden_common_core::ActorId;

/// A single authorization decision.
#[derive(Debug, Serialize)]
pub struct AuthzAuditEvent {
    pub timestamp: DateTime<Utc>,
    /// `None` for unauthenticated callers.
    pub actor_id: Option<ActorId>,
    pub required: Vec<String>,
    pub granted: bool,
    pub reason: Option<String>,
}

impl AuthzAuditEvent {
    pub fn new(actor_id: Option<ActorId>, required: &[&str], granted: bool, reason: Option<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            actor_id,
            required: required.iter().map(|s| s.to_string()).collect(),
            granted,
            reason,
        }
    }

    pub fn log(&self) {
        let actor = self
            .actor_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "guest".to_string());

        if self.granted {
            debug!(
                event = "authz_granted",
                actor = %actor,
                required = ?self.required,
                "Authorization granted"
            );
        } else {
            debug!(
                event = "authz_denied",
                actor = %actor,
                required = ?self.required,
                reason = ?self.reason,
                "Authorization denied"
            );
        }
    }
}

/// Log an authorization decision.
pub fn log_authz(actor_id: Option<ActorId>, required: &[&str], granted: bool, reason: Option<&str>) {
    AuthzAuditEvent::new(actor_id, required, granted, reason.map(String::from)).log();
}
