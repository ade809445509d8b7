//! Hash-chained immutable audit events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed set of auditable event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    MatchCreated,
    MatchUpdated,
    StatusChanged,
    ConfidenceUpdated,
    ManualReview,
    ApprovalGranted,
    ApprovalDenied,
    ToleranceApplied,
    ExceptionCreated,
    UserFeedback,
}

impl AuditEventType {
    /// Stable wire name of the event type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MatchCreated => "match_created",
            Self::MatchUpdated => "match_updated",
            Self::StatusChanged => "status_changed",
            Self::ConfidenceUpdated => "confidence_updated",
            Self::ManualReview => "manual_review",
            Self::ApprovalGranted => "approval_granted",
            Self::ApprovalDenied => "approval_denied",
            Self::ToleranceApplied => "tolerance_applied",
            Self::ExceptionCreated => "exception_created",
            Self::UserFeedback => "user_feedback",
        }
    }
}

/// Actor context captured on every audit event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditActor {
    /// Acting user, if any (system events carry none)
    pub user_id: Option<Uuid>,

    /// Role of the acting user
    pub role: Option<String>,

    /// Source IP address
    pub ip_address: Option<String>,

    /// Client user agent
    pub user_agent: Option<String>,
}

impl AuditActor {
    /// Actor for engine-originated events.
    pub fn system() -> Self {
        Self::default()
    }

    /// Actor for a user-originated event.
    pub fn user(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::default()
        }
    }
}

/// An immutable, hash-chained audit event for a match result.
///
/// `event_hash` covers the event type, decision factors, timestamp, and the
/// previous event's hash for the same match result, so any mutation breaks
/// chain verification. Events are append-only and outlive their match results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Event identifier
    pub id: Uuid,

    /// Owning tenant
    pub tenant_id: Uuid,

    /// Match result this event belongs to
    pub match_result_id: Uuid,

    /// Event type
    pub event_type: AuditEventType,

    /// Human-readable description
    pub event_description: String,

    /// Factors behind the decision, keyed by factor name
    pub decision_factors: serde_json::Value,

    /// Version of the algorithm that produced the event
    pub algorithm_version: String,

    /// Per-factor confidence breakdown
    pub confidence_breakdown: serde_json::Value,

    /// Previous values for update events
    pub old_values: Option<serde_json::Value>,

    /// New values for update events
    pub new_values: Option<serde_json::Value>,

    /// Acting context
    pub actor: AuditActor,

    /// When the event occurred
    pub occurred_at: DateTime<Utc>,

    /// Chain hash over (factors, type, timestamp, prior hash)
    pub event_hash: String,
}

/// A new audit event before it is chained and persisted.
///
/// The storage layer computes `event_hash` at append time so the chain is
/// serialized per `match_result_id`.
#[derive(Debug, Clone)]
pub struct NewAuditEvent {
    pub tenant_id: Uuid,
    pub match_result_id: Uuid,
    pub event_type: AuditEventType,
    pub event_description: String,
    pub decision_factors: serde_json::Value,
    pub algorithm_version: String,
    pub confidence_breakdown: serde_json::Value,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
    pub actor: AuditActor,
}

impl NewAuditEvent {
    /// Create a new event with empty factor maps.
    pub fn new(
        tenant_id: Uuid,
        match_result_id: Uuid,
        event_type: AuditEventType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id,
            match_result_id,
            event_type,
            event_description: description.into(),
            decision_factors: serde_json::Value::Object(serde_json::Map::new()),
            algorithm_version: "1.0.0".to_string(),
            confidence_breakdown: serde_json::Value::Object(serde_json::Map::new()),
            old_values: None,
            new_values: None,
            actor: AuditActor::system(),
        }
    }

    /// Attach decision factors.
    pub fn with_factors(mut self, factors: serde_json::Value) -> Self {
        self.decision_factors = factors;
        self
    }

    /// Attach the confidence breakdown.
    pub fn with_breakdown(mut self, breakdown: serde_json::Value) -> Self {
        self.confidence_breakdown = breakdown;
        self
    }

    /// Set the algorithm version.
    pub fn with_algorithm_version(mut self, version: impl Into<String>) -> Self {
        self.algorithm_version = version.into();
        self
    }

    /// Set the acting context.
    pub fn with_actor(mut self, actor: AuditActor) -> Self {
        self.actor = actor;
        self
    }

    /// Finalize into a stored event with the given timestamp and chain hash.
    pub fn into_event(self, occurred_at: DateTime<Utc>, event_hash: String) -> AuditEvent {
        AuditEvent {
            id: Uuid::new_v4(),
            tenant_id: self.tenant_id,
            match_result_id: self.match_result_id,
            event_type: self.event_type,
            event_description: self.event_description,
            decision_factors: self.decision_factors,
            algorithm_version: self.algorithm_version,
            confidence_breakdown: self.confidence_breakdown,
            old_values: self.old_values,
            new_values: self.new_values,
            actor: self.actor,
            occurred_at,
            event_hash,
        }
    }
}
