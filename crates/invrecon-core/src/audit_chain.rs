//! Audit chain hashing.
//!
//! Each audit event's hash covers a canonical JSON rendering of its decision
//! factors, event type, timestamp, and the previous event's hash for the same
//! match result. The chain is the sole integrity mechanism for the audit log:
//! recomputing every link must reproduce the stored hashes.

use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};

use crate::models::{AuditEvent, AuditEventType};

/// Render a JSON value with object keys sorted lexicographically at every
/// level, so the same logical value always hashes identically.
pub fn canonical_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let body: Vec<String> = keys
                .into_iter()
                .map(|k| {
                    format!(
                        "{}:{}",
                        serde_json::Value::String(k.clone()),
                        canonical_json(&map[k])
                    )
                })
                .collect();
            format!("{{{}}}", body.join(","))
        }
        serde_json::Value::Array(items) => {
            let body: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", body.join(","))
        }
        other => other.to_string(),
    }
}

/// Compute the chain hash for one audit event.
///
/// `prior_hash` is the most recent event hash for the same match result, or
/// the empty string for the first event.
pub fn compute_event_hash(
    event_type: AuditEventType,
    decision_factors: &serde_json::Value,
    occurred_at: DateTime<Utc>,
    prior_hash: &str,
) -> String {
    let envelope = serde_json::json!({
        "event_type": event_type.as_str(),
        "decision_factors": decision_factors,
        "occurred_at": occurred_at.to_rfc3339_opts(SecondsFormat::Micros, true),
        "prior_hash": prior_hash,
    });

    let canonical = canonical_json(&envelope);
    let digest = Sha256::digest(canonical.as_bytes());
    hex::encode(digest)
}

/// Verify a stored chain for one match result, in append order.
///
/// Returns the index of the first event whose stored hash does not match the
/// recomputed value, or `None` when the chain is intact.
pub fn verify_chain(events: &[AuditEvent]) -> Option<usize> {
    let mut prior = String::new();
    for (idx, event) in events.iter().enumerate() {
        let expected = compute_event_hash(
            event.event_type,
            &event.decision_factors,
            event.occurred_at,
            &prior,
        );
        if expected != event.event_hash {
            return Some(idx);
        }
        prior = event.event_hash.clone();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewAuditEvent;
    use uuid::Uuid;

    #[test]
    fn test_canonical_json_sorts_keys() {
        let value = serde_json::json!({"b": 1, "a": {"z": true, "y": [1, 2]}});
        assert_eq!(
            canonical_json(&value),
            r#"{"a":{"y":[1,2],"z":true},"b":1}"#
        );
    }

    #[test]
    fn test_first_event_chains_from_empty_string() {
        let ts = Utc::now();
        let factors = serde_json::json!({"amount_exact": true});
        let hash = compute_event_hash(AuditEventType::MatchCreated, &factors, ts, "");

        // Deterministic: same inputs, same hash.
        assert_eq!(
            hash,
            compute_event_hash(AuditEventType::MatchCreated, &factors, ts, "")
        );
        assert_eq!(hash.len(), 64);
    }

    #[test]
    fn test_verify_chain_detects_tampering() {
        let tenant = Uuid::new_v4();
        let match_result = Uuid::new_v4();
        let mut events = Vec::new();
        let mut prior = String::new();

        for i in 0..3 {
            let new_event = NewAuditEvent::new(
                tenant,
                match_result,
                AuditEventType::MatchCreated,
                format!("event {}", i),
            )
            .with_factors(serde_json::json!({"seq": i}));
            let ts = Utc::now();
            let hash =
                compute_event_hash(new_event.event_type, &new_event.decision_factors, ts, &prior);
            prior = hash.clone();
            events.push(new_event.into_event(ts, hash));
        }

        assert_eq!(verify_chain(&events), None);

        // Mutate the middle event's factors; verification pinpoints it.
        events[1].decision_factors = serde_json::json!({"seq": 99});
        assert_eq!(verify_chain(&events), Some(1));
    }
}
