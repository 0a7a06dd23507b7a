//! Audit trail
//!
//! The ledger reports every entity it creates, updates or deletes to an
//! [`AuditNotifier`]. Records are delivered in the background to an
//! [`AuditSink`]; a failing sink never affects the operation that produced
//! the record.
//!
//! Persisted traces form a SHA-256 hash chain, so tampering with or removing
//! a trace is detectable with [`verify_chain`].

mod notifier;
mod sink;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::OperationContext;

pub use notifier::AuditNotifier;
pub use sink::{AuditSink, LogAuditSink, MemoryAuditSink, PgAuditSink};

/// Keys whose values never reach the audit trail
const FILTERED_KEYS: &[&str] = &[
    "password",
    "remember_token",
    "token",
    "api_token",
    "photo",
    "file",
    "blob",
    "avatar",
];

const MAX_STRING_CHARS: usize = 1000;
const MAX_KEYS: usize = 50;
const MAX_DEPTH: usize = 2;

/// Hash preceding the first trace of a chain
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Audit action types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    #[serde(rename = "ajout")]
    Created,
    #[serde(rename = "mise_a_jour")]
    Updated,
    #[serde(rename = "suppression")]
    Deleted,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Created => "ajout",
            AuditAction::Updated => "mise_a_jour",
            AuditAction::Deleted => "suppression",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ajout" => Ok(AuditAction::Created),
            "mise_a_jour" => Ok(AuditAction::Updated),
            "suppression" => Ok(AuditAction::Deleted),
            other => Err(format!("unknown audit action: {other}")),
        }
    }
}

/// One audit trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub action: AuditAction,
    pub model_type: String,
    pub model_id: String,
    /// Business operation that caused the change, e.g. "deposit" or "transfer"
    pub reason: Option<String>,
    pub old_values: Option<Value>,
    pub new_values: Option<Value>,
    pub actor_id: Option<i64>,
    pub correlation_id: Option<Uuid>,
    pub client_ip: Option<IpAddr>,
    pub user_agent: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Builder for creating audit records
#[derive(Debug, Clone)]
pub struct AuditRecordBuilder {
    action: AuditAction,
    model_type: String,
    model_id: String,
    reason: Option<String>,
    old_values: Option<Value>,
    new_values: Option<Value>,
}

impl AuditRecordBuilder {
    pub fn new(action: AuditAction, model_type: &str, model_id: impl ToString) -> Self {
        Self {
            action,
            model_type: model_type.to_string(),
            model_id: model_id.to_string(),
            reason: None,
            old_values: None,
            new_values: None,
        }
    }

    pub fn created(model_type: &str, model_id: impl ToString) -> Self {
        Self::new(AuditAction::Created, model_type, model_id)
    }

    pub fn updated(model_type: &str, model_id: impl ToString) -> Self {
        Self::new(AuditAction::Updated, model_type, model_id)
    }

    pub fn deleted(model_type: &str, model_id: impl ToString) -> Self {
        Self::new(AuditAction::Deleted, model_type, model_id)
    }

    pub fn reason(mut self, reason: &str) -> Self {
        self.reason = Some(reason.to_string());
        self
    }

    /// Set the state before the change
    pub fn old_values<T: Serialize>(mut self, state: &T) -> Self {
        self.old_values = serde_json::to_value(state).ok();
        self
    }

    /// Set the state after the change
    pub fn new_values<T: Serialize>(mut self, state: &T) -> Self {
        self.new_values = serde_json::to_value(state).ok();
        self
    }

    /// Finish the record.
    ///
    /// Updates keep only the fields whose value changed; an update that
    /// changed nothing yields `None`.
    pub fn build(self, context: &OperationContext) -> Option<AuditRecord> {
        let (old_values, new_values) = match self.action {
            AuditAction::Updated => {
                let (old, new) = changed_only(self.old_values, self.new_values);
                if old.is_none() && new.is_none() {
                    return None;
                }
                (old, new)
            }
            _ => (self.old_values, self.new_values),
        };

        Some(AuditRecord {
            action: self.action,
            model_type: self.model_type,
            model_id: self.model_id,
            reason: self.reason,
            old_values: old_values.map(|v| sanitize_values(&v)),
            new_values: new_values.map(|v| sanitize_values(&v)),
            actor_id: context.actor_id(),
            correlation_id: context.correlation_id,
            client_ip: context.client_ip,
            user_agent: context.user_agent.clone(),
            // stored as TIMESTAMPTZ; keep hashes stable across a round trip
            recorded_at: Utc::now().trunc_subsecs(6),
        })
    }
}

/// Restrict an update to the keys that actually differ
fn changed_only(old: Option<Value>, new: Option<Value>) -> (Option<Value>, Option<Value>) {
    match (old, new) {
        (Some(Value::Object(old)), Some(Value::Object(new))) => {
            let mut old_changed = Map::new();
            let mut new_changed = Map::new();
            for (key, value) in new {
                let previous = old.get(&key).cloned().unwrap_or(Value::Null);
                if previous != value {
                    old_changed.insert(key.clone(), previous);
                    new_changed.insert(key, value);
                }
            }
            if new_changed.is_empty() {
                (None, None)
            } else {
                (Some(Value::Object(old_changed)), Some(Value::Object(new_changed)))
            }
        }
        (old, new) if old == new => (None, None),
        other => other,
    }
}

// =========================================================================
// Value sanitization
// =========================================================================

/// Strip secrets, binary data and oversized content from a snapshot.
pub fn sanitize_values(value: &Value) -> Value {
    sanitize_at(value, 0)
}

fn sanitize_at(value: &Value, depth: usize) -> Value {
    match value {
        Value::Object(map) => {
            if depth >= MAX_DEPTH {
                return Value::String("[array]".to_string());
            }
            let mut out = Map::new();
            for (key, value) in map.iter().take(MAX_KEYS) {
                let clean = if FILTERED_KEYS.contains(&key.to_ascii_lowercase().as_str()) {
                    Value::String("[filtered]".to_string())
                } else {
                    sanitize_at(value, depth + 1)
                };
                out.insert(key.clone(), clean);
            }
            Value::Object(out)
        }
        Value::Array(items) => {
            if depth >= MAX_DEPTH {
                return Value::String("[array]".to_string());
            }
            Value::Array(
                items
                    .iter()
                    .take(MAX_KEYS)
                    .map(|item| sanitize_at(item, depth + 1))
                    .collect(),
            )
        }
        Value::String(s) => Value::String(sanitize_string(s)),
        other => other.clone(),
    }
}

fn sanitize_string(s: &str) -> String {
    if s.chars().any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t')) {
        return "[binary]".to_string();
    }

    let trimmed = s.trim();
    if trimmed.chars().count() > MAX_STRING_CHARS {
        let head: String = trimmed.chars().take(MAX_STRING_CHARS).collect();
        return format!("{head}... (truncated)");
    }
    trimmed.to_string()
}

// =========================================================================
// Hash chain
// =========================================================================

/// A persisted trace with its position in the hash chain
#[derive(Debug, Clone, PartialEq)]
pub struct ChainedRecord {
    pub sequence: i64,
    pub record: AuditRecord,
    pub previous_hash: String,
    pub current_hash: String,
}

/// Hash of a trace given the hash of the trace before it
pub fn chain_hash(sequence: i64, record: &AuditRecord, previous_hash: &str) -> String {
    use sha2::{Digest, Sha256};

    let json = |v: &Option<Value>| v.as_ref().map(|v| v.to_string()).unwrap_or_default();
    let input = format!(
        "{}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
        sequence,
        record.action,
        record.model_type,
        record.model_id,
        record.reason.as_deref().unwrap_or_default(),
        record.actor_id.map(|id| id.to_string()).unwrap_or_default(),
        json(&record.old_values),
        json(&record.new_values),
        record.recorded_at.timestamp_micros(),
        previous_hash,
    );

    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Append `record` after `previous` (or at the start of the chain)
pub fn chain_after(previous: Option<(i64, &str)>, record: AuditRecord) -> ChainedRecord {
    let (sequence, previous_hash) = match previous {
        Some((sequence, hash)) => (sequence + 1, hash.to_string()),
        None => (1, GENESIS_HASH.to_string()),
    };
    let current_hash = chain_hash(sequence, &record, &previous_hash);
    ChainedRecord {
        sequence,
        record,
        previous_hash,
        current_hash,
    }
}

/// Result of hash chain verification
#[derive(Debug, Clone, PartialEq)]
pub struct ChainVerificationResult {
    pub is_valid: bool,
    pub entries_checked: u64,
    pub first_invalid_sequence: Option<i64>,
    pub expected_hash: Option<String>,
    pub actual_hash: Option<String>,
}

/// Verify linkage and content hashes of a chain ordered by sequence
pub fn verify_chain(records: &[ChainedRecord]) -> ChainVerificationResult {
    let mut previous_hash = GENESIS_HASH.to_string();
    let mut checked = 0u64;

    for chained in records {
        if chained.previous_hash != previous_hash {
            return ChainVerificationResult {
                is_valid: false,
                entries_checked: checked,
                first_invalid_sequence: Some(chained.sequence),
                expected_hash: Some(previous_hash),
                actual_hash: Some(chained.previous_hash.clone()),
            };
        }

        let calculated = chain_hash(chained.sequence, &chained.record, &chained.previous_hash);
        if calculated != chained.current_hash {
            return ChainVerificationResult {
                is_valid: false,
                entries_checked: checked,
                first_invalid_sequence: Some(chained.sequence),
                expected_hash: Some(calculated),
                actual_hash: Some(chained.current_hash.clone()),
            };
        }

        previous_hash = chained.current_hash.clone();
        checked += 1;
    }

    ChainVerificationResult {
        is_valid: true,
        entries_checked: checked,
        first_invalid_sequence: None,
        expected_hash: None,
        actual_hash: None,
    }
}

/// Audit errors
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt audit trace: {0}")]
    Corrupt(String),
}

// =========================================================================
// Tests
// =========================================================================
