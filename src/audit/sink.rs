//! Audit sinks

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

use super::{
    chain_after, verify_chain, AuditAction, AuditError, AuditRecord, ChainVerificationResult,
    ChainedRecord,
};

/// Destination for audit records
pub trait AuditSink: Send + Sync + 'static {
    fn record(&self, record: AuditRecord) -> impl Future<Output = Result<(), AuditError>> + Send;
}

// =========================================================================
// PostgreSQL
// =========================================================================

/// Writes traces to the `audit_traces` table, extending the hash chain.
#[derive(Debug, Clone)]
pub struct PgAuditSink {
    pool: PgPool,
}

type TraceTuple = (
    i64,
    String,
    String,
    String,
    Option<String>,
    Option<serde_json::Value>,
    Option<serde_json::Value>,
    Option<i64>,
    Option<Uuid>,
    Option<String>,
    Option<String>,
    DateTime<Utc>,
    String,
    String,
);

impl PgAuditSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Verify the integrity of the first `limit` traces
    pub async fn verify_hash_chain(&self, limit: Option<i64>) -> Result<ChainVerificationResult, AuditError> {
        let rows: Vec<TraceTuple> = sqlx::query_as(
            r#"
            SELECT sequence_number, action, model_type, model_id, reason,
                   old_values, new_values, user_id, correlation_id, ip, user_agent,
                   created_at, previous_hash, current_hash
            FROM audit_traces
            ORDER BY sequence_number ASC
            LIMIT $1
            "#,
        )
        .bind(limit.unwrap_or(1000))
        .fetch_all(&self.pool)
        .await?;

        let chain = rows
            .into_iter()
            .map(|(
                sequence, action, model_type, model_id, reason,
                old_values, new_values, actor_id, correlation_id, ip, user_agent,
                recorded_at, previous_hash, current_hash,
            )| {
                Ok(ChainedRecord {
                    sequence,
                    record: AuditRecord {
                        action: action.parse::<AuditAction>().map_err(AuditError::Corrupt)?,
                        model_type,
                        model_id,
                        reason,
                        old_values,
                        new_values,
                        actor_id,
                        correlation_id,
                        client_ip: ip.and_then(|s| s.parse().ok()),
                        user_agent,
                        recorded_at,
                    },
                    previous_hash,
                    current_hash,
                })
            })
            .collect::<Result<Vec<_>, AuditError>>()?;

        Ok(verify_chain(&chain))
    }
}

impl AuditSink for PgAuditSink {
    async fn record(&self, record: AuditRecord) -> Result<(), AuditError> {
        let mut tx = self.pool.begin().await?;

        // Serialize chain extension across writers
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext('audit_traces'))")
            .execute(&mut *tx)
            .await?;

        let last: Option<(i64, String)> = sqlx::query_as(
            "SELECT sequence_number, current_hash FROM audit_traces ORDER BY sequence_number DESC LIMIT 1",
        )
        .fetch_optional(&mut *tx)
        .await?;

        let chained = chain_after(last.as_ref().map(|(seq, hash)| (*seq, hash.as_str())), record);
        let r = &chained.record;

        sqlx::query(
            r#"
            INSERT INTO audit_traces (
                sequence_number, action, model_type, model_id, reason,
                old_values, new_values, user_id, correlation_id, ip, user_agent,
                created_at, previous_hash, current_hash
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(chained.sequence)
        .bind(r.action.as_str())
        .bind(&r.model_type)
        .bind(&r.model_id)
        .bind(&r.reason)
        .bind(&r.old_values)
        .bind(&r.new_values)
        .bind(r.actor_id)
        .bind(r.correlation_id)
        .bind(r.client_ip.map(|ip| ip.to_string()))
        .bind(&r.user_agent)
        .bind(r.recorded_at)
        .bind(&chained.previous_hash)
        .bind(&chained.current_hash)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(
            sequence = chained.sequence,
            action = %r.action,
            model_type = %r.model_type,
            "Audit trace written"
        );
        Ok(())
    }
}

// =========================================================================
// Tracing
// =========================================================================

/// Emits each record as a structured log line
#[derive(Debug, Clone, Default)]
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    async fn record(&self, record: AuditRecord) -> Result<(), AuditError> {
        let old_values = record.old_values.map(|v| v.to_string()).unwrap_or_default();
        let new_values = record.new_values.map(|v| v.to_string()).unwrap_or_default();

        tracing::info!(
            target: "audit",
            action = %record.action,
            model_type = %record.model_type,
            model_id = %record.model_id,
            reason = record.reason.as_deref().unwrap_or(""),
            actor_id = ?record.actor_id,
            correlation_id = ?record.correlation_id,
            old_values = %old_values,
            new_values = %new_values,
            "audit"
        );
        Ok(())
    }
}

// =========================================================================
// Memory
// =========================================================================

/// Keeps a hash-chained copy of every record; used by tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryAuditSink {
    chain: Arc<Mutex<Vec<ChainedRecord>>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.chained().into_iter().map(|c| c.record).collect()
    }

    pub fn chained(&self) -> Vec<ChainedRecord> {
        self.chain.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl AuditSink for MemoryAuditSink {
    async fn record(&self, record: AuditRecord) -> Result<(), AuditError> {
        let mut chain = self.chain.lock().unwrap_or_else(PoisonError::into_inner);
        let chained = chain_after(
            chain.last().map(|last| (last.sequence, last.current_hash.as_str())),
            record,
        );
        chain.push(chained);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditRecordBuilder;
    use crate::domain::OperationContext;

    #[tokio::test]
    async fn test_memory_sink_builds_valid_chain() {
        let sink = MemoryAuditSink::new();
        for id in 1..=3 {
            let record = AuditRecordBuilder::deleted("Transaction", id)
                .old_values(&serde_json::json!({"id": id}))
                .build(&OperationContext::new())
                .unwrap();
            sink.record(record).await.unwrap();
        }

        let chain = sink.chained();
        assert_eq!(chain.len(), 3);
        assert_eq!(chain[2].sequence, 3);
        assert!(verify_chain(&chain).is_valid);
    }

    #[tokio::test]
    async fn test_log_sink_accepts_records() {
        let record = AuditRecordBuilder::created("Account", 1)
            .build(&OperationContext::new())
            .unwrap();
        assert!(LogAuditSink.record(record).await.is_ok());
    }
}
