//! Settlement audit trail.
//!
//! Append-only: one row per settlement processed per run, so reruns over the
//! same range add rows rather than rewriting history. Audit failures are
//! reported to the caller, which logs and continues; they never fail a sync.

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, error};

use super::models::{CreateSettlementAudit, SettlementAuditRecord};
use super::DbPool;
use crate::domain::errors::SyncError;

#[async_trait]
pub trait SettlementAuditRepository: Send + Sync {
    /// Appends one audit row.
    async fn append(
        &self,
        audit: CreateSettlementAudit,
    ) -> Result<SettlementAuditRecord, SyncError>;

    /// Most recent audit rows, newest first.
    async fn recent(&self, limit: i64) -> Result<Vec<SettlementAuditRecord>, SyncError>;
}

pub struct SqliteSettlementAuditRepository {
    pool: DbPool,
}

impl SqliteSettlementAuditRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettlementAuditRepository for SqliteSettlementAuditRepository {
    async fn append(
        &self,
        audit: CreateSettlementAudit,
    ) -> Result<SettlementAuditRecord, SyncError> {
        let record = sqlx::query_as::<_, SettlementAuditRecord>(
            r#"
            INSERT INTO settlement_audit (
                region_code, settlement_id, settlement_sequence, settlement_status,
                period_from, period_to, gross_amount, net_amount, item_count,
                processed_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            RETURNING *
            "#,
        )
        .bind(&audit.region_code)
        .bind(audit.settlement_id)
        .bind(audit.settlement_sequence)
        .bind(&audit.settlement_status)
        .bind(audit.period_from)
        .bind(audit.period_to)
        .bind(audit.gross_amount)
        .bind(audit.net_amount)
        .bind(audit.item_count)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!(
                "Failed to append audit row for settlement {}: {}",
                audit.settlement_id, e
            );
            SyncError::Persistence(format!("failed to append audit row: {}", e))
        })?;

        debug!(
            "Audit row {} appended for settlement {} in region {}",
            record.id, record.settlement_id, record.region_code
        );
        Ok(record)
    }

    async fn recent(&self, limit: i64) -> Result<Vec<SettlementAuditRecord>, SyncError> {
        let records = sqlx::query_as::<_, SettlementAuditRecord>(
            "SELECT * FROM settlement_audit ORDER BY processed_at DESC, id DESC LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to fetch recent audit rows: {}", e);
            SyncError::Persistence(format!("failed to fetch audit rows: {}", e))
        })?;

        Ok(records)
    }
}
