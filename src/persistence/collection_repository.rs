//! Collection ledger repository.
//!
//! The trait is the seam between reconciliation and storage; tests can
//! substitute an in-memory SQLite pool or a mock. Settlement and chargeback
//! writes each run inside a single transaction so a run commits all of its
//! matched updates or none of them.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::QueryBuilder;
use tracing::{debug, error};

use super::models::{ChargebackNote, CollectionRecord, CreateCollectionRecord, SettlementUpdate};
use super::DbPool;
use crate::domain::errors::SyncError;

#[async_trait]
pub trait CollectionRepository: Send + Sync {
    /// Inserts a new ledger row at collection time.
    async fn create(&self, record: CreateCollectionRecord) -> Result<CollectionRecord, SyncError>;

    /// Bulk lookup by provider transaction id. One query regardless of how
    /// many ids are requested; ids with no ledger row are simply absent from
    /// the result.
    async fn find_by_transaction_ids(
        &self,
        ids: &[String],
    ) -> Result<Vec<CollectionRecord>, SyncError>;

    /// Stamps settlement details onto existing rows in one transaction.
    /// Returns the number of rows actually updated. Rows are never created.
    async fn apply_settlement_updates(
        &self,
        updates: &[SettlementUpdate],
    ) -> Result<u64, SyncError>;

    /// Annotates existing rows with chargeback notes in one transaction.
    /// Returns the number of rows actually updated.
    async fn apply_chargeback_notes(&self, notes: &[ChargebackNote]) -> Result<u64, SyncError>;

    /// Total ledger size.
    async fn count(&self) -> Result<i64, SyncError>;
}

pub struct SqliteCollectionRepository {
    pool: DbPool,
}

impl SqliteCollectionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CollectionRepository for SqliteCollectionRepository {
    async fn create(&self, record: CreateCollectionRecord) -> Result<CollectionRecord, SyncError> {
        let now = Utc::now();
        let created = sqlx::query_as::<_, CollectionRecord>(
            r#"
            INSERT INTO collection_records (
                external_transaction_id, region_code, amount, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?4)
            RETURNING *
            "#,
        )
        .bind(&record.external_transaction_id)
        .bind(&record.region_code)
        .bind(record.amount)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to create collection record: {}", e);
            SyncError::Persistence(format!("failed to create collection record: {}", e))
        })?;

        debug!(
            "Created collection record {} for transaction {}",
            created.id, created.external_transaction_id
        );
        Ok(created)
    }

    async fn find_by_transaction_ids(
        &self,
        ids: &[String],
    ) -> Result<Vec<CollectionRecord>, SyncError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::new(
            "SELECT * FROM collection_records WHERE external_transaction_id IN (",
        );
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");

        let records = builder
            .build_query_as::<CollectionRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to look up collection records: {}", e);
                SyncError::Persistence(format!("failed to look up collection records: {}", e))
            })?;

        debug!(
            "Ledger lookup: {} of {} transaction ids matched",
            records.len(),
            ids.len()
        );
        Ok(records)
    }

    async fn apply_settlement_updates(
        &self,
        updates: &[SettlementUpdate],
    ) -> Result<u64, SyncError> {
        if updates.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to begin settlement transaction: {}", e);
            SyncError::Persistence(format!("failed to begin transaction: {}", e))
        })?;

        let now = Utc::now();
        let mut updated = 0u64;
        for update in updates {
            let rows = sqlx::query(
                r#"
                UPDATE collection_records
                SET settlement_id = ?1, settlement_sequence = ?2,
                    settlement_status = ?3, deposit_date = ?4,
                    period_from = ?5, period_to = ?6,
                    settled_amount = ?7, gross_amount = ?8, net_amount = ?9,
                    commission = ?10, tax = ?11, notes = ?12, updated_at = ?13
                WHERE external_transaction_id = ?14
                "#,
            )
            .bind(update.settlement_id)
            .bind(update.settlement_sequence)
            .bind(&update.settlement_status)
            .bind(update.deposit_date)
            .bind(update.period_from)
            .bind(update.period_to)
            .bind(update.settled_amount)
            .bind(update.gross_amount)
            .bind(update.net_amount)
            .bind(update.commission)
            .bind(update.tax)
            .bind(&update.note)
            .bind(now)
            .bind(&update.external_transaction_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                error!(
                    "Failed to apply settlement update for transaction {}: {}",
                    update.external_transaction_id, e
                );
                SyncError::Persistence(format!("failed to apply settlement update: {}", e))
            })?
            .rows_affected();
            updated += rows;
        }

        tx.commit().await.map_err(|e| {
            error!("Failed to commit settlement transaction: {}", e);
            SyncError::Persistence(format!("failed to commit transaction: {}", e))
        })?;

        debug!("Applied {} settlement updates", updated);
        Ok(updated)
    }

    async fn apply_chargeback_notes(&self, notes: &[ChargebackNote]) -> Result<u64, SyncError> {
        if notes.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to begin chargeback transaction: {}", e);
            SyncError::Persistence(format!("failed to begin transaction: {}", e))
        })?;

        let now = Utc::now();
        let mut updated = 0u64;
        for note in notes {
            let rows = sqlx::query(
                r#"
                UPDATE collection_records
                SET notes = ?1, updated_at = ?2
                WHERE external_transaction_id = ?3
                "#,
            )
            .bind(&note.note)
            .bind(now)
            .bind(&note.external_transaction_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                error!(
                    "Failed to apply chargeback note for transaction {}: {}",
                    note.external_transaction_id, e
                );
                SyncError::Persistence(format!("failed to apply chargeback note: {}", e))
            })?
            .rows_affected();
            updated += rows;
        }

        tx.commit().await.map_err(|e| {
            error!("Failed to commit chargeback transaction: {}", e);
            SyncError::Persistence(format!("failed to commit transaction: {}", e))
        })?;

        debug!("Applied {} chargeback notes", updated);
        Ok(updated)
    }

    async fn count(&self) -> Result<i64, SyncError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM collection_records")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to count collection records: {}", e);
                SyncError::Persistence(format!("failed to count collection records: {}", e))
            })?;
        Ok(row.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::init_database;

    async fn repo_with_records(ids: &[&str]) -> SqliteCollectionRepository {
        let pool = init_database("sqlite::memory:").await.unwrap();
        let repo = SqliteCollectionRepository::new(pool);
        for (i, id) in ids.iter().enumerate() {
            repo.create(CreateCollectionRecord {
                external_transaction_id: id.to_string(),
                region_code: "A".to_string(),
                amount: 100.0 + i as f64,
            })
            .await
            .unwrap();
        }
        repo
    }

    fn update_for(id: &str) -> SettlementUpdate {
        SettlementUpdate {
            external_transaction_id: id.to_string(),
            settlement_id: 9001,
            settlement_sequence: Some(12),
            settlement_status: "Deposited".to_string(),
            deposit_date: chrono::NaiveDate::from_ymd_opt(2025, 1, 9),
            period_from: chrono::NaiveDate::from_ymd_opt(2025, 1, 1),
            period_to: chrono::NaiveDate::from_ymd_opt(2025, 1, 7),
            settled_amount: 100.0,
            gross_amount: Some(250.0),
            net_amount: Some(240.0),
            commission: Some(8.0),
            tax: Some(2.0),
            note: "Settled - stl#9001 seq#12 Deposited".to_string(),
        }
    }

    #[tokio::test]
    async fn test_bulk_lookup_returns_only_known_ids() {
        let repo = repo_with_records(&["555", "556"]).await;

        let found = repo
            .find_by_transaction_ids(&[
                "555".to_string(),
                "556".to_string(),
                "999".to_string(),
            ])
            .await
            .unwrap();

        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|r| r.external_transaction_id != "999"));
    }

    #[tokio::test]
    async fn test_empty_lookup_issues_no_query() {
        let repo = repo_with_records(&[]).await;
        let found = repo.find_by_transaction_ids(&[]).await.unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_settlement_update_stamps_existing_row() {
        let repo = repo_with_records(&["555"]).await;

        let updated = repo
            .apply_settlement_updates(&[update_for("555")])
            .await
            .unwrap();
        assert_eq!(updated, 1);

        let records = repo
            .find_by_transaction_ids(&["555".to_string()])
            .await
            .unwrap();
        let record = &records[0];
        assert_eq!(record.settlement_id, Some(9001));
        assert_eq!(record.settlement_status.as_deref(), Some("Deposited"));
        assert_eq!(
            record.period_from,
            chrono::NaiveDate::from_ymd_opt(2025, 1, 1)
        );
        assert_eq!(record.period_to, chrono::NaiveDate::from_ymd_opt(2025, 1, 7));
        assert_eq!(record.gross_amount, Some(250.0));
        assert_eq!(record.net_amount, Some(240.0));
        assert_eq!(record.commission, Some(8.0));
        assert_eq!(record.tax, Some(2.0));
        assert_eq!(
            record.notes.as_deref(),
            Some("Settled - stl#9001 seq#12 Deposited")
        );
    }

    #[tokio::test]
    async fn test_settlement_update_never_creates_rows() {
        let repo = repo_with_records(&["555"]).await;

        let updated = repo
            .apply_settlement_updates(&[update_for("unknown-id")])
            .await
            .unwrap();

        assert_eq!(updated, 0);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_settlement_update_is_idempotent() {
        let repo = repo_with_records(&["555"]).await;

        repo.apply_settlement_updates(&[update_for("555")]).await.unwrap();
        let first = repo
            .find_by_transaction_ids(&["555".to_string()])
            .await
            .unwrap();

        repo.apply_settlement_updates(&[update_for("555")]).await.unwrap();
        let second = repo
            .find_by_transaction_ids(&["555".to_string()])
            .await
            .unwrap();

        assert_eq!(first[0].settlement_id, second[0].settlement_id);
        assert_eq!(first[0].settlement_status, second[0].settlement_status);
        assert_eq!(first[0].period_from, second[0].period_from);
        assert_eq!(first[0].period_to, second[0].period_to);
        assert_eq!(first[0].gross_amount, second[0].gross_amount);
        assert_eq!(first[0].net_amount, second[0].net_amount);
        assert_eq!(first[0].commission, second[0].commission);
        assert_eq!(first[0].tax, second[0].tax);
        assert_eq!(first[0].notes, second[0].notes);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_chargeback_note_annotates_row() {
        let repo = repo_with_records(&["777"]).await;

        let updated = repo
            .apply_chargeback_notes(&[ChargebackNote {
                external_transaction_id: "777".to_string(),
                note: "Chargeback #7 Pending".to_string(),
            }])
            .await
            .unwrap();

        assert_eq!(updated, 1);
        let records = repo
            .find_by_transaction_ids(&["777".to_string()])
            .await
            .unwrap();
        assert_eq!(records[0].notes.as_deref(), Some("Chargeback #7 Pending"));
    }
}
