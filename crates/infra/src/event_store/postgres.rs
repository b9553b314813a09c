//! Postgres-backed event store.
//!
//! Persists event streams in an append-only `events` table with a unique
//! constraint on `(aggregate_id, sequence_number)`; a concurrent append
//! therefore fails at the database with a unique violation, which is mapped
//! to `EventStoreError::Concurrency`. The async sqlx methods are bridged into
//! the sync [`EventStore`] trait with the current tokio runtime handle.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use std::sync::Arc;
use tracing::instrument;

use procura_core::{AggregateId, ExpectedVersion, UserId};

use super::store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

/// Postgres append-only event store.
///
/// Optimistic concurrency: `append_events` checks the current stream version
/// (MAX(sequence_number)) inside a transaction and inserts with sequence
/// numbers starting at `current + 1`. If another transaction commits in
/// between, the unique constraint rejects the insert.
#[derive(Debug, Clone)]
pub struct PostgresEventStore {
    pool: Arc<PgPool>,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Load all events for an aggregate stream, in sequence order.
    #[instrument(skip(self), fields(aggregate_id = %aggregate_id), err)]
    pub async fn load_events(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                event_id,
                aggregate_id,
                aggregate_type,
                actor,
                sequence_number,
                event_type,
                event_version,
                occurred_at,
                payload
            FROM events
            WHERE aggregate_id = $1
            ORDER BY sequence_number ASC
            "#,
        )
        .bind(aggregate_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_events", e))?;

        let mut stored = Vec::with_capacity(rows.len());
        for row in rows {
            let event = StoredEventRow::from_row(&row).map_err(|e| {
                EventStoreError::InvalidAppend(format!("failed to deserialize event row: {e}"))
            })?;
            stored.push(event.into());
        }

        Ok(stored)
    }

    /// Append events with optimistic concurrency control.
    #[instrument(
        skip(self, events),
        fields(aggregate_id = %aggregate_id, event_count = events.len(), expected_version = ?expected_version),
        err
    )]
    pub async fn append_events(
        &self,
        aggregate_id: AggregateId,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        if events.is_empty() {
            return Ok(vec![]);
        }

        let aggregate_type = events[0].aggregate_type.clone();
        for (idx, e) in events.iter().enumerate() {
            if e.aggregate_id != aggregate_id {
                return Err(EventStoreError::InvalidAppend(format!(
                    "batch contains multiple aggregate_ids (index {idx})"
                )));
            }
            if e.aggregate_type != aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "batch contains multiple aggregate_types (index {idx})"
                )));
            }
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let (current_version, existing_type) = check_stream_version(&mut tx, aggregate_id).await?;

        if let Some(ref existing) = existing_type {
            if existing != &aggregate_type {
                tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "stream aggregate_type is '{existing}', attempted append with '{aggregate_type}'"
                )));
            }
        }

        if !expected_version.matches(current_version) {
            tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(EventStoreError::Concurrency(format!(
                "expected {expected_version:?}, found {current_version}"
            )));
        }

        let mut stored = Vec::with_capacity(events.len());
        let mut next_sequence = current_version + 1;

        for event in events {
            sqlx::query(
                r#"
                INSERT INTO events (
                    event_id,
                    aggregate_id,
                    aggregate_type,
                    actor,
                    sequence_number,
                    event_type,
                    event_version,
                    occurred_at,
                    payload
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(event.event_id)
            .bind(aggregate_id.as_uuid())
            .bind(&aggregate_type)
            .bind(event.actor.as_uuid())
            .bind(next_sequence as i64)
            .bind(&event.event_type)
            .bind(event.event_version as i32)
            .bind(event.occurred_at)
            .bind(&event.payload)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    EventStoreError::Concurrency(format!(
                        "concurrent append detected: sequence_number {next_sequence} already exists"
                    ))
                } else {
                    map_sqlx_error("insert_event", e)
                }
            })?;

            stored.push(StoredEvent {
                event_id: event.event_id,
                aggregate_id: event.aggregate_id,
                aggregate_type: event.aggregate_type,
                actor: event.actor,
                sequence_number: next_sequence,
                event_type: event.event_type,
                event_version: event.event_version,
                occurred_at: event.occurred_at,
                payload: event.payload,
            });
            next_sequence += 1;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(stored)
    }
}

/// Current version of a stream: `(MAX(sequence_number), aggregate_type)`,
/// `(0, None)` if the stream does not exist yet.
async fn check_stream_version(
    tx: &mut Transaction<'_, Postgres>,
    aggregate_id: AggregateId,
) -> Result<(u64, Option<String>), EventStoreError> {
    let row = sqlx::query(
        r#"
        SELECT
            COALESCE(MAX(sequence_number), 0) as current_version,
            MAX(aggregate_type) as aggregate_type
        FROM events
        WHERE aggregate_id = $1
        "#,
    )
    .bind(aggregate_id.as_uuid())
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("check_stream_version", e))?;

    let current_version: Option<i64> = row.try_get("current_version").map_err(|e| {
        EventStoreError::InvalidAppend(format!("failed to read current_version: {e}"))
    })?;
    let aggregate_type: Option<String> = row.try_get("aggregate_type").map_err(|e| {
        EventStoreError::InvalidAppend(format!("failed to read aggregate_type: {e}"))
    })?;

    Ok((current_version.unwrap_or(0) as u64, aggregate_type))
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> EventStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                // Unique violation on (aggregate_id, sequence_number).
                Some("23505") => EventStoreError::Concurrency(msg),
                _ => EventStoreError::InvalidAppend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            EventStoreError::InvalidAppend(format!("connection pool closed in {operation}"))
        }
        _ => EventStoreError::InvalidAppend(format!("sqlx error in {operation}: {err}")),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}

#[derive(Debug)]
struct StoredEventRow {
    event_id: uuid::Uuid,
    aggregate_id: uuid::Uuid,
    aggregate_type: String,
    actor: uuid::Uuid,
    sequence_number: i64,
    event_type: String,
    event_version: i32,
    occurred_at: DateTime<Utc>,
    payload: serde_json::Value,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredEventRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredEventRow {
            event_id: row.try_get("event_id")?,
            aggregate_id: row.try_get("aggregate_id")?,
            aggregate_type: row.try_get("aggregate_type")?,
            actor: row.try_get("actor")?,
            sequence_number: row.try_get("sequence_number")?,
            event_type: row.try_get("event_type")?,
            event_version: row.try_get("event_version")?,
            occurred_at: row.try_get("occurred_at")?,
            payload: row.try_get("payload")?,
        })
    }
}

impl From<StoredEventRow> for StoredEvent {
    fn from(row: StoredEventRow) -> Self {
        StoredEvent {
            event_id: row.event_id,
            aggregate_id: AggregateId::from_uuid(row.aggregate_id),
            aggregate_type: row.aggregate_type,
            actor: UserId::from_uuid(row.actor),
            sequence_number: row.sequence_number as u64,
            event_type: row.event_type,
            event_version: row.event_version as u32,
            occurred_at: row.occurred_at,
            payload: row.payload,
        }
    }
}

// The EventStore trait is synchronous; bridge into the async sqlx methods
// with the ambient tokio runtime handle. Works when called from within a
// tokio runtime context.
impl EventStore for PostgresEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| {
            EventStoreError::InvalidAppend(
                "PostgresEventStore requires a tokio runtime context".to_string(),
            )
        })?;

        if events.is_empty() {
            return Ok(vec![]);
        }

        let aggregate_id = events[0].aggregate_id;
        handle.block_on(self.append_events(aggregate_id, events, expected_version))
    }

    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| {
            EventStoreError::InvalidAppend(
                "PostgresEventStore requires a tokio runtime context".to_string(),
            )
        })?;

        handle.block_on(self.load_events(aggregate_id))
    }
}
