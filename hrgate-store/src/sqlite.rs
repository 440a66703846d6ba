// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for HR records.
//!
//! Records are kept in one table keyed by kind and id. The columns a query or constraint needs
//! (owner, unique key and leave status) are stored next to the CBOR-encoded record.
use std::sync::Arc;

use hrgate_auth::IdentityStore;
use hrgate_core::{
    DepartmentId, LeaveRequest, LeaveStatus, Principal, PrincipalId, Record, RecordId,
    ResourceKind,
};
use sqlx::migrate::{MigrateDatabase, Migrator};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{FromRow, Sqlite, migrate, query, query_as, query_scalar};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::{RecordStore, ReplaceOutcome};

/// Create SQLite database if it doesn't already exist.
pub async fn create_database(url: &str) -> Result<(), SqliteError> {
    if !Sqlite::database_exists(url).await? {
        Sqlite::create_database(url).await?
    }
    Ok(())
}

/// Get migrations from folder without running them.
pub fn migrations() -> Migrator {
    migrate!()
}

/// Run any pending database migrations from inside the application.
pub async fn run_pending_migrations(pool: &sqlx::SqlitePool) -> Result<(), SqliteError> {
    migrations().run(pool).await?;
    Ok(())
}

pub struct SqliteStoreBuilder {
    url: String,
    max_connections: u32,
    run_migrations: bool,
    create_database: bool,
}

impl Default for SqliteStoreBuilder {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".into(),
            max_connections: 16,
            create_database: true,
            run_migrations: true,
        }
    }
}

impl SqliteStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(any(test, feature = "test_utils"))]
    pub fn random_memory_url(mut self) -> Self {
        // Tests sharing one in-memory database through the process-wide cache step on each
        // other's data, every temporary database gets a random name of its own.
        //
        // See related issue: https://github.com/launchbadge/sqlx/issues/2510
        self.url = format!(
            "sqlite://hrgate{}?mode=memory&cache=private",
            rand::random::<u32>()
        );
        self
    }

    pub fn database_url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }

    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn create_database(mut self, create_database: bool) -> Self {
        self.create_database = create_database;
        self
    }

    pub fn run_default_migrations(mut self, run_migrations: bool) -> Self {
        self.run_migrations = run_migrations;
        self
    }

    pub async fn build(self) -> Result<SqliteStore, SqliteError> {
        if self.create_database {
            create_database(&self.url).await?;
        }

        // Every connection to a private in-memory database sees its own database. Use a single
        // connection and keep it open, the data vanishes with it.
        let in_memory = self.url.contains(":memory:") || self.url.contains("mode=memory");
        let mut options = SqlitePoolOptions::new().max_connections(self.max_connections);
        if in_memory {
            options = options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = options.connect(&self.url).await?;

        if self.run_migrations {
            run_pending_migrations(&pool).await?;
        }

        Ok(SqliteStore::new(pool))
    }
}

#[derive(FromRow)]
struct RecordRow {
    body: Vec<u8>,
}

impl TryFrom<RecordRow> for Record {
    type Error = SqliteError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        decode_record(&row.body)
    }
}

fn encode_record(record: &Record) -> Result<Vec<u8>, SqliteError> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(record, &mut bytes)
        .map_err(|err| SqliteError::Encode(record.kind().to_string(), format!("{err:?}")))?;
    Ok(bytes)
}

fn decode_record(bytes: &[u8]) -> Result<Record, SqliteError> {
    ciborium::from_reader::<Record, _>(bytes)
        .map_err(|err| SqliteError::Decode("record".to_string(), format!("{err:?}")))
}

/// Values of a record as they are bound to the columns of `records_v1`.
struct Columns {
    kind: &'static str,
    id: i64,
    owner: i64,
    unique_key: Option<String>,
    status: Option<&'static str>,
    body: Vec<u8>,
}

impl Columns {
    fn of(record: &Record) -> Result<Self, SqliteError> {
        Ok(Self {
            kind: record.kind().as_str(),
            id: sql_id(record.id().as_u64())?,
            owner: sql_id(record.owner().as_u64())?,
            unique_key: record.unique_key(),
            status: record.status().map(|status| status.as_str()),
            body: encode_record(record)?,
        })
    }
}

/// SQLite integers are signed, ids above `i64::MAX` can not be stored.
fn sql_id(id: u64) -> Result<i64, SqliteError> {
    i64::try_from(id).map_err(|_| SqliteError::IdOutOfRange(id))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(err) if err.is_unique_violation())
}

/// SQLite database with a connection pool.
///
/// The store can be cloned and every clone uses the same pool. Writes are serialized with a
/// semaphore, SQLite only allows one writing transaction at a time and waiting on the permit is
/// cheaper than retrying on a busy database.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: sqlx::SqlitePool,
    writer: Arc<Semaphore>,
}

impl SqliteStore {
    pub(crate) fn new(pool: sqlx::SqlitePool) -> Self {
        Self {
            pool,
            writer: Arc::new(Semaphore::new(1)),
        }
    }

    /// Shortcut building an in-memory SQLite database with a randomised name for testing purposes.
    #[cfg(any(test, feature = "test_utils"))]
    pub async fn temporary() -> Self {
        SqliteStoreBuilder::new()
            .random_memory_url()
            .max_connections(1)
            .build()
            .await
            .expect("migrations succeeded")
    }

    async fn fetch(&self, kind: ResourceKind, id: RecordId) -> Result<Option<Record>, SqliteError> {
        // No record can be stored under an id out of range.
        let Ok(id) = sql_id(id.as_u64()) else {
            return Ok(None);
        };

        let row = query_as::<_, RecordRow>(
            "
            SELECT
                body
            FROM
                records_v1
            WHERE
                kind = ?
                AND id = ?
            ",
        )
        .bind(kind.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Record::try_from).transpose()
    }
}

impl RecordStore for SqliteStore {
    type Error = SqliteError;

    async fn get(&self, kind: ResourceKind, id: RecordId) -> Result<Option<Record>, Self::Error> {
        self.fetch(kind, id).await
    }

    async fn list(&self, kind: ResourceKind) -> Result<Vec<Record>, Self::Error> {
        let rows = query_as::<_, RecordRow>(
            "
            SELECT
                body
            FROM
                records_v1
            WHERE
                kind = ?
            ORDER BY
                id ASC
            ",
        )
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Record::try_from).collect()
    }

    async fn insert(&self, record: Record) -> Result<Option<Record>, Self::Error> {
        let _permit = self
            .writer
            .acquire()
            .await
            .expect("if semaphore is closed then the whole store is gone as well");
        let mut tx = self.pool.begin().await?;

        let record = if record.kind() == ResourceKind::Profile {
            record
        } else {
            // The sequence only moves forward, a rolled back insert gives its id back.
            let next: i64 = query_scalar(
                "
                INSERT INTO
                    record_sequences_v1 (
                        kind,
                        last_id
                    )
                VALUES
                    (?, 1)
                ON CONFLICT(kind) DO UPDATE SET
                    last_id = last_id + 1
                RETURNING
                    last_id
                ",
            )
            .bind(record.kind().as_str())
            .fetch_one(&mut *tx)
            .await?;
            let next = u64::try_from(next)
                .map_err(|_| SqliteError::Decode("record id".to_string(), next.to_string()))?;
            record.with_id(RecordId::new(next))
        };

        let columns = Columns::of(&record)?;
        let result = query(
            "
            INSERT OR ABORT
            INTO
                records_v1 (
                    kind,
                    id,
                    owner,
                    unique_key,
                    status,
                    body
                )
            VALUES
                (?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(columns.kind)
        .bind(columns.id)
        .bind(columns.owner)
        .bind(columns.unique_key)
        .bind(columns.status)
        .bind(columns.body)
        .execute(&mut *tx)
        .await;

        match result {
            Ok(_) => {
                tx.commit().await?;
                Ok(Some(record))
            }
            Err(err) if is_unique_violation(&err) => {
                debug!(kind = %record.kind(), "duplicate record");
                tx.rollback().await?;
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn replace(&self, expected: &Record, new: &Record) -> Result<ReplaceOutcome, Self::Error> {
        if (expected.kind(), expected.id()) != (new.kind(), new.id()) {
            return Ok(ReplaceOutcome::Stale);
        }

        let expected = encode_record(expected)?;
        let columns = Columns::of(new)?;

        let _permit = self
            .writer
            .acquire()
            .await
            .expect("if semaphore is closed then the whole store is gone as well");
        let result = query(
            "
            UPDATE
                records_v1
            SET
                owner = ?,
                unique_key = ?,
                status = ?,
                body = ?
            WHERE
                kind = ?
                AND id = ?
                AND body = ?
            ",
        )
        .bind(columns.owner)
        .bind(columns.unique_key)
        .bind(columns.status)
        .bind(columns.body)
        .bind(columns.kind)
        .bind(columns.id)
        .bind(expected)
        .execute(&self.pool)
        .await;

        match result {
            Ok(result) if result.rows_affected() > 0 => Ok(ReplaceOutcome::Applied),
            Ok(_) => Ok(ReplaceOutcome::Stale),
            Err(err) if is_unique_violation(&err) => Ok(ReplaceOutcome::Duplicate),
            Err(err) => Err(err.into()),
        }
    }

    async fn transition_leave(
        &self,
        id: RecordId,
        from: LeaveStatus,
        to: LeaveStatus,
        approver: Option<PrincipalId>,
    ) -> Result<Option<LeaveRequest>, Self::Error> {
        let Ok(sql_id) = sql_id(id.as_u64()) else {
            return Ok(None);
        };
        let _permit = self
            .writer
            .acquire()
            .await
            .expect("if semaphore is closed then the whole store is gone as well");
        let mut tx = self.pool.begin().await?;

        let row = query_as::<_, RecordRow>(
            "
            SELECT
                body
            FROM
                records_v1
            WHERE
                kind = ?
                AND id = ?
                AND status = ?
            ",
        )
        .bind(ResourceKind::LeaveRequest.as_str())
        .bind(sql_id)
        .bind(from.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(Record::LeaveRequest(mut request)) = row.map(Record::try_from).transpose()? else {
            tx.rollback().await?;
            return Ok(None);
        };

        request.status = to;
        request.approver = approver;
        let body = encode_record(&Record::LeaveRequest(request.clone()))?;

        // The status condition is repeated so the write itself decides which transition wins.
        let result = query(
            "
            UPDATE
                records_v1
            SET
                status = ?,
                body = ?
            WHERE
                kind = ?
                AND id = ?
                AND status = ?
            ",
        )
        .bind(to.as_str())
        .bind(body)
        .bind(ResourceKind::LeaveRequest.as_str())
        .bind(sql_id)
        .bind(from.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        tx.commit().await?;
        Ok(Some(request))
    }

    async fn delete(&self, kind: ResourceKind, id: RecordId) -> Result<bool, Self::Error> {
        let Ok(id) = sql_id(id.as_u64()) else {
            return Ok(false);
        };
        let _permit = self
            .writer
            .acquire()
            .await
            .expect("if semaphore is closed then the whole store is gone as well");
        let result = query(
            "
            DELETE
            FROM
                records_v1
            WHERE
                kind = ?
                AND id = ?
            ",
        )
        .bind(kind.as_str())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn department_of(
        &self,
        principal: PrincipalId,
    ) -> Result<Option<DepartmentId>, Self::Error> {
        let record = self.fetch(ResourceKind::Profile, principal.into()).await?;
        Ok(record
            .as_ref()
            .and_then(Record::as_profile)
            .and_then(|profile| profile.department))
    }
}

impl IdentityStore for SqliteStore {
    type Error = SqliteError;

    async fn principal(&self, id: PrincipalId) -> Result<Option<Principal>, Self::Error> {
        let record = self.fetch(ResourceKind::Profile, id.into()).await?;
        Ok(record
            .as_ref()
            .and_then(Record::as_profile)
            .map(Principal::from))
    }
}

#[derive(Debug, Error)]
pub enum SqliteError {
    /// SQLite database and connection error.
    #[error(transparent)]
    Sqlite(#[from] sqlx::Error),

    /// SQL table schema migration error.
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// A record could not be encoded before storing it into the database. This is a critical
    /// error.
    #[error("failed encoding '{0}' value before storing to database: {1}")]
    Encode(String, String),

    /// Invalid, corrupted data was found in the database. This is a critical error.
    #[error("could not decode corrupted '{0}' value from database: {1}")]
    Decode(String, String),

    /// Identifier does not fit into a SQLite integer.
    #[error("identifier {0} is out of range for the database")]
    IdOutOfRange(u64),
}
