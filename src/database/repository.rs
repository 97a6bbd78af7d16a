use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, warn};

use crate::database::manager::StoreError;
use crate::database::models::{SiteKey, SiteRecord};
use crate::filter::RecordFilter;
use crate::types::Operation;

const SELECT_RECORDS: &str = "SELECT un_region, subregion_name, subregion_id, country_name, country_code, \
     site_id, site_name, year, carcass_count, illegal_carcass_count FROM site_records";

const INSERT_RECORD: &str = "INSERT INTO site_records (un_region, subregion_name, subregion_id, country_name, \
     country_code, site_id, site_name, year, carcass_count, illegal_carcass_count) \
     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

const UPSERT_RECORD: &str = "INSERT INTO site_records (un_region, subregion_name, subregion_id, country_name, \
     country_code, site_id, site_name, year, carcass_count, illegal_carcass_count) \
     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
     ON CONFLICT (site_id, year) DO UPDATE SET \
     un_region = excluded.un_region, subregion_name = excluded.subregion_name, \
     subregion_id = excluded.subregion_id, country_name = excluded.country_name, \
     country_code = excluded.country_code, site_name = excluded.site_name, \
     carcass_count = excluded.carcass_count, illegal_carcass_count = excluded.illegal_carcass_count";

const UPDATE_RECORD: &str = "UPDATE site_records SET un_region = ?, subregion_name = ?, subregion_id = ?, \
     country_name = ?, country_code = ?, site_name = ?, carcass_count = ?, illegal_carcass_count = ? \
     WHERE site_id = ? AND year = ?";

const DELETE_RECORD: &str = "DELETE FROM site_records WHERE site_id = ? AND year = ?";

/// Durable collection of site records keyed by (site_id, year).
///
/// Every call runs in its own transaction. Batch calls either commit every
/// item or roll back on the first failure, so readers never observe a
/// partially applied batch. Concurrent writes to the same key resolve
/// last-write-wins in commit order.
#[derive(Clone)]
pub struct RecordStore {
    pool: SqlitePool,
}

impl RecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert one record; `DuplicateKey` if its key is taken
    pub async fn add(&self, record: &SiteRecord) -> Result<(), StoreError> {
        self.add_many(std::slice::from_ref(record)).await
    }

    /// Insert a batch atomically. The first colliding key aborts and rolls
    /// back the whole batch, including collisions inside the batch itself.
    pub async fn add_many(&self, records: &[SiteRecord]) -> Result<(), StoreError> {
        self.write_batch(BatchWrite::Insert, records).await
    }

    /// Replace-if-present-else-insert for each record, atomically
    pub async fn upsert_many(&self, records: &[SiteRecord]) -> Result<(), StoreError> {
        self.write_batch(BatchWrite::Upsert, records).await
    }

    /// Replace the row selected by the record's own key; `NotFound` if absent
    pub async fn update(&self, record: &SiteRecord) -> Result<(), StoreError> {
        self.update_many(std::slice::from_ref(record)).await
    }

    /// Atomic batch of updates; any missing key rolls back the batch
    pub async fn update_many(&self, records: &[SiteRecord]) -> Result<(), StoreError> {
        self.write_batch(BatchWrite::Update, records).await
    }

    /// Delete one record. Deleting an absent key is not an error.
    pub async fn remove(&self, key: &SiteKey) -> Result<(), StoreError> {
        self.remove_many(std::slice::from_ref(key)).await
    }

    /// Delete a batch of keys atomically; absent keys are skipped
    pub async fn remove_many(&self, keys: &[SiteKey]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut removed = 0u64;
        for key in keys {
            let result = sqlx::query(DELETE_RECORD)
                .bind(key.site_id())
                .bind(key.year())
                .execute(&mut *tx)
                .await?;
            removed += result.rows_affected();
        }
        tx.commit().await?;

        debug!(
            operation = %Operation::Remove,
            requested = keys.len(),
            removed,
            "committed record batch"
        );
        Ok(())
    }

    /// Exact lookup; `None` when absent
    pub async fn get(&self, key: &SiteKey) -> Result<Option<SiteRecord>, StoreError> {
        let sql = format!("{} WHERE site_id = ? AND year = ?", SELECT_RECORDS);
        let record = sqlx::query_as::<_, SiteRecord>(&sql)
            .bind(key.site_id())
            .bind(key.year())
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    /// Full scan. Rows come back ordered by key, but callers should not rely on it.
    pub async fn get_all(&self) -> Result<Vec<SiteRecord>, StoreError> {
        self.find(&RecordFilter::default()).await
    }

    /// Listing restricted by `filter`
    pub async fn find(&self, filter: &RecordFilter) -> Result<Vec<SiteRecord>, StoreError> {
        let mut query = QueryBuilder::<Sqlite>::new(SELECT_RECORDS);
        filter.push_where(&mut query);
        query.push(" ORDER BY site_id, year");

        let records = query.build_query_as::<SiteRecord>().fetch_all(&self.pool).await?;
        Ok(records)
    }

    pub async fn count(&self) -> Result<i64, StoreError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM site_records")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    /// Apply `write` to every record inside one transaction. Returning
    /// early drops the transaction, which rolls it back.
    async fn write_batch(&self, write: BatchWrite, records: &[SiteRecord]) -> Result<(), StoreError> {
        let operation = write.operation();
        let mut tx = self.pool.begin().await?;
        for record in records {
            let written = match write {
                BatchWrite::Insert => insert(&mut *tx, record).await,
                BatchWrite::Upsert => upsert(&mut *tx, record).await,
                BatchWrite::Update => update(&mut *tx, record).await,
            };
            if let Err(err) = written {
                warn!(operation = %operation, key = %record.key(), error = %err, "rolling back record batch");
                return Err(err);
            }
        }
        tx.commit().await?;

        debug!(operation = %operation, count = records.len(), "committed record batch");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum BatchWrite {
    Insert,
    Upsert,
    Update,
}

impl BatchWrite {
    fn operation(self) -> Operation {
        match self {
            BatchWrite::Insert => Operation::Add,
            BatchWrite::Upsert => Operation::Upsert,
            BatchWrite::Update => Operation::Update,
        }
    }
}

async fn insert(conn: &mut SqliteConnection, record: &SiteRecord) -> Result<(), StoreError> {
    bind_record(sqlx::query(INSERT_RECORD), record)
        .execute(conn)
        .await
        .map_err(|e| StoreError::from_write(e, &record.key()))?;
    Ok(())
}

async fn upsert(conn: &mut SqliteConnection, record: &SiteRecord) -> Result<(), StoreError> {
    bind_record(sqlx::query(UPSERT_RECORD), record).execute(conn).await?;
    Ok(())
}

async fn update(conn: &mut SqliteConnection, record: &SiteRecord) -> Result<(), StoreError> {
    let result = sqlx::query(UPDATE_RECORD)
        .bind(&record.un_region)
        .bind(&record.subregion_name)
        .bind(&record.subregion_id)
        .bind(&record.country_name)
        .bind(&record.country_code)
        .bind(&record.site_name)
        .bind(record.carcass_count)
        .bind(record.illegal_carcass_count)
        .bind(&record.site_id)
        .bind(record.year)
        .execute(conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound { key: record.key() });
    }
    Ok(())
}

fn bind_record<'q>(
    query: sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    record: &'q SiteRecord,
) -> sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    query
        .bind(&record.un_region)
        .bind(&record.subregion_name)
        .bind(&record.subregion_id)
        .bind(&record.country_name)
        .bind(&record.country_code)
        .bind(&record.site_id)
        .bind(&record.site_name)
        .bind(record.year)
        .bind(record.carcass_count)
        .bind(record.illegal_carcass_count)
}
