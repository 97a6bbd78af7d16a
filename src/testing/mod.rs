use sqlx::SqlitePool;
use tempfile::TempDir;

use crate::config::DatabaseConfig;
use crate::database::{DatabaseManager, SiteRecord, SiteRecordDraft};
use crate::services::AggregationView;

/// Store and aggregation view over a throwaway SQLite file
pub struct TestContext {
    _dir: TempDir,
    pub pool: SqlitePool,
    pub store: crate::database::RecordStore,
    pub aggregates: AggregationView,
}

impl TestContext {
    pub async fn new() -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        let config = DatabaseConfig {
            url: format!("sqlite://{}", dir.path().join("records.db").display()),
            max_connections: 4,
            acquire_timeout_secs: 5,
            busy_timeout_ms: 5_000,
        };
        let pool = DatabaseManager::connect(&config)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to open test database: {}", e))?;

        let store = crate::database::RecordStore::new(pool.clone());
        let aggregates = AggregationView::new(store.clone());
        Ok(Self {
            _dir: dir,
            pool,
            store,
            aggregates,
        })
    }
}

/// Valid record with filler text for the descriptive columns
pub fn site_record(site_id: &str, year: u32, country_code: &str, carcasses: u32, illegal: u32) -> SiteRecord {
    SiteRecordDraft {
        un_region: "Africa".to_string(),
        subregion_name: "Central Africa".to_string(),
        subregion_id: "ca".to_string(),
        country_name: format!("Country {}", country_code.to_uppercase()),
        country_code: country_code.to_string(),
        site_id: site_id.to_string(),
        site_name: format!("Site {}", site_id.to_uppercase()),
        year: i64::from(year),
        carcass_count: i64::from(carcasses),
        illegal_carcass_count: i64::from(illegal),
    }
    .validate()
    .expect("fixture record must be valid")
}
