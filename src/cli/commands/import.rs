use anyhow::Context;
use serde_json::{json, Value};
use std::path::Path;

use crate::cli::OutputFormat;
use crate::config;
use crate::database::{DatabaseManager, RecordStore, SiteRecord};

pub async fn handle(file: &Path, insert_only: bool, output_format: OutputFormat) -> anyhow::Result<()> {
    let pool = DatabaseManager::connect(&config::config().database).await?;
    let store = RecordStore::new(pool);

    let count = import_file(&store, file, insert_only).await?;

    match output_format {
        OutputFormat::Json => println!("{}", json!({ "success": true, "imported": count })),
        OutputFormat::Text => println!("Imported {} record(s) from {}", count, file.display()),
    }
    Ok(())
}

/// Validate every record in `file`, then write them in one batch.
/// Nothing is written if any record is invalid.
pub async fn import_file(store: &RecordStore, file: &Path, insert_only: bool) -> anyhow::Result<usize> {
    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let json: Value = serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", file.display()))?;

    let records = SiteRecord::from_json_array(json)?;
    if insert_only {
        store.add_many(&records).await?;
    } else {
        store.upsert_many(&records).await?;
    }

    tracing::info!("Imported {} records from {}", records.len(), file.display());
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{SiteKey, StoreError};
    use crate::testing::{site_record, TestContext};

    fn write_json(dir: &tempfile::TempDir, value: Value) -> std::path::PathBuf {
        let path = dir.path().join("records.json");
        std::fs::write(&path, value.to_string()).unwrap();
        path
    }

    fn dataset_row(site_id: &str, year: u32, carcasses: u32) -> Value {
        json!({
            "UNRegion": "Africa",
            "SubregionName": "Central Africa",
            "SubregionID": "CA",
            "CountryName": "Gabon",
            "CountryCode": "GA",
            "MIKEsiteID": site_id,
            "MIKEsiteName": "Lope",
            "year": year,
            "TotalNumberofCarcasses": carcasses.to_string(),
            "NumberofIllegalCarcasses": "0"
        })
    }

    #[tokio::test]
    async fn imports_dataset_rows_by_upsert() {
        let ctx = TestContext::new().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        ctx.store.add(&site_record("lop", 2011, "ga", 1, 1)).await.unwrap();

        let path = write_json(&dir, json!([dataset_row("LOP", 2011, 20), dataset_row("LOP", 2012, 7)]));
        let count = import_file(&ctx.store, &path, false).await.unwrap();

        assert_eq!(count, 2);
        let lop = ctx.store.get(&SiteKey::new("lop", 2011)).await.unwrap().unwrap();
        assert_eq!(lop.carcass_count(), 20);
        assert_eq!(ctx.store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn insert_only_refuses_existing_keys() {
        let ctx = TestContext::new().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        ctx.store.add(&site_record("lop", 2011, "ga", 1, 1)).await.unwrap();

        let path = write_json(&dir, json!([dataset_row("lop", 2012, 3), dataset_row("lop", 2011, 20)]));
        let err = import_file(&ctx.store, &path, true).await.unwrap_err();

        assert!(matches!(err.downcast_ref::<StoreError>(), Some(StoreError::DuplicateKey { .. })));
        assert_eq!(ctx.store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn invalid_row_writes_nothing() {
        let ctx = TestContext::new().await.unwrap();
        let dir = tempfile::tempdir().unwrap();

        let mut bad = dataset_row("lop", 2012, 3);
        bad["CountryCode"] = json!("GAB");
        let path = write_json(&dir, json!([dataset_row("lop", 2011, 1), bad]));

        assert!(import_file(&ctx.store, &path, false).await.is_err());
        assert_eq!(ctx.store.count().await.unwrap(), 0);
    }
}
