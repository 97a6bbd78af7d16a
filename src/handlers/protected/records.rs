// Token-gated record mutations under /api/records

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::database::{SiteKey, SiteRecord};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;
use crate::types::Operation;

/// Outcome of a committed write
#[derive(Debug, Serialize)]
pub struct WriteSummary {
    pub operation: Operation,
    pub count: usize,
}

impl WriteSummary {
    fn new(operation: Operation, count: usize) -> Self {
        Self { operation, count }
    }
}

/// One key or a list of keys, as accepted by DELETE /api/records
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum KeyList {
    Many(Vec<SiteKey>),
    One(SiteKey),
}

fn parse_records(payload: Result<Json<Value>, JsonRejection>) -> Result<Vec<SiteRecord>, ApiError> {
    let Json(body) = payload?;
    Ok(SiteRecord::from_json_array(body)?)
}

/// POST /api/records - insert a batch; any existing key rejects the whole batch
pub async fn records_post(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<WriteSummary> {
    let records = parse_records(payload)?;
    state.records.add_many(&records).await?;
    Ok(ApiResponse::created(WriteSummary::new(Operation::Add, records.len())))
}

/// PUT /api/records - insert or replace each record
pub async fn records_put(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<WriteSummary> {
    let records = parse_records(payload)?;
    state.records.upsert_many(&records).await?;
    Ok(ApiResponse::success(WriteSummary::new(Operation::Upsert, records.len())))
}

/// PATCH /api/records - replace existing records; a missing key rejects the batch
pub async fn records_patch(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<WriteSummary> {
    let records = parse_records(payload)?;
    state.records.update_many(&records).await?;
    Ok(ApiResponse::success(WriteSummary::new(Operation::Update, records.len())))
}

/// DELETE /api/records - body `[{"site_id": "lop", "year": 2010}, ...]`
pub async fn records_delete(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<WriteSummary> {
    let Json(body) = payload?;
    let keys = match serde_json::from_value::<KeyList>(body) {
        Ok(KeyList::Many(keys)) => keys,
        Ok(KeyList::One(key)) => vec![key],
        Err(_) => {
            return Err(ApiError::invalid_json(
                "Expected a key {\"site_id\", \"year\"} or an array of keys",
            ))
        }
    };

    state.records.remove_many(&keys).await?;
    Ok(ApiResponse::success(WriteSummary::new(Operation::Remove, keys.len())))
}

/// PUT /api/records/:site_id/:year - replace one existing record
pub async fn record_put(
    State(state): State<AppState>,
    path: Result<Path<(String, u32)>, PathRejection>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<SiteRecord> {
    let Path((site_id, year)) = path?;
    let Json(body) = payload?;

    let key = SiteKey::new(site_id, year);
    let record = SiteRecord::from_json(body)?;
    if record.key() != key {
        return Err(ApiError::bad_request(format!(
            "Record key {} does not match path {}",
            record.key(),
            key
        )));
    }

    state.records.update(&record).await?;
    Ok(ApiResponse::success(record))
}

/// DELETE /api/records/:site_id/:year - succeeds whether or not the record existed
pub async fn record_delete(
    State(state): State<AppState>,
    path: Result<Path<(String, u32)>, PathRejection>,
) -> ApiResult<WriteSummary> {
    let Path((site_id, year)) = path?;
    state.records.remove(&SiteKey::new(site_id, year)).await?;
    Ok(ApiResponse::success(WriteSummary::new(Operation::Remove, 1)))
}
