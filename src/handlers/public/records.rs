// GET /api/records and GET /api/records/:site_id/:year

use axum::extract::{
    rejection::{PathRejection, QueryRejection},
    Path, Query, State,
};

use crate::database::{SiteKey, SiteRecord};
use crate::error::ApiError;
use crate::filter::RecordFilter;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

/// List records, optionally narrowed by `subregion_id`, `country_code`,
/// `site_id` or `forest_only=true`
pub async fn records_get(
    State(state): State<AppState>,
    filter: Result<Query<RecordFilter>, QueryRejection>,
) -> ApiResult<Vec<SiteRecord>> {
    let Query(filter) = filter?;
    let records = state.records.find(&filter).await?;
    Ok(ApiResponse::success(records))
}

pub async fn record_get(
    State(state): State<AppState>,
    path: Result<Path<(String, u32)>, PathRejection>,
) -> ApiResult<SiteRecord> {
    let Path((site_id, year)) = path?;
    let key = SiteKey::new(site_id, year);

    match state.records.get(&key).await? {
        Some(record) => Ok(ApiResponse::success(record)),
        None => Err(ApiError::not_found(format!("Record not found: {}", key))),
    }
}
