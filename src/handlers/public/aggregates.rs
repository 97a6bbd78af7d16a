// GET /api/aggregates and GET /api/aggregates/:country_code/:year

use axum::extract::{
    rejection::{PathRejection, QueryRejection},
    Path, Query, State,
};
use serde::Deserialize;

use crate::database::CountryAggregate;
use crate::error::ApiError;
use crate::filter::FOREST_ELEPHANT_COUNTRIES;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct AggregateQuery {
    /// `forest` limits the listing to forest-elephant range countries
    pub range: Option<String>,
}

pub async fn aggregates_get(
    State(state): State<AppState>,
    query: Result<Query<AggregateQuery>, QueryRejection>,
) -> ApiResult<Vec<CountryAggregate>> {
    let Query(query) = query?;

    let totals = match query.range.as_deref().map(str::trim) {
        None | Some("") | Some("all") => state.aggregates.get_all_country_years().await?,
        Some(range) if range.eq_ignore_ascii_case("forest") => {
            state.aggregates.get_country_years_in(FOREST_ELEPHANT_COUNTRIES).await?
        }
        Some(other) => {
            return Err(ApiError::bad_request(format!(
                "Unknown range '{}', expected 'all' or 'forest'",
                other
            )))
        }
    };

    Ok(ApiResponse::success(totals))
}

pub async fn aggregate_get(
    State(state): State<AppState>,
    path: Result<Path<(String, u32)>, PathRejection>,
) -> ApiResult<CountryAggregate> {
    let Path((country_code, year)) = path?;

    match state.aggregates.get_country_year(&country_code, year).await? {
        Some(total) => Ok(ApiResponse::success(total)),
        None => Err(ApiError::not_found(format!(
            "No records for {}/{}",
            country_code.trim().to_lowercase(),
            year
        ))),
    }
}
