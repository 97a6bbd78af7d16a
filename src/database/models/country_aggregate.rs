use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Country-year totals summed over every site record sharing the pair.
/// Derived on read, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryAggregate {
    pub country_name: String,
    pub country_code: String,
    pub year: u32,
    pub total_carcasses: u64,
    pub total_illegal_carcasses: u64,
}

/// Raw GROUP BY row; SQLite sums come back as i64
#[derive(Debug, FromRow)]
pub(crate) struct AggregateRow {
    pub country_name: String,
    pub country_code: String,
    pub year: u32,
    pub total_carcasses: i64,
    pub total_illegal_carcasses: i64,
}

impl From<AggregateRow> for CountryAggregate {
    fn from(row: AggregateRow) -> Self {
        Self {
            country_name: row.country_name,
            country_code: row.country_code,
            year: row.year,
            total_carcasses: row.total_carcasses.max(0) as u64,
            total_illegal_carcasses: row.total_illegal_carcasses.max(0) as u64,
        }
    }
}
