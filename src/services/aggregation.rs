use sqlx::{QueryBuilder, Sqlite};

use crate::database::models::country_aggregate::AggregateRow;
use crate::database::{CountryAggregate, RecordStore, StoreError};
use crate::filter::push_in_list;

const AGGREGATE_SELECT: &str = "SELECT MAX(country_name) AS country_name, country_code, year, \
     SUM(carcass_count) AS total_carcasses, SUM(illegal_carcass_count) AS total_illegal_carcasses \
     FROM site_records";

const AGGREGATE_GROUP: &str = " GROUP BY country_code, year ORDER BY country_code, year";

/// Read-only country-year totals over the record store.
///
/// Every call recomputes from the current rows; nothing is cached, so results
/// always reflect the latest committed state. Groups with no rows are absent
/// rather than reported as zero.
#[derive(Clone)]
pub struct AggregationView {
    store: RecordStore,
}

impl AggregationView {
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }

    pub async fn get_country_year(&self, country_code: &str, year: u32) -> Result<Option<CountryAggregate>, StoreError> {
        let mut query = QueryBuilder::<Sqlite>::new(AGGREGATE_SELECT);
        query
            .push(" WHERE country_code = ")
            .push_bind(country_code.trim().to_lowercase())
            .push(" AND year = ")
            .push_bind(year)
            .push(AGGREGATE_GROUP);

        let row = query
            .build_query_as::<AggregateRow>()
            .fetch_optional(self.store.pool())
            .await?;
        Ok(row.map(CountryAggregate::from))
    }

    pub async fn get_all_country_years(&self) -> Result<Vec<CountryAggregate>, StoreError> {
        let mut query = QueryBuilder::<Sqlite>::new(AGGREGATE_SELECT);
        query.push(AGGREGATE_GROUP);
        self.fetch_all(query).await
    }

    /// Same as [`Self::get_all_country_years`], restricted to `country_codes`
    pub async fn get_country_years_in(&self, country_codes: &[&str]) -> Result<Vec<CountryAggregate>, StoreError> {
        let mut query = QueryBuilder::<Sqlite>::new(AGGREGATE_SELECT);
        query.push(" WHERE ");
        push_in_list(&mut query, "country_code", country_codes.iter().copied());
        query.push(AGGREGATE_GROUP);
        self.fetch_all(query).await
    }

    async fn fetch_all(&self, mut query: QueryBuilder<'_, Sqlite>) -> Result<Vec<CountryAggregate>, StoreError> {
        let rows = query
            .build_query_as::<AggregateRow>()
            .fetch_all(self.store.pool())
            .await?;
        Ok(rows.into_iter().map(CountryAggregate::from).collect())
    }
}
