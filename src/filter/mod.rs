use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite};

/// Countries inside protected forest-elephant range: DRC, Congo, Gabon, Cameroon
pub const FOREST_ELEPHANT_COUNTRIES: &[&str] = &["cd", "cg", "ga", "cm"];

/// Optional restrictions for record listings. Empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFilter {
    pub subregion_id: Option<String>,
    pub country_code: Option<String>,
    pub site_id: Option<String>,
    /// Restrict to [`FOREST_ELEPHANT_COUNTRIES`]
    #[serde(default)]
    pub forest_only: bool,
}

impl RecordFilter {
    pub fn is_empty(&self) -> bool {
        self.subregion_id.is_none() && self.country_code.is_none() && self.site_id.is_none() && !self.forest_only
    }

    /// Append a WHERE clause with bound parameters. Codes are compared
    /// lower-cased, the way they are stored.
    pub fn push_where(&self, query: &mut QueryBuilder<'_, Sqlite>) {
        if self.is_empty() {
            return;
        }

        let mut clause = " WHERE ";
        let equalities = [
            ("subregion_id", &self.subregion_id),
            ("country_code", &self.country_code),
            ("site_id", &self.site_id),
        ];
        for (column, value) in equalities {
            if let Some(value) = value {
                query.push(clause).push(column).push(" = ").push_bind(normalize(value));
                clause = " AND ";
            }
        }
        if self.forest_only {
            query.push(clause);
            push_in_list(query, "country_code", FOREST_ELEPHANT_COUNTRIES.iter().copied());
        }
    }
}

/// `column IN (?, ?, ...)`; an empty list renders as a false condition
pub fn push_in_list<'a, I>(query: &mut QueryBuilder<'_, Sqlite>, column: &str, values: I)
where
    I: IntoIterator<Item = &'a str>,
{
    let values: Vec<String> = values.into_iter().map(normalize).collect();
    if values.is_empty() {
        query.push("0 = 1");
        return;
    }

    query.push(column).push(" IN (");
    let mut list = query.separated(", ");
    for value in values {
        list.push_bind(value);
    }
    list.push_unseparated(")");
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}
