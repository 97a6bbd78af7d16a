use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::database::models::SiteRecord;

const SUBREGION_ID_LEN: usize = 2;
const COUNTRY_CODE_LEN: usize = 2;
const SITE_ID_LEN: usize = 3;

/// Accepted input keys per field: API name first, then the MIKE dataset
/// column header, then legacy model names.
const FIELD_ALIASES: &[(&str, &[&str])] = &[
    ("un_region", &["un_region", "UNRegion"]),
    ("subregion_name", &["subregion_name", "SubregionName"]),
    ("subregion_id", &["subregion_id", "SubregionID"]),
    ("country_name", &["country_name", "CountryName"]),
    ("country_code", &["country_code", "CountryCode"]),
    ("site_id", &["site_id", "MIKEsiteID", "mike_site_id"]),
    ("site_name", &["site_name", "MIKEsiteName", "mike_site_name"]),
    ("year", &["year"]),
    ("carcass_count", &["carcass_count", "TotalNumberofCarcasses", "total_number_of_carcasses"]),
    (
        "illegal_carcass_count",
        &["illegal_carcass_count", "NumberofIllegalCarcasses", "number_of_illegal_carcasses"],
    ),
];

/// Why a candidate was rejected before reaching the store
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("Invalid JSON format: {0}")]
    InvalidJson(String),
    #[error("Missing required field: {0}")]
    MissingRequiredField(&'static str),
    #[error("Field '{field}' must be a string")]
    NotAString { field: &'static str },
    #[error("Field '{field}' must be an integer, got {value}")]
    NotAnInteger { field: &'static str, value: String },
    #[error("Field '{field}' must be exactly {expected} characters, got '{value}'")]
    InvalidLength {
        field: &'static str,
        expected: usize,
        value: String,
    },
    #[error("Field '{field}' must not be negative, got {value}")]
    Negative { field: &'static str, value: i64 },
    #[error("Field '{field}' is out of range: {value}")]
    OutOfRange { field: &'static str, value: i64 },
    #[error("Record at index {index}: {source}")]
    InBatch {
        index: usize,
        #[source]
        source: Box<RecordError>,
    },
}

impl RecordError {
    /// Offending field, if the error is tied to one
    pub fn field(&self) -> Option<&'static str> {
        match self {
            RecordError::InvalidJson(_) => None,
            RecordError::MissingRequiredField(field)
            | RecordError::NotAString { field }
            | RecordError::NotAnInteger { field, .. }
            | RecordError::InvalidLength { field, .. }
            | RecordError::Negative { field, .. }
            | RecordError::OutOfRange { field, .. } => Some(field),
            RecordError::InBatch { source, .. } => source.field(),
        }
    }

    /// Position in the submitted batch, if any
    pub fn index(&self) -> Option<usize> {
        match self {
            RecordError::InBatch { index, .. } => Some(*index),
            _ => None,
        }
    }
}

/// Unvalidated site record fields.
///
/// Numbers are signed so that negative input reaches validation and is
/// reported as such instead of failing to parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteRecordDraft {
    pub un_region: String,
    pub subregion_name: String,
    pub subregion_id: String,
    pub country_name: String,
    pub country_code: String,
    pub site_id: String,
    pub site_name: String,
    pub year: i64,
    pub carcass_count: i64,
    pub illegal_carcass_count: i64,
}

impl SiteRecordDraft {
    /// Normalize and check the draft.
    ///
    /// Free text is trimmed. `subregion_id`, `country_code` and `site_id` are
    /// lower-cased but not trimmed, and must be exactly 2, 2 and 3 characters.
    /// `year` and both counts must be non-negative and fit in a `u32`. The
    /// illegal count is not checked against the total.
    pub fn validate(self) -> Result<SiteRecord, RecordError> {
        let subregion_id = fixed_length_code("subregion_id", &self.subregion_id, SUBREGION_ID_LEN)?;
        let country_code = fixed_length_code("country_code", &self.country_code, COUNTRY_CODE_LEN)?;
        let site_id = fixed_length_code("site_id", &self.site_id, SITE_ID_LEN)?;

        Ok(SiteRecord {
            un_region: self.un_region.trim().to_string(),
            subregion_name: self.subregion_name.trim().to_string(),
            subregion_id,
            country_name: self.country_name.trim().to_string(),
            country_code,
            site_id,
            site_name: self.site_name.trim().to_string(),
            year: non_negative("year", self.year)?,
            carcass_count: non_negative("carcass_count", self.carcass_count)?,
            illegal_carcass_count: non_negative("illegal_carcass_count", self.illegal_carcass_count)?,
        })
    }
}

fn fixed_length_code(field: &'static str, raw: &str, expected: usize) -> Result<String, RecordError> {
    let value = raw.to_lowercase();
    if value.chars().count() != expected {
        return Err(RecordError::InvalidLength {
            field,
            expected,
            value: raw.to_string(),
        });
    }
    Ok(value)
}

fn non_negative(field: &'static str, value: i64) -> Result<u32, RecordError> {
    if value < 0 {
        return Err(RecordError::Negative { field, value });
    }
    u32::try_from(value).map_err(|_| RecordError::OutOfRange { field, value })
}

impl SiteRecord {
    /// Build a record from a loosely-typed JSON object (API payload or an
    /// already-parsed CSV row). Numbers may be JSON integers or integer strings.
    pub fn from_json(json: Value) -> Result<Self, RecordError> {
        match json {
            Value::Object(map) => draft_from_map(&map)?.validate(),
            _ => Err(RecordError::InvalidJson("Expected JSON object".to_string())),
        }
    }

    /// Build records from a JSON array, failing on the first invalid item.
    /// A single object is accepted as a one-element batch.
    pub fn from_json_array(json: Value) -> Result<Vec<Self>, RecordError> {
        match json {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(index, item)| {
                    Self::from_json(item).map_err(|source| RecordError::InBatch {
                        index,
                        source: Box::new(source),
                    })
                })
                .collect(),
            Value::Object(_) => Ok(vec![Self::from_json(json)?]),
            _ => Err(RecordError::InvalidJson("Expected JSON array of records".to_string())),
        }
    }
}

fn draft_from_map(map: &Map<String, Value>) -> Result<SiteRecordDraft, RecordError> {
    Ok(SiteRecordDraft {
        un_region: text_field(map, "un_region")?,
        subregion_name: text_field(map, "subregion_name")?,
        subregion_id: text_field(map, "subregion_id")?,
        country_name: text_field(map, "country_name")?,
        country_code: text_field(map, "country_code")?,
        site_id: text_field(map, "site_id")?,
        site_name: text_field(map, "site_name")?,
        year: integer_field(map, "year")?,
        carcass_count: integer_field(map, "carcass_count")?,
        illegal_carcass_count: integer_field(map, "illegal_carcass_count")?,
    })
}

fn lookup<'a>(map: &'a Map<String, Value>, field: &'static str) -> Result<&'a Value, RecordError> {
    FIELD_ALIASES
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, aliases)| *aliases)
        .unwrap_or(&[])
        .iter()
        .find_map(|alias| map.get(*alias))
        .filter(|value| !value.is_null())
        .ok_or(RecordError::MissingRequiredField(field))
}

fn text_field(map: &Map<String, Value>, field: &'static str) -> Result<String, RecordError> {
    match lookup(map, field)? {
        Value::String(s) => Ok(s.clone()),
        _ => Err(RecordError::NotAString { field }),
    }
}

fn integer_field(map: &Map<String, Value>, field: &'static str) -> Result<i64, RecordError> {
    let value = lookup(map, field)?;
    let parsed = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| RecordError::NotAnInteger {
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn candidate() -> Value {
        json!({
            "un_region": "Africa",
            "subregion_name": "Central Africa",
            "subregion_id": "CA",
            "country_name": "Gabon",
            "country_code": "GA",
            "site_id": "LOP",
            "site_name": "Lope",
            "year": 2012,
            "carcass_count": 14,
            "illegal_carcass_count": 9
        })
    }

    #[test]
    fn valid_candidate_is_normalized() {
        let record = SiteRecord::from_json(candidate()).unwrap();
        assert_eq!(record.site_id(), "lop");
        assert_eq!(record.country_code(), "ga");
        assert_eq!(record.subregion_id(), "ca");
        assert_eq!(record.country_name(), "Gabon");
        assert_eq!(record.year(), 2012);
        assert_eq!(record.carcass_count(), 14);
        assert_eq!(record.illegal_carcass_count(), 9);
    }

    #[test]
    fn serde_round_trip_preserves_record() {
        let record = SiteRecord::from_json(candidate()).unwrap();
        let text = serde_json::to_string(&record).unwrap();
        let back: SiteRecord = serde_json::from_str(&text).unwrap();
        assert_eq!(record, back);
    }

    #[test]
    fn deserialize_runs_validation() {
        let mut value = serde_json::to_value(SiteRecord::from_json(candidate()).unwrap()).unwrap();
        value["site_id"] = json!("LOPE");
        assert!(serde_json::from_value::<SiteRecord>(value).is_err());
    }

    #[test]
    fn dataset_column_names_and_string_numbers_are_accepted() {
        let record = SiteRecord::from_json(json!({
            "UNRegion": "Africa",
            "SubregionName": "Central Africa",
            "SubregionID": "ca",
            "CountryName": "Cameroon",
            "CountryCode": "cm",
            "MIKEsiteID": "BBK",
            "MIKEsiteName": "Boumba Bek",
            "year": "2008",
            "TotalNumberofCarcasses": " 3 ",
            "NumberofIllegalCarcasses": "2"
        }))
        .unwrap();
        assert_eq!(record.site_id(), "bbk");
        assert_eq!(record.year(), 2008);
        assert_eq!(record.carcass_count(), 3);
    }

    #[test]
    fn site_id_must_be_three_characters() {
        for bad in ["LO", "LOPE", "", " LOP ", "LOP "] {
            let mut value = candidate();
            value["site_id"] = json!(bad);
            let err = SiteRecord::from_json(value).unwrap_err();
            assert!(matches!(err, RecordError::InvalidLength { field: "site_id", expected: 3, .. }));
        }
    }

    #[test]
    fn codes_must_be_two_characters() {
        let mut value = candidate();
        value["country_code"] = json!("GAB");
        assert_eq!(SiteRecord::from_json(value).unwrap_err().field(), Some("country_code"));

        let mut value = candidate();
        value["subregion_id"] = json!("C");
        assert_eq!(SiteRecord::from_json(value).unwrap_err().field(), Some("subregion_id"));
    }

    #[test]
    fn negative_numbers_are_rejected() {
        for field in ["year", "carcass_count", "illegal_carcass_count"] {
            let mut value = candidate();
            value[field] = json!(-1);
            let err = SiteRecord::from_json(value).unwrap_err();
            assert_eq!(err, RecordError::Negative { field, value: -1 });
        }
    }

    #[test]
    fn illegal_count_above_total_is_allowed() {
        let mut value = candidate();
        value["illegal_carcass_count"] = json!(50);
        assert!(SiteRecord::from_json(value).is_ok());
    }

    #[test]
    fn missing_and_mistyped_fields() {
        let mut value = candidate();
        value.as_object_mut().unwrap().remove("year");
        assert_eq!(SiteRecord::from_json(value).unwrap_err(), RecordError::MissingRequiredField("year"));

        let mut value = candidate();
        value["carcass_count"] = json!(1.5);
        assert!(matches!(
            SiteRecord::from_json(value).unwrap_err(),
            RecordError::NotAnInteger { field: "carcass_count", .. }
        ));

        let mut value = candidate();
        value["site_name"] = json!(12);
        assert_eq!(
            SiteRecord::from_json(value).unwrap_err(),
            RecordError::NotAString { field: "site_name" }
        );
    }

    #[test]
    fn out_of_range_count_is_rejected() {
        let mut value = candidate();
        value["carcass_count"] = json!(i64::from(u32::MAX) + 1);
        assert!(matches!(
            SiteRecord::from_json(value).unwrap_err(),
            RecordError::OutOfRange { field: "carcass_count", .. }
        ));
    }

    #[test]
    fn batch_error_reports_index() {
        let mut bad = candidate();
        bad["site_id"] = json!("x");
        let err = SiteRecord::from_json_array(json!([candidate(), bad])).unwrap_err();
        assert_eq!(err.index(), Some(1));
        assert_eq!(err.field(), Some("site_id"));
    }

    #[test]
    fn non_object_input_is_invalid_json() {
        assert!(matches!(SiteRecord::from_json(json!(42)), Err(RecordError::InvalidJson(_))));
        assert!(matches!(SiteRecord::from_json_array(json!("x")), Err(RecordError::InvalidJson(_))));
    }
}
