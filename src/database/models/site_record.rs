use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

use crate::database::record::{RecordError, SiteRecordDraft};

/// Primary key of a site record: one site in one year
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawSiteKey")]
pub struct SiteKey {
    site_id: String,
    year: u32,
}

#[derive(Deserialize)]
struct RawSiteKey {
    site_id: String,
    year: u32,
}

impl From<RawSiteKey> for SiteKey {
    fn from(raw: RawSiteKey) -> Self {
        SiteKey::new(raw.site_id, raw.year)
    }
}

impl SiteKey {
    /// Site ids are stored lower-cased, so keys are normalized the same way.
    pub fn new(site_id: impl AsRef<str>, year: u32) -> Self {
        Self {
            site_id: site_id.as_ref().trim().to_lowercase(),
            year,
        }
    }

    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    pub fn year(&self) -> u32 {
        self.year
    }
}

impl fmt::Display for SiteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.site_id, self.year)
    }
}

/// One year's carcass observation at one MIKE site.
///
/// Values only come into existence through [`SiteRecordDraft::validate`] (or a
/// row read back from the store), so every `SiteRecord` satisfies the code
/// length and non-negativity rules. Deserialization runs the same validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(try_from = "SiteRecordDraft")]
pub struct SiteRecord {
    pub(crate) un_region: String,
    pub(crate) subregion_name: String,
    pub(crate) subregion_id: String,
    pub(crate) country_name: String,
    pub(crate) country_code: String,
    pub(crate) site_id: String,
    pub(crate) site_name: String,
    pub(crate) year: u32,
    pub(crate) carcass_count: u32,
    pub(crate) illegal_carcass_count: u32,
}

impl TryFrom<SiteRecordDraft> for SiteRecord {
    type Error = RecordError;

    fn try_from(draft: SiteRecordDraft) -> Result<Self, Self::Error> {
        draft.validate()
    }
}

impl SiteRecord {
    pub fn key(&self) -> SiteKey {
        SiteKey {
            site_id: self.site_id.clone(),
            year: self.year,
        }
    }

    pub fn un_region(&self) -> &str {
        &self.un_region
    }

    pub fn subregion_name(&self) -> &str {
        &self.subregion_name
    }

    pub fn subregion_id(&self) -> &str {
        &self.subregion_id
    }

    pub fn country_name(&self) -> &str {
        &self.country_name
    }

    pub fn country_code(&self) -> &str {
        &self.country_code
    }

    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    pub fn site_name(&self) -> &str {
        &self.site_name
    }

    pub fn year(&self) -> u32 {
        self.year
    }

    pub fn carcass_count(&self) -> u32 {
        self.carcass_count
    }

    pub fn illegal_carcass_count(&self) -> u32 {
        self.illegal_carcass_count
    }

    /// Editable copy, e.g. to change counts before an update
    pub fn to_draft(&self) -> SiteRecordDraft {
        SiteRecordDraft {
            un_region: self.un_region.clone(),
            subregion_name: self.subregion_name.clone(),
            subregion_id: self.subregion_id.clone(),
            country_name: self.country_name.clone(),
            country_code: self.country_code.clone(),
            site_id: self.site_id.clone(),
            site_name: self.site_name.clone(),
            year: i64::from(self.year),
            carcass_count: i64::from(self.carcass_count),
            illegal_carcass_count: i64::from(self.illegal_carcass_count),
        }
    }
}
