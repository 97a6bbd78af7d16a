pub mod manager;
pub mod models;
pub mod record;
pub mod repository;

pub use manager::{DatabaseManager, StoreError};
pub use models::{CountryAggregate, SiteKey, SiteRecord};
pub use record::{RecordError, SiteRecordDraft};
pub use repository::RecordStore;
