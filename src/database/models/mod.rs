pub mod country_aggregate;
pub mod site_record;

pub use country_aggregate::CountryAggregate;
pub use site_record::{SiteKey, SiteRecord};
