// Public handlers: no token required.
//
// Token acquisition plus every read route. Reads never touch the
// credential vault.

pub mod aggregates;
pub mod auth;
pub mod records;

pub use aggregates::{aggregate_get, aggregates_get};
pub use auth::{login_post, refresh_post};
pub use records::{record_get, records_get};
