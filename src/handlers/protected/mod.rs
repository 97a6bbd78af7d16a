// Protected handlers: a valid bearer token is required.
//
// Routes here are wrapped in `middleware::require_token` by the router, so
// handlers never look at the token themselves.

pub mod records;

pub use records::{record_delete, record_put, records_delete, records_patch, records_post, records_put};
