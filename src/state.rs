use std::sync::Arc;

use crate::auth::TokenAuthority;
use crate::database::RecordStore;
use crate::services::AggregationView;

/// Shared handles passed to every handler
#[derive(Clone)]
pub struct AppState {
    pub records: RecordStore,
    pub aggregates: AggregationView,
    pub tokens: Arc<TokenAuthority>,
}

impl AppState {
    pub fn new(records: RecordStore, tokens: TokenAuthority) -> Self {
        Self {
            aggregates: AggregationView::new(records.clone()),
            records,
            tokens: Arc::new(tokens),
        }
    }
}
