pub mod aggregation;

pub use aggregation::AggregationView;
