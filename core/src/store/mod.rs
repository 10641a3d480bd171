pub mod aggregation;

pub use aggregation::{AggregationStore, DEFAULT_RETENTION};
