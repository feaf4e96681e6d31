pub mod ancestors;
pub mod config;
pub mod diagnostic;
pub mod errors;
pub mod indexing;
pub mod introspection;
pub mod job_queue;
pub mod listing;
pub mod model;
pub mod node_context;
pub mod offset;
pub mod query;
pub mod resolution;
pub mod synchronizer;
pub mod type_inferrer;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
