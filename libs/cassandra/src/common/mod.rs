//! Error type and startup retry shared by the connector and bundle

pub mod error;
pub mod retry;

pub use error::{CassandraError, CassandraResult};
pub use retry::{RetryConfig, retry, retry_with_backoff};
