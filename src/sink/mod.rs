pub mod journal;
pub mod relational;
pub mod sheet;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::submission::record::Submission;

/// Errors a sink can surface from a single append attempt.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Sink cannot be reached or opened (connectivity, auth, timeout).
    #[error("sink unavailable: {0}")]
    Unavailable(String),

    /// Backing store accepted the connection but rejected the write.
    #[error("write rejected: {0}")]
    Rejected(String),

    /// Record could not be encoded for this sink.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

/// Outcome of one sink's write attempt.
#[derive(Debug, Clone, Serialize)]
pub struct SinkResult {
    pub sink: String,
    pub succeeded: bool,
    pub assigned_id: Option<i64>,
    pub error: Option<String>,
}

impl SinkResult {
    pub fn ok(sink: &str, assigned_id: Option<i64>) -> Self {
        SinkResult {
            sink: sink.to_string(),
            succeeded: true,
            assigned_id,
            error: None,
        }
    }

    pub fn failed(sink: &str, error: String) -> Self {
        SinkResult {
            sink: sink.to_string(),
            succeeded: false,
            assigned_id: None,
            error: Some(error),
        }
    }
}

/// A backing store capable of durably accepting one appended record.
///
/// `append` is all-or-nothing for a single record: on failure it leaves no
/// partial row behind. Sinks share no state with each other, so appends for
/// one submission may run concurrently.
#[async_trait]
pub trait Sink: Send + Sync {
    fn name(&self) -> &str;

    /// Durably append one record. Returns the store-assigned id where the
    /// backing store produces one (only the relational sink does).
    async fn append(&self, submission: &Submission) -> Result<Option<i64>, SinkError>;
}
