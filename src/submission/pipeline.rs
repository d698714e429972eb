use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use futures_util::future;
use serde_json::{Map, Value};

use crate::sink::{Sink, SinkError, SinkResult};
use crate::submission::record::Submission;

/// What it takes for an append to count as successful overall.
#[derive(Debug, Clone, PartialEq)]
pub enum SuccessPolicy {
    /// Any sink accepting the write is enough.
    Any,
    /// The named sink must accept the write.
    Sink(String),
}

/// Aggregate of all per-sink results for one submission.
#[derive(Debug)]
pub struct AppendOutcome {
    pub submission: Submission,
    pub results: Vec<SinkResult>,
    pub overall_succeeded: bool,
}

impl AppendOutcome {
    /// Assigned id from the first sink that produced one.
    pub fn assigned_id(&self) -> Option<i64> {
        self.results.iter().find_map(|r| r.assigned_id)
    }

    /// Error messages from the sinks that failed, joined for reporting.
    pub fn error_summary(&self) -> String {
        self.results
            .iter()
            .filter_map(|r| r.error.as_deref())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Drives one normalized submission through every configured sink.
///
/// Sinks are independent: each write runs concurrently under its own
/// timeout, failures are captured per sink rather than propagated, and the
/// result vector keeps the configured sink order.
pub struct SubmissionAppender {
    sinks: Vec<Arc<dyn Sink>>,
    timeout: Duration,
    policy: SuccessPolicy,
}

impl SubmissionAppender {
    pub fn new(sinks: Vec<Arc<dyn Sink>>, timeout: Duration, policy: SuccessPolicy) -> Self {
        SubmissionAppender {
            sinks,
            timeout,
            policy,
        }
    }

    pub async fn append(&self, raw: &Map<String, Value>) -> AppendOutcome {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let submission = Submission::from_raw(timestamp, raw);

        let writes = self
            .sinks
            .iter()
            .map(|sink| self.write_one(sink.as_ref(), &submission));
        let results = future::join_all(writes).await;

        let overall_succeeded = match &self.policy {
            SuccessPolicy::Any => results.iter().any(|r| r.succeeded),
            SuccessPolicy::Sink(name) => results.iter().any(|r| r.succeeded && r.sink == *name),
        };

        AppendOutcome {
            submission,
            results,
            overall_succeeded,
        }
    }

    async fn write_one(&self, sink: &dyn Sink, submission: &Submission) -> SinkResult {
        match tokio::time::timeout(self.timeout, sink.append(submission)).await {
            Ok(Ok(assigned_id)) => SinkResult::ok(sink.name(), assigned_id),
            Ok(Err(e)) => {
                tracing::warn!("Sink {} failed to accept submission: {e}", sink.name());
                SinkResult::failed(sink.name(), e.to_string())
            }
            Err(_) => {
                let e = SinkError::Unavailable(format!("timed out after {:?}", self.timeout));
                tracing::warn!("Sink {} failed to accept submission: {e}", sink.name());
                SinkResult::failed(sink.name(), e.to_string())
            }
        }
    }
}
