use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::submission::record::Submission;

use super::{Sink, SinkError};

/// Append-only local record log: a pretty-printed JSON array of submissions
/// in receipt order.
///
/// Appends serialize behind a mutex (single-writer discipline) and rewrite
/// the file through a temp file + rename, so a crash mid-write never
/// clobbers previously stored records.
pub struct FileJournalSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileJournalSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        FileJournalSink {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the current journal. A missing, empty, or malformed file is an
    /// empty journal, never an error: a corrupt journal must not block new
    /// appends.
    async fn read_entries(&self) -> Vec<Submission> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => match serde_json::from_slice::<Vec<Submission>>(&bytes) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(
                        "Journal {} unreadable, starting fresh: {e}",
                        self.path.display()
                    );
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        }
    }
}

#[async_trait]
impl Sink for FileJournalSink {
    fn name(&self) -> &str {
        "journal"
    }

    async fn append(&self, submission: &Submission) -> Result<Option<i64>, SinkError> {
        let _guard = self.write_lock.lock().await;

        let mut entries = self.read_entries().await;
        entries.push(submission.clone());

        let body = serde_json::to_vec_pretty(&entries)
            .map_err(|e| SinkError::Serialization(e.to_string()))?;

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &body)
            .await
            .map_err(|e| SinkError::Unavailable(format!("write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| SinkError::Unavailable(format!("rename {}: {e}", self.path.display())))?;

        Ok(None)
    }
}
