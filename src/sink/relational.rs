use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use crate::submission::record::{FIELD_NAMES, Submission};

use super::{Sink, SinkError};

/// One stored row: the submission plus its server-assigned id.
#[derive(Debug, Clone, Serialize)]
pub struct StoredSubmission {
    pub id: i64,
    #[serde(flatten)]
    pub submission: Submission,
}

/// Single-table SQLite store. Ids are the autoincrement rowid, so ascending
/// id is the authoritative arrival order.
pub struct RelationalSink {
    pool: SqlitePool,
    path: PathBuf,
    insert_sql: String,
}

impl RelationalSink {
    /// Open the database file (creating it if missing) and ensure the
    /// schema exists. Called once at startup.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, sqlx::Error> {
        let path = path.as_ref().to_path_buf();

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let columns = FIELD_NAMES
            .iter()
            .map(|name| format!("{name} TEXT NOT NULL DEFAULT ''"))
            .collect::<Vec<_>>()
            .join(",\n                ");

        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS responses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                {columns}
            )"
        ))
        .execute(&pool)
        .await?;

        let insert_sql = format!(
            "INSERT INTO responses (timestamp, {}) VALUES ({})",
            FIELD_NAMES.join(", "),
            vec!["?"; FIELD_NAMES.len() + 1].join(", ")
        );

        Ok(RelationalSink {
            pool,
            path,
            insert_sql,
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.path
    }

    /// All rows, most recent first (descending id).
    pub async fn list_all(&self) -> Result<Vec<StoredSubmission>, sqlx::Error> {
        self.fetch("SELECT * FROM responses ORDER BY id DESC").await
    }

    /// All rows in arrival order (ascending id), as exported.
    pub async fn list_oldest_first(&self) -> Result<Vec<StoredSubmission>, sqlx::Error> {
        self.fetch("SELECT * FROM responses ORDER BY id ASC").await
    }

    async fn fetch(&self, query: &str) -> Result<Vec<StoredSubmission>, sqlx::Error> {
        let rows = sqlx::query(query).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_stored).collect()
    }
}

fn row_to_stored(row: &SqliteRow) -> Result<StoredSubmission, sqlx::Error> {
    let id: i64 = row.try_get("id")?;
    let timestamp: String = row.try_get("timestamp")?;

    let mut fields = BTreeMap::new();
    for name in FIELD_NAMES {
        fields.insert(name.to_string(), row.try_get::<String, _>(name)?);
    }

    Ok(StoredSubmission {
        id,
        submission: Submission::from_stored(timestamp, fields),
    })
}

#[async_trait]
impl Sink for RelationalSink {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn append(&self, submission: &Submission) -> Result<Option<i64>, SinkError> {
        let mut query = sqlx::query(&self.insert_sql).bind(&submission.timestamp);
        for name in FIELD_NAMES {
            query = query.bind(submission.value(name));
        }

        let result = query.execute(&self.pool).await.map_err(|e| match e {
            sqlx::Error::Database(db) => SinkError::Rejected(db.to_string()),
            other => SinkError::Unavailable(other.to_string()),
        })?;

        Ok(Some(result.last_insert_rowid()))
    }
}
