//! Append-only audit log of request outcomes.
//!
//! Every authenticated request produces exactly one record, whether it
//! was accepted, rate limited or failed on a dependency.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::Result;

/// One audited request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Authenticated API key
    pub api_key: String,
    /// Network origin of the request
    pub client_ip: String,
    /// Request path
    pub endpoint: String,
    /// Final HTTP status code
    pub status_code: u16,
    /// When the outcome was recorded
    pub requested_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Create a record stamped with the current time.
    pub fn new(
        api_key: impl Into<String>,
        client_ip: impl Into<String>,
        endpoint: impl Into<String>,
        status_code: u16,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            client_ip: client_ip.into(),
            endpoint: endpoint.into(),
            status_code,
            requested_at: Utc::now(),
        }
    }
}

/// Destination for audit records.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Append one record.
    async fn record(&self, record: &AuditRecord) -> Result<()>;
}

/// Audit log appending one JSON document per line to a file.
pub struct JsonLinesAuditLog {
    path: PathBuf,
    file: tokio::sync::Mutex<File>,
}

impl JsonLinesAuditLog {
    /// Open `path` for appending, creating it if needed.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        debug!(path = %path.display(), "Opened audit log");

        Ok(Self {
            path,
            file: tokio::sync::Mutex::new(file),
        })
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AuditLog for JsonLinesAuditLog {
    async fn record(&self, record: &AuditRecord) -> Result<()> {
        let mut line = serde_json::to_vec(record).map_err(std::io::Error::from)?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Audit log kept in memory, used when no file is configured and in tests.
#[derive(Default)]
pub struct MemoryAuditLog {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record appended so far.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    async fn record(&self, record: &AuditRecord) -> Result<()> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_log_appends_in_order() {
        let log = MemoryAuditLog::new();

        log.record(&AuditRecord::new("k", "1.1.1.1", "/a", 200)).await.unwrap();
        log.record(&AuditRecord::new("k", "1.1.1.1", "/a", 429)).await.unwrap();

        let statuses: Vec<u16> = log.records().iter().map(|r| r.status_code).collect();
        assert_eq!(statuses, vec![200, 429]);
    }

    #[tokio::test]
    async fn test_json_lines_log_appends() {
        let file_name = format!("rateguard-audit-{}.jsonl", uuid::Uuid::new_v4());
        let path = std::env::temp_dir().join(file_name);

        {
            let log = JsonLinesAuditLog::open(&path).await.unwrap();
            assert_eq!(log.path(), path.as_path());
            log.record(&AuditRecord::new("key-a", "10.0.0.1", "/api/v1/limited", 200))
                .await
                .unwrap();
        }
        {
            let log = JsonLinesAuditLog::open(&path).await.unwrap();
            log.record(&AuditRecord::new("key-b", "10.0.0.2", "/api/v1/limited", 401))
                .await
                .unwrap();
        }

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let records: Vec<AuditRecord> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].api_key, "key-a");
        assert_eq!(records[1].status_code, 401);

        tokio::fs::remove_file(&path).await.unwrap();
    }
}
