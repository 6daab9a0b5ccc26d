//! Audit Sinks
//!
//! `FileAuditLog` appends one line per entry to a plain-text log.
//! `MemoryAuditLog` keeps entries in process, for embedding and tests.

use super::{AuditEntry, AuditSink};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};

/// Append-only audit log file
#[derive(Debug)]
pub struct FileAuditLog {
    path: PathBuf,

    /// Serializes appends so concurrent lines never interleave
    write_lock: Mutex<()>,
}

impl FileAuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AuditSink for FileAuditLog {
    async fn append(&self, entry: &AuditEntry) -> Result<()> {
        let mut line = entry.to_line();
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create audit directory {:?}", parent))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open audit log {:?}", self.path))?;
        file.write_all(line.as_bytes())
            .await
            .with_context(|| format!("Failed to append to audit log {:?}", self.path))?;
        file.flush().await?;
        Ok(())
    }
}

/// In-memory audit log
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    records: RwLock<Vec<AuditEntry>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries in append order
    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.records.read().await.clone()
    }

    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditLog {
    async fn append(&self, entry: &AuditEntry) -> Result<()> {
        self.records.write().await.push(entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_log_appends_lines() {
        let dir = TempDir::new().unwrap();
        let log = FileAuditLog::new(dir.path().join("audit.log"));

        log.append(&AuditEntry::new("alice", "ls -la", "total 0")).await.unwrap();
        log.append(&AuditEntry::new("API", "false", "错误: exit 1")).await.unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" - User: alice, Command: ls -la, Result: total 0"));
        assert!(lines[1].contains("User: API, Command: false, Result: 错误: exit 1"));
    }

    #[tokio::test]
    async fn test_file_log_preserves_existing_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.log");
        std::fs::write(&path, "earlier line\n").unwrap();

        FileAuditLog::new(&path)
            .append(&AuditEntry::new("u", "pwd", "/"))
            .await
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("earlier line\n"));
        assert_eq!(content.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_file_log_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("nested").join("audit.log");
        FileAuditLog::new(&path)
            .append(&AuditEntry::new("u", "pwd", "/"))
            .await
            .unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_file_log_unwritable_path_errors() {
        let dir = TempDir::new().unwrap();
        // a directory where the file should be
        let log = FileAuditLog::new(dir.path());
        assert!(log.append(&AuditEntry::new("u", "c", "r")).await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_appends_do_not_interleave() {
        let dir = TempDir::new().unwrap();
        let log = Arc::new(FileAuditLog::new(dir.path().join("audit.log")));

        let tasks: Vec<_> = (0..20)
            .map(|i| {
                let log = Arc::clone(&log);
                tokio::spawn(async move {
                    let entry = AuditEntry::new(format!("user{}", i), format!("echo {}", i), "x".repeat(500));
                    log.append(&entry).await.unwrap();
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 20);
        for line in lines {
            let user = line.split("User: ").nth(1).unwrap().split(',').next().unwrap();
            let n = user.trim_start_matches("user");
            assert!(line.contains(&format!("Command: echo {}, Result:", n)));
        }
    }

    #[tokio::test]
    async fn test_memory_log_keeps_append_order() {
        let log = MemoryAuditLog::new();
        log.append(&AuditEntry::new("alice", "rm a.txt", "")).await.unwrap();
        log.append(&AuditEntry::new("bob", "ls -la", "total 0")).await.unwrap();
        log.append(&AuditEntry::new("alice", "ls /tmp", "x")).await.unwrap();

        assert_eq!(log.record_count().await, 3);
        let commands: Vec<_> = log.entries().await.into_iter().map(|e| e.command).collect();
        assert_eq!(commands, vec!["rm a.txt", "ls -la", "ls /tmp"]);
    }
}
