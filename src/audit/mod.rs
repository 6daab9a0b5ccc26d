//! Audit Trail
//!
//! Every execution attempt produces exactly one [`AuditEntry`], whether the
//! command succeeded, failed, timed out or never spawned. Entries are handed
//! to an [`AuditSink`]; a sink failure is logged and counted but never changes
//! the result returned to the caller.

mod history;

pub use history::{FileAuditLog, MemoryAuditLog};

use crate::metrics;
use crate::tools::ExecutionResult;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error};

/// Prefix marking a failed execution in the recorded result text
pub const FAILURE_MARKER: &str = "错误: ";

/// One recorded execution attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique identifier for this record (UUID)
    pub id: String,

    /// When the attempt finished (UTC)
    pub timestamp: DateTime<Utc>,

    /// Who triggered it ("API" for the HTTP adapter)
    pub principal: String,

    /// Final command text that was attempted
    pub command: String,

    /// Result summary, see [`result_summary`]
    pub result: String,
}

impl AuditEntry {
    pub fn new(
        principal: impl Into<String>,
        command: impl Into<String>,
        result: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            principal: principal.into(),
            command: command.into(),
            result: result.into(),
        }
    }

    /// Render as a single log line (without the trailing newline)
    ///
    /// `2024-05-01T08:30:00.123Z - User: alice, Command: ls -la, Result: total 0`
    pub fn to_line(&self) -> String {
        format!(
            "{} - User: {}, Command: {}, Result: {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            escape_line_breaks(&self.principal),
            escape_line_breaks(&self.command),
            escape_line_breaks(&self.result),
        )
    }
}

impl fmt::Display for AuditEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

fn escape_line_breaks(text: &str) -> String {
    text.replace('\r', "\\r").replace('\n', "\\n")
}

/// The text recorded for an execution
///
/// Stdout if non-empty, otherwise stderr, otherwise the error message behind
/// [`FAILURE_MARKER`].
pub fn result_summary(result: &ExecutionResult) -> String {
    if !result.stdout.is_empty() {
        result.stdout.clone()
    } else if !result.stderr.is_empty() {
        result.stderr.clone()
    } else if let Some(message) = &result.error_message {
        format!("{}{}", FAILURE_MARKER, message)
    } else {
        String::new()
    }
}

/// Append-only destination for audit entries
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, entry: &AuditEntry) -> anyhow::Result<()>;
}

/// Builds entries from execution results and hands them to a sink
#[derive(Clone)]
pub struct AuditRecorder {
    sink: Arc<dyn AuditSink>,
}

impl fmt::Debug for AuditRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditRecorder").finish_non_exhaustive()
    }
}

impl AuditRecorder {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Record one attempt; sink errors are logged, not returned
    pub async fn record(
        &self,
        principal: &str,
        command: &str,
        result: &ExecutionResult,
    ) -> AuditEntry {
        let entry = AuditEntry::new(principal, command, result_summary(result));
        match self.sink.append(&entry).await {
            Ok(()) => debug!(id = %entry.id, principal, "Audit entry recorded"),
            Err(e) => {
                metrics::AUDIT_WRITE_FAILURES_TOTAL.inc();
                error!(principal, command, "Failed to write audit entry: {:#}", e);
            }
        }
        entry
    }
}
