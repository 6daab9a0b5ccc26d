//! SmartCode Library
//!
//! Runs named shell commands from a catalog: resolves the platform template,
//! substitutes `{{placeholders}}`, executes through the host shell, decodes
//! the output, and appends an audit entry for every attempt.

pub mod audit;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod runner;
pub mod server;
pub mod tools;

pub use audit::{AuditEntry, AuditRecorder, AuditSink, FileAuditLog, MemoryAuditLog};
pub use catalog::{CatalogError, CommandCatalog, CommandDefinition, MemoryCatalog, YamlCatalog};
pub use runner::{CommandRunner, ExecutionRequest, PreparedCommand, RunError};
pub use tools::{ExecutionResult, Platform, ShellExecutor};
