//! Command Resolution and Execution
//!
//! The leaves of the execution pipeline:
//! - `platform.rs`: per-OS template table and platform detection
//! - `template.rs`: `{{name}}` placeholder substitution
//! - `executor.rs`: shell execution with timeout and cancellation
//! - `timeout.rs`: deadline racing
//! - `decode.rs`: legacy code page / UTF-8 output decoding
//!
//! Commands run as one shell line, so the shell's own quoting rules apply
//! to substituted values. Nothing here escapes them.

mod decode;
mod executor;
mod platform;
mod template;
mod timeout;

pub use decode::{Decoded, OutputDecoder, UnknownCodePage, DEFAULT_CODE_PAGE};
pub use executor::{
    ExecutionResult, ExecutorConfig, FailureKind, ShellExecutor, DEFAULT_TIMEOUT_SECS,
    MAX_OUTPUT_SIZE,
};
pub use platform::{known_names, known_templates, resolve_template, Platform, PlatformTemplates};
pub use template::{incomplete_parameters, placeholders, substitute};
pub use timeout::{Deadline, ExecutionTimeout};
