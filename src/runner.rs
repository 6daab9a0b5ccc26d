//! Execution Pipeline
//!
//! resolve → substitute → execute → decode → audit, sequentially, per request.
//! Lookup and (in strict mode) placeholder validation happen before anything
//! runs; once a process has been attempted the outcome is always audited and
//! returned as an [`ExecutionResult`], never as an error.

use crate::audit::AuditRecorder;
use crate::catalog::{CommandCatalog, CommandDefinition};
use crate::metrics;
use crate::tools::{
    incomplete_parameters, resolve_template, substitute, ExecutionResult, Platform, ShellExecutor,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn, Instrument};

/// Errors that keep a request from producing an [`ExecutionResult`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RunError {
    #[error("Command '{0}' not found")]
    NotFound(String),

    #[error("Command '{command}' has unresolved parameters: {}", missing.join(", "))]
    SubstitutionIncomplete { command: String, missing: Vec<String> },

    /// The runtime shut down before the execution task finished
    #[error("Execution of '{0}' was interrupted")]
    Interrupted(String),
}

/// One caller request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub command_name: String,
    pub values: HashMap<String, String>,
    pub principal: String,
}

impl ExecutionRequest {
    pub fn new(command_name: impl Into<String>, principal: impl Into<String>) -> Self {
        Self {
            command_name: command_name.into(),
            values: HashMap::new(),
            principal: principal.into(),
        }
    }

    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

/// A command resolved and substituted, ready to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedCommand {
    pub name: String,
    pub platform: Platform,

    /// Platform template before substitution
    pub template: String,

    /// Final command line handed to the shell
    pub text: String,
}

/// Resolve and substitute a definition for a platform
///
/// With `strict` set, missing required values or leftover placeholders are
/// rejected; otherwise they flow through to the shell as-is.
pub fn prepare_definition(
    definition: &CommandDefinition,
    platform: Platform,
    values: &HashMap<String, String>,
    strict: bool,
) -> Result<PreparedCommand, RunError> {
    let template = resolve_template(definition, platform);
    let text = substitute(&template, &definition.parameters, values);

    if strict {
        let missing = incomplete_parameters(&text, &definition.parameters, values);
        if !missing.is_empty() {
            return Err(RunError::SubstitutionIncomplete {
                command: definition.name.clone(),
                missing,
            });
        }
    }

    Ok(PreparedCommand {
        name: definition.name.clone(),
        platform,
        template,
        text,
    })
}

/// Runs catalog commands end to end
#[derive(Clone)]
pub struct CommandRunner {
    catalog: Arc<dyn CommandCatalog>,
    executor: ShellExecutor,
    recorder: AuditRecorder,
    strict_placeholders: bool,
}

impl std::fmt::Debug for CommandRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRunner")
            .field("executor", &self.executor)
            .field("strict_placeholders", &self.strict_placeholders)
            .finish_non_exhaustive()
    }
}

impl CommandRunner {
    pub fn new(
        catalog: Arc<dyn CommandCatalog>,
        executor: ShellExecutor,
        recorder: AuditRecorder,
    ) -> Self {
        Self {
            catalog,
            executor,
            recorder,
            strict_placeholders: false,
        }
    }

    /// Reject incomplete substitutions instead of running them
    pub fn with_strict_placeholders(mut self, strict: bool) -> Self {
        self.strict_placeholders = strict;
        self
    }

    pub fn platform(&self) -> Platform {
        self.executor.config().platform
    }

    pub fn catalog(&self) -> &Arc<dyn CommandCatalog> {
        &self.catalog
    }

    /// Resolve and substitute without running anything
    pub async fn prepare(
        &self,
        name: &str,
        values: &HashMap<String, String>,
    ) -> Result<PreparedCommand, RunError> {
        let definition = self.catalog.resolve(name).await.ok_or_else(|| {
            metrics::COMMANDS_NOT_FOUND_TOTAL.inc();
            RunError::NotFound(name.to_string())
        })?;
        prepare_definition(&definition, self.platform(), values, self.strict_placeholders)
    }

    /// Run a named command for `principal`
    pub async fn execute(
        &self,
        name: &str,
        values: &HashMap<String, String>,
        principal: &str,
    ) -> Result<ExecutionResult, RunError> {
        self.run_inner(name, values, principal, None).await
    }

    /// Like [`execute`](Self::execute), killing the process if `cancel` fires
    pub async fn execute_with_cancel(
        &self,
        name: &str,
        values: &HashMap<String, String>,
        principal: &str,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult, RunError> {
        self.run_inner(name, values, principal, Some(cancel)).await
    }

    pub async fn run(&self, request: &ExecutionRequest) -> Result<ExecutionResult, RunError> {
        self.execute(&request.command_name, &request.values, &request.principal)
            .await
    }

    /// Catalog removal hook; nothing in the pipeline caches definitions
    pub fn command_removed(&self, name: &str) {
        debug!("Command '{}' removed from catalog", name);
    }

    #[instrument(skip(self, values, cancel), fields(platform = %self.platform()))]
    async fn run_inner(
        &self,
        name: &str,
        values: &HashMap<String, String>,
        principal: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<ExecutionResult, RunError> {
        let prepared = match self.prepare(name, values).await {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!("Rejected request: {}", e);
                return Err(e);
            }
        };

        // detached: a dropped caller (client disconnect) must not kill the
        // process or skip its audit entry
        let executor = self.executor.clone();
        let recorder = self.recorder.clone();
        let cancel = cancel.cloned();
        let command = name.to_string();
        let principal = principal.to_string();
        let task = tokio::spawn(
            async move {
                let result = match &cancel {
                    Some(token) => executor.execute_with_cancel(&prepared.text, token).await,
                    None => executor.execute(&prepared.text).await,
                };

                metrics::observe_execution(&command, result.status_label(), result.duration_ms);
                info!("{}: {}", command, result.summary());

                recorder.record(&principal, &prepared.text, &result).await;
                result
            }
            .in_current_span(),
        );

        match task.await {
            Ok(result) => Ok(result),
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => {
                error!("Execution task for '{}' did not finish: {}", name, e);
                Err(RunError::Interrupted(name.to_string()))
            }
        }
    }
}
