// Configuration File Support
//
// TOML configuration with environment variable overrides.
// Loaded from the XDG config directory by default: ~/.config/smartcode/config.toml

use crate::tools::{ExecutorConfig, OutputDecoder, Platform, ShellExecutor, DEFAULT_CODE_PAGE};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub catalog: CatalogConfig,
    pub audit: AuditConfig,
    pub execution: ExecutionConfig,
    pub server: ServerConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CatalogConfig {
    /// Path of the commands YAML file
    pub path: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("commands.yaml"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuditConfig {
    /// Path of the append-only audit log
    pub path: PathBuf,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("audit.log"),
        }
    }
}

/// Command execution configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Wall-clock limit per command in seconds
    pub timeout_secs: u64,

    /// Maximum decoded output per stream in bytes
    pub max_output_size: usize,

    /// Working directory for commands (default: current directory)
    pub working_dir: Option<PathBuf>,

    /// Platform class (auto, windows, posix)
    pub platform: String,

    /// Code page of Windows console output
    pub code_page: String,

    /// Reject commands with missing required values or leftover placeholders
    pub strict_placeholders: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: crate::tools::DEFAULT_TIMEOUT_SECS,
            max_output_size: crate::tools::MAX_OUTPUT_SIZE,
            working_dir: None,
            platform: "auto".to_string(),
            code_page: DEFAULT_CODE_PAGE.to_string(),
            strict_placeholders: false,
        }
    }
}

impl ExecutionConfig {
    /// Platform after resolving `auto`
    pub fn platform(&self) -> Result<Platform> {
        if self.platform.eq_ignore_ascii_case("auto") {
            return Ok(Platform::current());
        }
        self.platform.parse().map_err(|e: String| anyhow::anyhow!(e))
    }

    /// Build the shell executor described by this section
    pub fn executor(&self) -> Result<ShellExecutor> {
        let platform = self.platform()?;
        let decoder = OutputDecoder::with_code_page(platform, &self.code_page)?;
        let config = ExecutorConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            max_output_size: self.max_output_size,
            working_dir: self.working_dir.clone(),
            platform,
        };
        Ok(ShellExecutor::with_decoder(config, decoder))
    }
}

/// HTTP API configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// Key expected in the X-API-Key header
    pub api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            api_key: None,
        }
    }
}

impl Config {
    /// Load configuration from the default XDG config directory
    ///
    /// A missing file yields the default configuration.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    ///
    /// Environment overrides are applied and the result validated whether or
    /// not the file exists.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file from {:?}", path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file from {:?}", path))?;
            tracing::info!("Loaded configuration from {:?}", path);
            config
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            Self::default()
        };

        let config = config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/smartcode/config.toml` on Linux
    pub fn config_path() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("com", "smartcode", "SmartCode") {
            proj_dirs.config_dir().join("config.toml")
        } else {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config").join("smartcode").join("config.toml")
        }
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Environment variables take precedence over config file values:
    /// - SMARTCODE_LOG_LEVEL
    /// - SMARTCODE_LOG_FORMAT
    /// - SMARTCODE_CATALOG_PATH
    /// - SMARTCODE_AUDIT_PATH
    /// - SMARTCODE_TIMEOUT_SECS
    /// - SMARTCODE_PLATFORM
    /// - SMARTCODE_STRICT_PLACEHOLDERS
    /// - SMARTCODE_PORT
    /// - SMARTCODE_API_KEY
    fn apply_env_overrides(mut self) -> Self {
        if let Ok(level) = std::env::var("SMARTCODE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("SMARTCODE_LOG_FORMAT") {
            self.logging.format = format;
        }

        if let Ok(path) = std::env::var("SMARTCODE_CATALOG_PATH") {
            self.catalog.path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("SMARTCODE_AUDIT_PATH") {
            self.audit.path = PathBuf::from(path);
        }

        if let Ok(timeout) = std::env::var("SMARTCODE_TIMEOUT_SECS") {
            if let Ok(timeout) = timeout.parse::<u64>() {
                if timeout > 0 {
                    self.execution.timeout_secs = timeout;
                }
            }
        }
        if let Ok(platform) = std::env::var("SMARTCODE_PLATFORM") {
            if platform.eq_ignore_ascii_case("auto") || platform.parse::<Platform>().is_ok() {
                self.execution.platform = platform;
            }
        }
        if let Ok(strict) = std::env::var("SMARTCODE_STRICT_PLACEHOLDERS") {
            self.execution.strict_placeholders =
                strict.parse().unwrap_or(self.execution.strict_placeholders);
        }

        if let Ok(port) = std::env::var("SMARTCODE_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                if port > 0 {
                    self.server.port = port;
                }
            }
        }
        if let Ok(key) = std::env::var("SMARTCODE_API_KEY") {
            if !key.is_empty() {
                self.server.api_key = Some(key);
            }
        }

        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            ),
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => anyhow::bail!(
                "Invalid log format: {}. Must be one of: json, pretty, compact",
                self.logging.format
            ),
        }

        if self.catalog.path.as_os_str().is_empty() {
            anyhow::bail!("Catalog path must not be empty");
        }
        if self.audit.path.as_os_str().is_empty() {
            anyhow::bail!("Audit log path must not be empty");
        }

        if self.execution.timeout_secs == 0 {
            anyhow::bail!("Execution timeout must be > 0 seconds");
        }
        if self.execution.max_output_size == 0 {
            anyhow::bail!("Maximum output size must be > 0");
        }
        self.execution.platform()?;
        if encoding_rs::Encoding::for_label(self.execution.code_page.trim().as_bytes()).is_none() {
            anyhow::bail!("Unknown code page: {}", self.execution.code_page);
        }

        if self.server.port == 0 {
            anyhow::bail!("Server port must be > 0");
        }
        if matches!(self.server.api_key.as_deref(), Some(key) if key.trim().is_empty()) {
            anyhow::bail!("Server API key must not be blank");
        }

        Ok(())
    }
}
