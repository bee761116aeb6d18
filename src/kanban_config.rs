//! Configuration for the kanban boards.
//!
//! Read from `.crm-kanban/kanban.toml` in the project directory and layered
//! file → environment → CLI. Every section and key is optional.
//!
//! # Configuration File Format
//!
//! ```toml
//! [backend]
//! base_url = "http://localhost:3000/api"
//! request_timeout_secs = 10
//!
//! [board]
//! unknown_stage = "catch_all"   # or "drop"
//! activation_distance = 8.0
//!
//! [server]
//! port = 3141
//! dev_mode = false
//!
//! [logging]
//! format = "pretty"             # or "json"
//! ```
//!
//! Environment overrides: `CRM_BACKEND_URL`, `CRM_REQUEST_TIMEOUT_SECS`.
//! A `.env` file in the project directory is loaded first if present.

use anyhow::{Context, Result};
use crm_kanban_core::controller::ControllerOptions;
use crm_kanban_core::drag::DEFAULT_ACTIVATION_DISTANCE;
use crm_kanban_core::UnknownStagePolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::KanbanError;

pub const CONFIG_DIR: &str = ".crm-kanban";
pub const CONFIG_FILE: &str = "kanban.toml";

pub const ENV_BACKEND_URL: &str = "CRM_BACKEND_URL";
pub const ENV_REQUEST_TIMEOUT: &str = "CRM_REQUEST_TIMEOUT_SECS";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines (default)
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Pretty => write!(f, "pretty"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => anyhow::bail!("Invalid log format '{}'. Valid values: pretty, json", s),
        }
    }
}

/// Where the CRM backend lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSection {
    /// Base URL every endpoint is joined onto
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout. A hung call counts as a failure and rolls back.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:3000/api".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardSection {
    /// Records whose stage matches no column
    #[serde(default)]
    pub unknown_stage: UnknownStagePolicy,
    /// Pointer travel in pixels before a press becomes a drag
    #[serde(default = "default_activation_distance")]
    pub activation_distance: f64,
}

fn default_activation_distance() -> f64 {
    DEFAULT_ACTIVATION_DISTANCE
}

impl Default for BoardSection {
    fn default() -> Self {
        Self {
            unknown_stage: UnknownStagePolicy::default(),
            activation_distance: default_activation_distance(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Permissive CORS and bind on all interfaces
    #[serde(default)]
    pub dev_mode: bool,
}

fn default_port() -> u16 {
    3141
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            dev_mode: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default)]
    pub format: LogFormat,
}

/// The complete kanban.toml structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KanbanToml {
    #[serde(default)]
    pub backend: BackendSection,
    #[serde(default)]
    pub board: BoardSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl KanbanToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse kanban.toml")
    }

    /// Load `kanban.toml` from `config_dir`, or defaults if it doesn't exist.
    pub fn load_or_default(config_dir: &Path) -> Result<Self> {
        let config_path = config_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize kanban.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Some(w) = check_base_url(&self.backend.base_url) {
            warnings.push(w);
        }
        if self.backend.request_timeout_secs == 0 {
            warnings.push("request_timeout_secs must be greater than 0".to_string());
        }
        if !self.board.activation_distance.is_finite() || self.board.activation_distance < 0.0 {
            warnings.push(format!(
                "Invalid activation_distance {}: should be a non-negative number of pixels",
                self.board.activation_distance
            ));
        }
        if self.server.port == 0 {
            warnings.push("server port 0 picks a random port on every start".to_string());
        }

        warnings
    }

    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            activation_distance: self.board.activation_distance,
            unknown_stage: self.board.unknown_stage,
        }
    }
}

fn check_base_url(url: &str) -> Option<String> {
    if url.starts_with("http://") || url.starts_with("https://") {
        None
    } else {
        Some(format!("Invalid base_url '{}': should start with http:// or https://", url))
    }
}

/// Load `.env` from the project directory into the process environment.
///
/// Existing variables win. A missing file is not an error.
pub fn load_dotenv(project_dir: &Path) {
    match dotenvy::from_path(project_dir.join(".env")) {
        Ok(()) => tracing::debug!("loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "failed to load .env"),
    }
}

/// Effective configuration.
///
/// It merges settings from:
/// 1. kanban.toml file
/// 2. Environment variables
/// 3. CLI arguments
#[derive(Debug, Clone)]
pub struct KanbanConfig {
    pub project_dir: PathBuf,
    pub config_dir: PathBuf,
    pub toml: KanbanToml,
    /// CLI override: `--backend-url`
    pub cli_backend_url: Option<String>,
    pub verbose: bool,
}

impl KanbanConfig {
    pub fn new(project_dir: PathBuf) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let config_dir = project_dir.join(CONFIG_DIR);
        let toml = KanbanToml::load_or_default(&config_dir)?;

        Ok(Self {
            project_dir,
            config_dir,
            toml,
            cli_backend_url: None,
            verbose: false,
        })
    }

    pub fn with_cli_args(project_dir: PathBuf, backend_url: Option<String>, verbose: bool) -> Result<Self> {
        let mut config = Self::new(project_dir)?;
        config.cli_backend_url = backend_url;
        config.verbose = verbose;
        Ok(config)
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    /// Backend base URL (CLI → env → file).
    pub fn backend_url(&self) -> String {
        self.cli_backend_url
            .clone()
            .or_else(|| std::env::var(ENV_BACKEND_URL).ok().filter(|v| !v.trim().is_empty()))
            .unwrap_or_else(|| self.toml.backend.base_url.clone())
    }

    /// Request timeout (env → file). An unparsable env value is ignored.
    pub fn request_timeout(&self) -> Duration {
        let secs = match std::env::var(ENV_REQUEST_TIMEOUT) {
            Ok(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    tracing::warn!(value = %raw, "ignoring invalid {}", ENV_REQUEST_TIMEOUT);
                    self.toml.backend.request_timeout_secs
                }
            },
            Err(_) => self.toml.backend.request_timeout_secs,
        };
        Duration::from_secs(secs.max(1))
    }

    pub fn controller_options(&self) -> ControllerOptions {
        self.toml.controller_options()
    }

    /// Validate file values and the effective backend URL.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = self.toml.validate();
        let url = self.backend_url();
        if url != self.toml.backend.base_url
            && let Some(w) = check_base_url(&url)
        {
            warnings.push(w);
        }
        warnings
    }

    /// Fail on any warning. Used before talking to the backend.
    pub fn ensure_valid(&self) -> Result<(), KanbanError> {
        let warnings = self.validate();
        if warnings.is_empty() {
            Ok(())
        } else {
            Err(KanbanError::InvalidConfig { warnings })
        }
    }
}
