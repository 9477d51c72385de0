//! Configuration management for lexpilot
//!
//! Supports environment variables, config files, and runtime overrides.
//!
//! Config file location: ~/.config/lexpilot/config.toml

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::core::error::{PilotError, Result};

/// Main configuration for lexpilot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Browser backend configuration
    #[serde(default)]
    pub browser: BrowserConfig,
    /// Host window layout
    #[serde(default)]
    pub layout: LayoutConfig,
    /// Headless search crawler
    #[serde(default)]
    pub crawler: CrawlerConfig,
    /// Plan executor
    #[serde(default)]
    pub executor: ExecutorConfig,
    /// Content-script injection
    #[serde(default)]
    pub injector: InjectorConfig,
    /// External planner service
    #[serde(default)]
    pub planner: PlannerConfig,
    /// Logging
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Browser automation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// agent-browser executable
    pub binary: String,
    /// Prefix for per-context agent-browser session names
    pub session_prefix: String,
    /// Whether to run visible contexts in headed mode
    pub headed: bool,
    /// Timeout for a single browser command in ms
    pub timeout_ms: u64,
    /// Address of the case-management portal opened by `ask`
    pub portal_url: String,
}

/// Host window geometry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Width of the navigation rail reserved on the left edge
    pub side_rail_width: u32,
    /// Content width of the headless host
    pub window_width: u32,
    /// Content height of the headless host
    pub window_height: u32,
}

/// Crawler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Search engine endpoint; the query goes in `q`
    pub search_endpoint: String,
    /// Qualifier appended to the query text
    pub domain_qualifier: String,
    /// User agent applied when the hidden context is created
    pub user_agent: String,
    /// Delay after the search page loads, in ms
    pub settle_ms: u64,
    /// Lower bound of the jittered delay after each deep-fetch load, in ms
    pub deep_settle_min_ms: u64,
    /// Upper bound of the jittered delay after each deep-fetch load, in ms
    pub deep_settle_max_ms: u64,
    /// Maximum number of filtered results that are deep-fetched (never above 3)
    pub max_results: usize,
    /// Maximum characters kept from a deep-fetched page
    pub snippet_chars: usize,
}

/// Plan executor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Interval between success-criterion checks, in ms
    pub poll_interval_ms: u64,
    /// Criterion timeout when the plan gives none, in ms
    pub criterion_timeout_ms: u64,
    /// waitForSelector timeout when the step gives none, in ms
    pub selector_timeout_ms: u64,
    /// Characters kept by `get_page_data`
    pub page_sample_chars: usize,
}

/// Content-script injection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectorConfig {
    /// Whether navigations trigger injection
    pub enabled: bool,
    /// Directory holding manifest.json and the files it lists
    pub extension_dir: PathBuf,
    /// Polyfill location
    pub polyfill_path: PathBuf,
    /// Polyfill location tried when the first is missing
    pub polyfill_fallback: PathBuf,
}

/// Planner service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Full URL of the planning endpoint
    pub url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    pub level: String,
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            binary: env::var("LEXPILOT_BROWSER_BIN").unwrap_or_else(|_| "agent-browser".to_string()),
            session_prefix: env::var("LEXPILOT_BROWSER_SESSION")
                .unwrap_or_else(|_| "lexpilot".to_string()),
            headed: env_flag("LEXPILOT_BROWSER_HEADED", false),
            timeout_ms: 30000,
            portal_url: env::var("LEXPILOT_PORTAL_URL")
                .unwrap_or_else(|_| "https://pje.tjsp.jus.br".to_string()),
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            side_rail_width: 72,
            window_width: 1280,
            window_height: 800,
        }
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            search_endpoint: "https://www.google.com/search".to_string(),
            domain_qualifier: "site:jus.br".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
                .to_string(),
            settle_ms: 2000,
            deep_settle_min_ms: 1500,
            deep_settle_max_ms: 2500,
            max_results: 3,
            snippet_chars: 1500,
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 250,
            criterion_timeout_ms: 5000,
            selector_timeout_ms: 10000,
            page_sample_chars: 2000,
        }
    }
}

impl Default for InjectorConfig {
    fn default() -> Self {
        let extension_dir = env::var("LEXPILOT_EXTENSION_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Config::config_dir().join("extension"));
        Self {
            enabled: env_flag("LEXPILOT_INJECTOR_ENABLED", true),
            polyfill_path: extension_dir.join("browser-polyfill.js"),
            polyfill_fallback: extension_dir.join("vendor").join("browser-polyfill.min.js"),
            extension_dir,
        }
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            url: env::var("LEXPILOT_PLANNER_URL")
                .unwrap_or_else(|_| "http://localhost:3000/api/plan".to_string()),
            timeout_secs: 60,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: env::var("LEXPILOT_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lexpilot")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file, environment, and defaults
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();

        match Self::load_from_file() {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!("using default configuration: {}", e);
                Self::default()
            }
        }
    }

    /// Load configuration from file only
    pub fn load_from_file() -> Result<Self> {
        let config_path = Self::config_file();

        if !config_path.exists() {
            return Err(PilotError::config("Config file not found"));
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|e| PilotError::config(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| PilotError::config(format!("Failed to parse config: {}", e)))
    }

    /// Generate a default config file content for display
    pub fn default_config_toml() -> String {
        toml::to_string_pretty(&Config::default())
            .unwrap_or_else(|_| String::from("# Error generating config"))
    }
}
