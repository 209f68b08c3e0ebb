//! Stagwell Runner
//!
//! Unattended browser automation for the Stagwell TV rewards platform:
//! logs accounts in, positions them at their reward tier, watches and
//! submits the queued videos, and logs out. Batches run sequentially on a
//! cron cadence or on demand over HTTP.

pub mod accounts;
pub mod browser;
pub mod engine;
pub mod locators;
pub mod scheduler;
pub mod web;

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{error, info, warn};

use accounts::AccountStore;
use browser::SessionConfig;
use engine::RunResult;
use locators::LocatorConfig;
use scheduler::ScheduleConfig;

/// Application configuration
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// Platform base URL override (defaults to the production site)
    #[serde(default)]
    pub base_url: Option<String>,

    /// Run browsers headless
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Path to Chrome/Chromium executable (auto-detected when unset)
    #[serde(default)]
    pub chrome_path: Option<String>,

    /// Directory diagnostic snapshots are written to
    #[serde(default)]
    pub diagnostics_dir: Option<PathBuf>,

    /// Batch schedule configuration
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

fn default_headless() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            headless: default_headless(),
            chrome_path: None,
            diagnostics_dir: None,
            schedule: ScheduleConfig::default(),
        }
    }
}

/// Get log directory path (shared across modules)
pub fn log_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("stagwell-runner").join("logs"))
}

impl AppConfig {
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("stagwell-runner").join("config.json"))
    }

    /// Load config from file, falling back to defaults.
    pub fn load() -> Self {
        if let Some(path) = Self::config_path() {
            if path.exists() {
                match std::fs::read_to_string(&path) {
                    Ok(content) => match serde_json::from_str(&content) {
                        Ok(config) => {
                            info!("Loaded config from {:?}", path);
                            return config;
                        }
                        Err(e) => warn!("Failed to parse config file: {}", e),
                    },
                    Err(e) => warn!("Failed to read config file: {}", e),
                }
            }
        }
        Self::default()
    }

    /// Save config to file.
    pub fn save(&self) {
        if let Some(path) = Self::config_path() {
            if let Some(parent) = path.parent() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    error!("Failed to create config directory: {}", e);
                    return;
                }
            }

            match serde_json::to_string_pretty(self) {
                Ok(content) => {
                    if let Err(e) = std::fs::write(&path, content) {
                        error!("Failed to save config: {}", e);
                    } else {
                        info!("Config saved to {:?}", path);
                    }
                }
                Err(e) => error!("Failed to serialize config: {}", e),
            }
        }
    }

    /// Page locators with any configured overrides applied.
    pub fn locators(&self) -> LocatorConfig {
        let mut locators = LocatorConfig::default();
        if let Some(base_url) = &self.base_url {
            locators.routes.base_url = base_url.clone();
        }
        locators
    }

    /// Browser session config derived from these settings.
    pub fn session_config(&self) -> SessionConfig {
        let mut session = SessionConfig {
            chrome_path: self.chrome_path.clone(),
            headless: self.headless,
            ..SessionConfig::default()
        };
        if let Some(dir) = &self.diagnostics_dir {
            session.diagnostics_dir = dir.clone();
        }
        session
    }
}

/// Application state shared across the app
pub struct AppState {
    /// Application configuration
    pub config: RwLock<AppConfig>,
    /// Persisted accounts
    pub accounts: Arc<AccountStore>,
    /// Page locators (overrides applied at load time)
    pub locators: Arc<LocatorConfig>,
    /// Results of the most recent batch or manual run
    pub last_results: RwLock<Vec<RunResult>>,
    /// Guard against overlapping batches
    pub batch_running: AtomicBool,
}

impl AppState {
    /// Create new application state with loaded config and accounts.
    pub fn new() -> Self {
        let config = AppConfig::load();
        let locators = Arc::new(config.locators());

        Self {
            config: RwLock::new(config),
            accounts: Arc::new(AccountStore::load()),
            locators,
            last_results: RwLock::new(Vec::new()),
            batch_running: AtomicBool::new(false),
        }
    }

    /// Apply and persist new settings.
    pub async fn configure(&self, config: AppConfig) {
        config.save();
        *self.config.write().await = config;
        info!("Application configured");
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Initialize logging: console layer plus a daily-rolling file when the log
/// directory is available.
pub fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false);

    if let Some(log_dir) = log_dir() {
        let _ = std::fs::create_dir_all(&log_dir);
        let file_appender = tracing_appender::rolling::daily(&log_dir, "stagwell-runner.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_writer(non_blocking);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .init();

        Some(guard)
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .init();

        None
    }
}
