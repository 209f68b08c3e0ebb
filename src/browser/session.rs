//! Browser session management
//!
//! Launches and drives a single Chrome instance over CDP. Each account run
//! owns exactly one session; the batch runner closes it on every exit path.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{AutomationError, Located, NavOutcome, PageDriver, SessionFactory, TextMatch};

/// Poll interval for bounded element waits.
const LOCATE_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Find Chrome/Chromium executable on the system
fn find_chrome() -> Option<PathBuf> {
    let candidates: Vec<PathBuf> = if cfg!(target_os = "windows") {
        let mut paths = vec![
            PathBuf::from(r"C:\Program Files\Google\Chrome\Application\chrome.exe"),
            PathBuf::from(r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe"),
        ];
        if let Ok(local) = std::env::var("LOCALAPPDATA") {
            paths.push(PathBuf::from(format!(
                r"{}\Google\Chrome\Application\chrome.exe",
                local
            )));
        }
        paths
    } else if cfg!(target_os = "macos") {
        vec![PathBuf::from(
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        )]
    } else {
        vec![
            PathBuf::from("/usr/bin/chromium"),
            PathBuf::from("/usr/bin/chromium-browser"),
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/usr/bin/google-chrome-stable"),
        ]
    };

    candidates.into_iter().find(|p| p.exists())
}

/// Configuration for a browser session
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// Path to Chrome/Chromium executable (auto-detected when unset)
    pub chrome_path: Option<String>,
    /// Run in headless mode
    pub headless: bool,
    /// User data directory
    pub user_data_dir: Option<String>,
    /// Window width
    pub window_width: u32,
    /// Window height
    pub window_height: u32,
    /// Directory diagnostic snapshots are written to
    pub diagnostics_dir: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: true,
            user_data_dir: None,
            window_width: 1280,
            window_height: 900,
            diagnostics_dir: std::env::temp_dir()
                .join("stagwell-runner")
                .join("diagnostics"),
        }
    }
}

impl SessionConfig {
    /// Create config for one account run with an isolated data directory.
    pub fn for_run(&self) -> Self {
        let base = std::env::temp_dir()
            .join("stagwell-runner")
            .join("browser_data");
        let user_data_dir = base
            .join(uuid::Uuid::new_v4().to_string())
            .to_string_lossy()
            .to_string();

        Self {
            user_data_dir: Some(user_data_dir),
            ..self.clone()
        }
    }
}

/// A live browser session driving one page of the rewards platform.
pub struct CdpSession {
    /// Session ID (shows up in logs and the user-data dir)
    pub id: String,
    browser: RwLock<Option<Browser>>,
    page: RwLock<Option<Page>>,
    alive: AtomicBool,
    diagnostics_dir: PathBuf,
    /// Per-run profile directory, deleted on close.
    user_data_dir: Option<PathBuf>,
}

impl CdpSession {
    /// Launch a browser and bind to its first page.
    pub async fn launch(config: SessionConfig) -> Result<Self, AutomationError> {
        let session_id = uuid::Uuid::new_v4().to_string();

        info!(
            "Launching browser session {} (headless: {})",
            session_id, config.headless
        );

        if config.chrome_path.is_none() && find_chrome().is_none() {
            return Err(AutomationError::LaunchFailed(
                "Chrome/Chromium not found on this system".to_string(),
            ));
        }

        let mut builder = BrowserConfig::builder();

        if !config.headless {
            builder = builder.with_head();
        }

        if let Some(ref path) = config.chrome_path {
            builder = builder.chrome_executable(path);
        } else if let Some(chrome_path) = find_chrome() {
            debug!("Auto-detected Chrome at: {}", chrome_path.display());
            builder = builder.chrome_executable(chrome_path);
        }

        if let Some(ref dir) = config.user_data_dir {
            let _ = std::fs::create_dir_all(dir);
            builder = builder.user_data_dir(dir);
        }

        builder = builder
            .window_size(config.window_width, config.window_height)
            // Required when running as root (Docker / VPS)
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-notifications")
            // Autoplay must not wait for a gesture or the player never starts
            .arg("--autoplay-policy=no-user-gesture-required")
            .arg("--mute-audio");

        let browser_config = builder
            .build()
            .map_err(AutomationError::LaunchFailed)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| AutomationError::LaunchFailed(e.to_string()))?;

        // When the handler stream ends, Chrome has disconnected.
        let alive = AtomicBool::new(true);
        let session_id_clone = session_id.clone();
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    debug!("Session {} CDP event error: {:?}", session_id_clone, event);
                }
            }
            warn!("Session {} Chrome disconnected (event handler ended)", session_id_clone);
        });

        // Chrome opens with a blank tab; take it and close any extras.
        let page = {
            let mut pages = browser
                .pages()
                .await
                .map_err(|e| AutomationError::LaunchFailed(e.to_string()))?;

            let main_page = if !pages.is_empty() {
                pages.remove(0)
            } else {
                browser
                    .new_page("about:blank")
                    .await
                    .map_err(|e| AutomationError::LaunchFailed(e.to_string()))?
            };

            for extra in pages {
                let _ = extra.close().await;
            }

            main_page
        };

        info!("Browser session {} created", session_id);

        Ok(Self {
            id: session_id,
            browser: RwLock::new(Some(browser)),
            page: RwLock::new(Some(page)),
            alive,
            diagnostics_dir: config.diagnostics_dir,
            user_data_dir: config.user_data_dir.as_ref().map(PathBuf::from),
        })
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    async fn page(&self) -> Result<Page, AutomationError> {
        self.page
            .read()
            .await
            .clone()
            .ok_or_else(|| AutomationError::Driver("No active page".into()))
    }

    /// Build a script that clicks the first `selector` element whose visible
    /// text matches `needle`, returning whether anything was clicked.
    fn click_by_text_script(selector: &str, needle: &str, match_mode: TextMatch) -> String {
        let sel = serde_json::to_string(selector).unwrap_or_default();
        let target = serde_json::to_string(needle).unwrap_or_default();
        let predicate = match match_mode {
            TextMatch::Exact => "text === target",
            TextMatch::Substring => "text.includes(target)",
            TextMatch::ExactIgnoreCase => "text.toLowerCase() === target.toLowerCase()",
        };
        format!(
            r#"(function() {{
                const target = {target};
                const elements = document.querySelectorAll({sel});
                for (const element of elements) {{
                    const text = (element.textContent || '').trim();
                    if ({predicate}) {{
                        element.click();
                        return true;
                    }}
                }}
                return false;
            }})()"#
        )
    }
}

#[async_trait]
impl PageDriver for CdpSession {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), AutomationError> {
        let page = self.page().await?;
        debug!("Session {} navigating to: {}", self.id, url);

        tokio::time::timeout(timeout, page.goto(url))
            .await
            .map_err(|_| AutomationError::NavigationTimeout(url.to_string()))?
            .map_err(|e| AutomationError::Driver(e.to_string()))?;

        Ok(())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Located, AutomationError> {
        let page = self.page().await?;
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if page.find_element(selector).await.is_ok() {
                return Ok(Located::Found);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(Located::NotFound);
            }
            tokio::time::sleep(LOCATE_POLL_INTERVAL).await;
        }
    }

    async fn click(&self, selector: &str) -> Result<(), AutomationError> {
        let page = self.page().await?;
        let element = page
            .find_element(selector)
            .await
            .map_err(|e| AutomationError::RequiredElementMissing(format!("{}: {}", selector, e)))?;

        element
            .click()
            .await
            .map_err(|e| AutomationError::Driver(e.to_string()))?;

        Ok(())
    }

    async fn click_by_text(
        &self,
        selector: &str,
        needle: &str,
        match_mode: TextMatch,
    ) -> Result<bool, AutomationError> {
        let script = Self::click_by_text_script(selector, needle, match_mode);
        let result = self.evaluate(&script).await?;
        Ok(result.as_bool().unwrap_or(false))
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<(), AutomationError> {
        let page = self.page().await?;
        let element = page
            .find_element(selector)
            .await
            .map_err(|e| AutomationError::RequiredElementMissing(format!("{}: {}", selector, e)))?;

        element
            .click()
            .await
            .map_err(|e| AutomationError::Driver(e.to_string()))?;
        element
            .type_str(text)
            .await
            .map_err(|e| AutomationError::Driver(e.to_string()))?;

        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, AutomationError> {
        let page = self.page().await?;
        let result = page
            .evaluate(script)
            .await
            .map_err(|e| AutomationError::Driver(e.to_string()))?;

        Ok(result
            .into_value::<serde_json::Value>()
            .unwrap_or(serde_json::Value::Null))
    }

    async fn current_url(&self) -> Result<String, AutomationError> {
        let page = self.page().await?;
        page.url()
            .await
            .map_err(|e| AutomationError::Driver(e.to_string()))?
            .ok_or_else(|| AutomationError::Driver("No URL".into()))
    }

    async fn wait_for_navigation(&self, timeout: Duration) -> Result<NavOutcome, AutomationError> {
        let page = self.page().await?;

        match tokio::time::timeout(timeout, page.wait_for_navigation()).await {
            Ok(Ok(_)) => Ok(NavOutcome::Completed),
            Ok(Err(e)) => Err(AutomationError::Driver(e.to_string())),
            Err(_) => Ok(NavOutcome::TimedOut),
        }
    }

    async fn go_back(&self) -> Result<(), AutomationError> {
        self.evaluate("window.history.back()").await.map(|_| ())
    }

    async fn scroll_by_viewport(&self) -> Result<(), AutomationError> {
        self.evaluate("window.scrollBy(0, window.innerHeight)")
            .await
            .map(|_| ())
    }

    async fn inner_text(&self, selector: &str) -> Result<Option<String>, AutomationError> {
        let sel = serde_json::to_string(selector).unwrap_or_default();
        let script = format!(
            r#"(function() {{
                const element = document.querySelector({sel});
                return element ? element.textContent : null;
            }})()"#
        );
        let result = self.evaluate(&script).await?;
        Ok(result.as_str().map(|s| s.to_string()))
    }

    async fn capture_diagnostic(&self, name: &str) {
        let path = self.diagnostics_dir.join(name);
        if let Err(e) = std::fs::create_dir_all(&self.diagnostics_dir) {
            warn!("Session {} could not create diagnostics dir: {}", self.id, e);
            return;
        }

        let page = match self.page().await {
            Ok(p) => p,
            Err(e) => {
                warn!("Session {} snapshot {} skipped: {}", self.id, name, e);
                return;
            }
        };

        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();

        match page.save_screenshot(params, &path).await {
            Ok(_) => info!("Session {} diagnostic snapshot: {}", self.id, path.display()),
            Err(e) => warn!("Session {} snapshot {} failed: {}", self.id, name, e),
        }
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    async fn close(&self) -> Result<(), AutomationError> {
        self.alive.store(false, Ordering::Relaxed);

        {
            let mut page = self.page.write().await;
            if let Some(p) = page.take() {
                let _ = p.close().await;
            }
        }

        {
            let mut browser = self.browser.write().await;
            if let Some(mut b) = browser.take() {
                // Graceful close first, then force kill so no Chrome child
                // processes outlive the run
                let _ = b.close().await;
                tokio::time::sleep(Duration::from_millis(500)).await;
                let _ = b.kill().await;
            }
        }

        // Each run gets a throwaway profile; without this the data dir
        // accumulates one multi-megabyte directory per run.
        if let Some(ref dir) = self.user_data_dir {
            remove_profile_dir(dir);
        }

        info!("Browser session {} closed", self.id);
        Ok(())
    }
}

/// Delete a per-run browser profile. Best-effort: Chrome may still be
/// flushing files, and a leftover directory only costs disk.
fn remove_profile_dir(dir: &Path) {
    if !dir.exists() {
        return;
    }
    if let Err(e) = std::fs::remove_dir_all(dir) {
        warn!("Could not remove browser profile {}: {}", dir.display(), e);
    }
}

/// Opens one fresh [`CdpSession`] per account run.
pub struct CdpSessionFactory {
    config: SessionConfig,
}

impl CdpSessionFactory {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionFactory for CdpSessionFactory {
    async fn open(&self) -> Result<Arc<dyn PageDriver>, AutomationError> {
        let session = CdpSession::launch(self.config.for_run()).await?;
        Ok(Arc::new(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn click_script_escapes_quotes() {
        let script = CdpSession::click_by_text_script(
            "div.van-cell__title",
            "Personal \"information\"",
            TextMatch::Exact,
        );
        assert!(script.contains(r#""Personal \"information\"""#));
        assert!(script.contains("text === target"));
    }

    #[test]
    fn for_run_isolates_data_dirs() {
        let base = SessionConfig::default();
        let a = base.for_run();
        let b = base.for_run();
        assert_ne!(a.user_data_dir, b.user_data_dir);
        assert!(a.user_data_dir.unwrap().contains("browser_data"));
    }

    #[test]
    fn profile_cleanup_removes_the_tree_and_tolerates_absence() {
        let dir = std::env::temp_dir()
            .join("stagwell-runner")
            .join(format!("profile-cleanup-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(dir.join("Default")).unwrap();
        std::fs::write(dir.join("Default").join("Preferences"), b"{}").unwrap();

        remove_profile_dir(&dir);
        assert!(!dir.exists());

        // Second pass on the now-missing dir is a no-op.
        remove_profile_dir(&dir);
    }
}
