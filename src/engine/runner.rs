//! Per-account run orchestration and the sequential batch runner.
//!
//! A run owns exactly one browser session: open, position, watch, logout,
//! close. The session is closed exactly once on every exit path after the
//! open succeeded. Batch runs are strictly sequential; one account's
//! failure never touches its neighbours.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::accounts::Account;
use crate::browser::{PageDriver, SessionFactory};
use crate::locators::LocatorConfig;

use super::{SessionController, StopReason, TierNavigator, VideoWatchLoop};

/// How one account's run ended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "status", content = "detail")]
pub enum RunOutcome {
    Completed,
    Failed(String),
}

/// Terminal record of one account's run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub account_id: String,
    pub videos_watched: u32,
    pub outcome: RunOutcome,
}

/// Run one account end to end in a fresh session.
pub async fn run_account(
    factory: &dyn SessionFactory,
    locators: &LocatorConfig,
    account: &Account,
) -> RunResult {
    info!("Starting run for {}", account.username);

    let driver = match factory.open().await {
        Ok(driver) => driver,
        Err(e) => {
            warn!("Session open failed for {}: {}", account.username, e);
            return RunResult {
                account_id: account.username.clone(),
                videos_watched: 0,
                outcome: RunOutcome::Failed(e.to_string()),
            };
        }
    };

    let outcome = drive(driver.as_ref(), locators, account).await;

    if let Err(e) = driver.close().await {
        warn!("Session close failed for {}: {}", account.username, e);
    }

    match outcome {
        Ok(videos_watched) => {
            info!(
                "Run completed for {}: {} videos",
                account.username, videos_watched
            );
            RunResult {
                account_id: account.username.clone(),
                videos_watched,
                outcome: RunOutcome::Completed,
            }
        }
        Err((videos_watched, reason)) => {
            warn!("Run failed for {}: {}", account.username, reason);
            RunResult {
                account_id: account.username.clone(),
                videos_watched,
                outcome: RunOutcome::Failed(reason),
            }
        }
    }
}

/// The run body, separated so the caller can close the session exactly once
/// whichever way this exits. `Err` carries the videos already credited.
async fn drive(
    driver: &dyn PageDriver,
    locators: &LocatorConfig,
    account: &Account,
) -> Result<u32, (u32, String)> {
    driver
        .navigate(&locators.routes.base_url, locators.timings.login_navigation)
        .await
        .map_err(|e| (0, e.to_string()))?;

    SessionController::login(driver, locators, &account.telephone, &account.password)
        .await
        .map_err(|e| (0, e.to_string()))?;

    if !TierNavigator::navigate_to_tier(driver, locators, &account.tier).await {
        return Err((0, format!("could not reach tier {}", account.tier)));
    }

    let report = VideoWatchLoop::watch_videos(driver, locators, account).await;

    // Logout best-effort however the loop stopped; the platform tracks
    // active sessions and a stale one can block the next login.
    if let Err(e) = SessionController::logout(driver, locators).await {
        warn!("Logout failed for {}: {}", account.username, e);
    }

    match report.stop {
        StopReason::QueueExhausted => Ok(report.videos_watched),
        StopReason::Unrecoverable(reason) => Err((report.videos_watched, reason)),
    }
}

/// Run the given accounts strictly one after another, each in its own
/// session. Always returns one result per account, in order.
pub async fn run_batch(
    factory: &dyn SessionFactory,
    locators: &LocatorConfig,
    accounts: &[Account],
) -> Vec<RunResult> {
    info!("Batch starting: {} accounts", accounts.len());

    let mut results = Vec::with_capacity(accounts.len());
    for account in accounts {
        results.push(run_account(factory, locators, account).await);
    }

    let failed = results
        .iter()
        .filter(|r| !matches!(r.outcome, RunOutcome::Completed))
        .count();
    info!(
        "Batch finished: {} accounts, {} failed",
        results.len(),
        failed
    );

    results
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;
    use crate::browser::{AutomationError, Located};
    use crate::engine::fake::FakeDriver;

    struct FakeFactory {
        drivers: Mutex<VecDeque<Arc<FakeDriver>>>,
    }

    impl FakeFactory {
        fn new(drivers: Vec<Arc<FakeDriver>>) -> Self {
            Self {
                drivers: Mutex::new(drivers.into()),
            }
        }
    }

    #[async_trait]
    impl SessionFactory for FakeFactory {
        async fn open(&self) -> Result<Arc<dyn PageDriver>, AutomationError> {
            self.drivers
                .lock()
                .unwrap()
                .pop_front()
                .map(|driver| driver as Arc<dyn PageDriver>)
                .ok_or_else(|| AutomationError::LaunchFailed("no session available".into()))
        }
    }

    fn account(username: &str, tier: &str) -> Account {
        Account {
            username: username.into(),
            telephone: "0820000000".into(),
            password: "secret".into(),
            tier: tier.into(),
            automation_scheduled: true,
        }
    }

    fn happy_driver(locators: &LocatorConfig) -> Arc<FakeDriver> {
        let driver = Arc::new(FakeDriver::new());
        driver.set_url("https://stagwelltv88.com/#/taskList");
        driver.script_inner_text(
            &locators.selectors.remaining_counter,
            vec![Some("Remaining videos\n1".into()), Some("0".into())],
        );
        driver
    }

    #[tokio::test]
    async fn completed_run_watches_logs_out_and_closes_once() {
        let locators = LocatorConfig::default();
        let driver = happy_driver(&locators);
        let factory = FakeFactory::new(vec![driver.clone()]);

        let result = run_account(&factory, &locators, &account("alice", "K2")).await;

        assert_eq!(result.outcome, RunOutcome::Completed);
        assert_eq!(result.videos_watched, 1);
        assert_eq!(driver.close_count(), 1);
        // Logout traversal ran.
        let exit_click = format!(
            "click_text:{}:{}",
            locators.selectors.logout_cell, locators.labels.exit_login
        );
        assert!(driver.calls().contains(&exit_click));
    }

    #[tokio::test]
    async fn failed_login_still_closes_the_session_once() {
        let locators = LocatorConfig::default();
        let driver = Arc::new(FakeDriver::new());
        driver.set_url("https://stagwelltv88.com/#/login");
        let factory = FakeFactory::new(vec![driver.clone()]);

        let result = run_account(&factory, &locators, &account("alice", "K2")).await;

        assert!(matches!(result.outcome, RunOutcome::Failed(_)));
        assert_eq!(result.videos_watched, 0);
        assert_eq!(driver.close_count(), 1);
    }

    #[tokio::test]
    async fn unrecoverable_watch_failure_still_attempts_logout() {
        let locators = LocatorConfig::default();
        let driver = Arc::new(FakeDriver::new());
        driver.set_url("https://stagwelltv88.com/#/taskList/K2");
        driver.script_inner_text(
            &locators.selectors.remaining_counter,
            vec![Some("Remaining videos\n5".into())],
        );
        // Mid-video fault whose recovery cannot find the task listing.
        driver.script_selector(&locators.selectors.video_thumbnail, Located::NotFound);
        driver.script_selector(&locators.selectors.task_item, Located::NotFound);
        let factory = FakeFactory::new(vec![driver.clone()]);

        let result = run_account(&factory, &locators, &account("alice", "K2")).await;

        assert!(matches!(result.outcome, RunOutcome::Failed(_)));
        let exit_click = format!(
            "click_text:{}:{}",
            locators.selectors.logout_cell, locators.labels.exit_login
        );
        assert!(driver.calls().contains(&exit_click));
        assert_eq!(driver.close_count(), 1);
    }

    #[tokio::test]
    async fn unreachable_tier_fails_the_run() {
        let locators = LocatorConfig::default();
        let driver = Arc::new(FakeDriver::new());
        driver.set_url("https://stagwelltv88.com/#/404");
        let factory = FakeFactory::new(vec![driver.clone()]);

        let result = run_account(&factory, &locators, &account("alice", "K2")).await;

        match result.outcome {
            RunOutcome::Failed(reason) => assert!(reason.contains("K2")),
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(driver.close_count(), 1);
    }

    #[tokio::test]
    async fn batch_isolates_failures_and_keeps_order() {
        let locators = LocatorConfig::default();
        let first = happy_driver(&locators);
        let second = happy_driver(&locators);
        let third = happy_driver(&locators);
        let factory =
            FakeFactory::new(vec![first.clone(), second.clone(), third.clone()]);

        let accounts = vec![
            account("alice", "K2"),
            // Unknown tier: this run fails without touching its session's
            // watch loop.
            account("bob", "K9"),
            account("carol", "K3"),
        ];

        let results = run_batch(&factory, &locators, &accounts).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].account_id, "alice");
        assert_eq!(results[0].outcome, RunOutcome::Completed);
        assert!(matches!(results[1].outcome, RunOutcome::Failed(_)));
        assert_eq!(results[2].account_id, "carol");
        assert_eq!(results[2].outcome, RunOutcome::Completed);
        for driver in [&first, &second, &third] {
            assert_eq!(driver.close_count(), 1);
        }
    }

    #[tokio::test]
    async fn session_open_failure_is_reported_not_raised() {
        let locators = LocatorConfig::default();
        let factory = FakeFactory::new(vec![]);

        let result = run_account(&factory, &locators, &account("alice", "K2")).await;

        assert!(matches!(result.outcome, RunOutcome::Failed(_)));
        assert_eq!(result.videos_watched, 0);
    }
}
