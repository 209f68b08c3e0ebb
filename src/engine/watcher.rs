//! Video watch loop
//!
//! Consumes queued videos for the current tier until the remaining-count
//! indicator reports exhaustion or a fault escapes recovery. The loop never
//! raises past its boundary; the report says why it stopped.

use tracing::{debug, info, warn};

use crate::accounts::Account;
use crate::browser::{AutomationError, Located, PageDriver, TextMatch};
use crate::locators::{LocatorConfig, COUNTER_RETRIES};

use super::{fast_forward_script, StuckRecovery};

/// Loop phase, tagged explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchPhase {
    Watching,
    Recovering,
    Exhausted,
    Aborted,
}

/// Why the loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The remaining-count indicator reported zero (or stayed unreadable
    /// through the retry budget), the normal outcome.
    QueueExhausted,
    /// A mid-video fault escaped recovery.
    Unrecoverable(String),
}

/// Terminal report of one watch-loop run.
#[derive(Debug, Clone)]
pub struct WatchReport {
    pub videos_watched: u32,
    pub stop: StopReason,
}

impl WatchReport {
    pub fn final_phase(&self) -> WatchPhase {
        match self.stop {
            StopReason::QueueExhausted => WatchPhase::Exhausted,
            StopReason::Unrecoverable(_) => WatchPhase::Aborted,
        }
    }
}

pub struct VideoWatchLoop;

impl VideoWatchLoop {
    /// Run the watch-and-submit loop. Precondition: the session is
    /// authenticated and positioned at the account's tier listing.
    pub async fn watch_videos(
        driver: &dyn PageDriver,
        locators: &LocatorConfig,
        account: &Account,
    ) -> WatchReport {
        driver.sleep(locators.timings.watch_initial_settle).await;

        let mut videos_watched = 0u32;

        loop {
            let remaining = Self::check_remaining(driver, locators).await;
            if remaining == 0 {
                info!(
                    "Queue exhausted for {} after {} videos ({:?})",
                    account.username,
                    videos_watched,
                    WatchPhase::Exhausted
                );
                return WatchReport {
                    videos_watched,
                    stop: StopReason::QueueExhausted,
                };
            }

            debug!("{} videos remaining for {}", remaining, account.username);

            match Self::watch_one(driver, locators).await {
                Ok(()) => {
                    videos_watched += 1;
                }
                Err(e) => {
                    warn!(
                        "Video {} faulted for {} ({:?}): {}",
                        videos_watched + 1,
                        account.username,
                        WatchPhase::Recovering,
                        e
                    );

                    if StuckRecovery::unstick(driver, locators, account).await {
                        // The recovery micro-sequence submitted the stuck
                        // task itself, so it counts as watched.
                        videos_watched += 1;
                    } else {
                        warn!(
                            "Recovery failed for {}, stopping ({:?})",
                            account.username,
                            WatchPhase::Aborted
                        );
                        return WatchReport {
                            videos_watched,
                            stop: StopReason::Unrecoverable(
                                AutomationError::RecoveryExhausted(e.to_string()).to_string(),
                            ),
                        };
                    }
                }
            }

            driver.sleep(locators.timings.loop_settle).await;
        }
    }

    /// Read the remaining-count indicator, retrying through transient
    /// absence while the page settles. Zero or unparsable after the retry
    /// budget means the queue is done, not a failure.
    async fn check_remaining(driver: &dyn PageDriver, locators: &LocatorConfig) -> u32 {
        let timings = &locators.timings;
        let counter = &locators.selectors.remaining_counter;

        for attempt in 0..COUNTER_RETRIES {
            let located = driver.wait_for_selector(counter, timings.counter_wait).await;

            if let Ok(Located::Found) = located {
                match driver.inner_text(counter).await {
                    Ok(Some(text)) => {
                        if let Some(count) = parse_remaining(&text) {
                            return count;
                        }
                        debug!("Counter text not parsable yet: {:?}", text.trim());
                    }
                    Ok(None) => debug!("Counter vanished between locate and read"),
                    Err(e) => debug!("Counter read error: {}", e),
                }
            }

            if attempt + 1 < COUNTER_RETRIES {
                driver.sleep(timings.counter_retry_delay).await;
            }
        }

        0
    }

    /// One watch-and-submit cycle. Any error here is a fault the caller
    /// hands to recovery.
    async fn watch_one(
        driver: &dyn PageDriver,
        locators: &LocatorConfig,
    ) -> Result<(), AutomationError> {
        let timings = &locators.timings;
        let selectors = &locators.selectors;

        // Open the first queued video.
        if driver
            .wait_for_selector(&selectors.video_thumbnail, timings.element_wait)
            .await?
            == Located::NotFound
        {
            return Err(AutomationError::RequiredElementMissing(
                selectors.video_thumbnail.clone(),
            ));
        }
        driver.click(&selectors.video_thumbnail).await?;

        if driver
            .wait_for_selector(&selectors.video_player, timings.element_wait)
            .await?
            == Located::NotFound
        {
            return Err(AutomationError::RequiredElementMissing(
                selectors.video_player.clone(),
            ));
        }
        driver.click(&selectors.video_player).await?;

        // Force the player to the minimum-watch threshold instead of
        // dwelling the natural play duration, keeping the progress label
        // consistent with the forced position.
        let script = fast_forward_script(
            &selectors.video_player,
            &selectors.progress_label,
            timings.watch_threshold.as_secs(),
        );
        if !driver.evaluate(&script).await?.as_bool().unwrap_or(false) {
            return Err(AutomationError::RequiredElementMissing(
                selectors.video_player.clone(),
            ));
        }
        driver.sleep(timings.pre_submit_settle).await;

        // Submit the completed task.
        if driver
            .wait_for_selector(&selectors.submit_button, timings.element_wait)
            .await?
            == Located::NotFound
        {
            return Err(AutomationError::RequiredElementMissing(
                selectors.submit_button.clone(),
            ));
        }
        if !driver
            .click_by_text(
                &selectors.submit_button,
                &locators.labels.submit_completed,
                TextMatch::Exact,
            )
            .await?
        {
            return Err(AutomationError::RequiredElementMissing(format!(
                "button '{}'",
                locators.labels.submit_completed
            )));
        }
        driver.sleep(timings.post_submit_settle).await;

        // Back to the listing for the next iteration.
        if driver
            .wait_for_selector(&selectors.back_button, timings.element_wait)
            .await?
            == Located::NotFound
        {
            return Err(AutomationError::RequiredElementMissing(
                selectors.back_button.clone(),
            ));
        }
        driver.click(&selectors.back_button).await?;
        let _ = driver.wait_for_navigation(timings.back_navigation).await?;

        Ok(())
    }
}

/// Parse the trailing numeric token of the indicator's text, e.g.
/// "Remaining videos\n10" → 10.
pub(crate) fn parse_remaining(text: &str) -> Option<u32> {
    text.lines()
        .rev()
        .find(|line| !line.trim().is_empty())?
        .split_whitespace()
        .last()?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fake::FakeDriver;
    use crate::browser::Located;

    fn account() -> Account {
        Account {
            username: "tester".into(),
            telephone: "0820000000".into(),
            password: "secret".into(),
            tier: "K2".into(),
            automation_scheduled: true,
        }
    }

    fn counter_values(driver: &FakeDriver, locators: &LocatorConfig, from: u32) {
        let texts: Vec<Option<String>> = (0..=from)
            .rev()
            .map(|n| Some(format!("Remaining videos\n{}", n)))
            .collect();
        driver.script_inner_text(&locators.selectors.remaining_counter, texts);
    }

    #[test]
    fn parse_remaining_takes_trailing_token_of_last_line() {
        assert_eq!(parse_remaining("Remaining videos\n10"), Some(10));
        assert_eq!(parse_remaining("Queue: 3"), Some(3));
        assert_eq!(parse_remaining("  0  "), Some(0));
        assert_eq!(parse_remaining("no numbers here"), None);
        assert_eq!(parse_remaining(""), None);
        assert_eq!(parse_remaining("Remaining\n10\n\n"), Some(10));
    }

    #[tokio::test]
    async fn quota_ten_scenario_watches_exactly_ten_videos() {
        let locators = LocatorConfig::default();
        let driver = FakeDriver::new();
        driver.set_url("https://stagwelltv88.com/#/taskList/K2");
        counter_values(&driver, &locators, 10);

        let report = VideoWatchLoop::watch_videos(&driver, &locators, &account()).await;

        assert_eq!(report.videos_watched, 10);
        assert_eq!(report.stop, StopReason::QueueExhausted);
        assert_eq!(report.final_phase(), WatchPhase::Exhausted);
        // No recovery traversal happened.
        let task_tab_click = format!(
            "click_text:{}:{}",
            locators.selectors.tabbar_item, locators.labels.task_tab
        );
        assert!(!driver.calls().contains(&task_tab_click));
    }

    #[tokio::test]
    async fn zero_on_first_read_terminates_without_opening_a_video() {
        let locators = LocatorConfig::default();
        let driver = FakeDriver::new();
        driver.script_inner_text(
            &locators.selectors.remaining_counter,
            vec![Some("Remaining videos\n0".into())],
        );

        let report = VideoWatchLoop::watch_videos(&driver, &locators, &account()).await;

        assert_eq!(report.videos_watched, 0);
        assert_eq!(report.stop, StopReason::QueueExhausted);
        let thumbnail_click = format!("click:{}", locators.selectors.video_thumbnail);
        assert!(!driver.calls().contains(&thumbnail_click));
    }

    #[tokio::test]
    async fn unparsable_counter_exhausts_retry_budget_then_terminates() {
        let locators = LocatorConfig::default();
        let driver = FakeDriver::new();
        driver.script_inner_text(
            &locators.selectors.remaining_counter,
            vec![Some("no numbers here".into()); COUNTER_RETRIES as usize],
        );

        let report = VideoWatchLoop::watch_videos(&driver, &locators, &account()).await;

        assert_eq!(report.videos_watched, 0);
        assert_eq!(report.stop, StopReason::QueueExhausted);
        let reads = driver
            .calls()
            .iter()
            .filter(|c| c.starts_with("inner_text:"))
            .count();
        assert_eq!(reads, COUNTER_RETRIES as usize);
    }

    #[tokio::test]
    async fn fault_on_third_video_recovers_and_completes_the_queue() {
        let locators = LocatorConfig::default();
        let driver = FakeDriver::new();
        driver.set_url("https://stagwelltv88.com/#/taskList/K2");
        counter_values(&driver, &locators, 10);
        // Thumbnail vanishes on the third cycle, then reappears.
        driver.script_selector_queue(
            &locators.selectors.video_thumbnail,
            vec![Located::Found, Located::Found, Located::NotFound],
        );

        let report = VideoWatchLoop::watch_videos(&driver, &locators, &account()).await;

        assert_eq!(report.videos_watched, 10);
        assert_eq!(report.stop, StopReason::QueueExhausted);
        // Recovery traversal ran exactly once.
        let task_tab_click = format!(
            "click_text:{}:{}",
            locators.selectors.tabbar_item, locators.labels.task_tab
        );
        assert_eq!(
            driver.calls().iter().filter(|c| *c == &task_tab_click).count(),
            1
        );
    }

    #[tokio::test]
    async fn failed_recovery_aborts_the_loop() {
        let locators = LocatorConfig::default();
        let driver = FakeDriver::new();
        counter_values(&driver, &locators, 5);
        driver.script_selector(&locators.selectors.video_thumbnail, Located::NotFound);
        // Recovery cannot find the task listing either.
        driver.script_selector(&locators.selectors.task_item, Located::NotFound);

        let report = VideoWatchLoop::watch_videos(&driver, &locators, &account()).await;

        assert_eq!(report.videos_watched, 0);
        assert!(matches!(report.stop, StopReason::Unrecoverable(_)));
        assert_eq!(report.final_phase(), WatchPhase::Aborted);
    }
}
