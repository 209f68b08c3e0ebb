//! Stuck-video recovery
//!
//! Invoked when a watch-loop iteration faults mid-video. Backs out of the
//! stuck page, re-submits the stranded task from the task listing, and
//! repositions the session at the account's tier so the loop can resume.

use tracing::{info, warn};

use crate::accounts::Account;
use crate::browser::{AutomationError, Located, PageDriver, TextMatch};
use crate::locators::{snapshots, LocatorConfig};

use super::{stuck_task_script, TierNavigator};

pub struct StuckRecovery;

impl StuckRecovery {
    /// Attempt to clear the stuck state. `false` means "do not retry this
    /// account's run further".
    pub async fn unstick(
        driver: &dyn PageDriver,
        locators: &LocatorConfig,
        account: &Account,
    ) -> bool {
        match Self::run(driver, locators, account).await {
            Ok(()) => {
                info!("Recovered stuck video for {}", account.username);
                true
            }
            Err(e) => {
                warn!("Recovery failed for {}: {}", account.username, e);
                false
            }
        }
    }

    async fn run(
        driver: &dyn PageDriver,
        locators: &LocatorConfig,
        account: &Account,
    ) -> Result<(), AutomationError> {
        let timings = &locators.timings;
        let selectors = &locators.selectors;
        let labels = &locators.labels;

        // Back out of the stuck player page.
        Self::navigate_back(driver, locators, 1).await?;

        // Open the task listing tab.
        if driver
            .wait_for_selector(&selectors.tabbar_item, timings.element_wait)
            .await?
            == Located::NotFound
            || !driver
                .click_by_text(&selectors.tabbar_item, &labels.task_tab, TextMatch::Substring)
                .await?
        {
            driver.capture_diagnostic(snapshots::UNSTICK_ERROR).await;
            return Err(AutomationError::RequiredElementMissing(format!(
                "tab '{}'",
                labels.task_tab
            )));
        }
        Self::tolerant_navigation(driver, locators).await?;

        // Re-open the stranded task from the listing.
        if driver
            .wait_for_selector(&selectors.task_item, timings.element_wait)
            .await?
            == Located::NotFound
        {
            driver.capture_diagnostic(snapshots::UNSTICK_SUBMIT).await;
            return Err(AutomationError::RequiredElementMissing(
                selectors.task_item.clone(),
            ));
        }
        let script = stuck_task_script(
            &selectors.task_item,
            &selectors.task_submit_button,
            &labels.task_submit,
        );
        if !driver.evaluate(&script).await?.as_bool().unwrap_or(false) {
            driver.capture_diagnostic(snapshots::UNSTICK_SUBMIT).await;
            return Err(AutomationError::RequiredElementMissing(format!(
                "task item with '{}' control",
                labels.task_submit
            )));
        }

        Self::watch_and_submit(driver, locators).await?;
        Self::navigate_back(driver, locators, 2).await?;

        // Re-establish the watch loop's required starting position.
        if !TierNavigator::navigate_to_tier(driver, locators, &account.tier).await {
            return Err(AutomationError::RecoveryExhausted(format!(
                "could not reposition at tier {}",
                account.tier
            )));
        }

        Ok(())
    }

    /// The watch-and-submit micro-sequence, with a real dwell: the stranded
    /// task's player state is unknown, so the position is not forced here.
    async fn watch_and_submit(
        driver: &dyn PageDriver,
        locators: &LocatorConfig,
    ) -> Result<(), AutomationError> {
        let timings = &locators.timings;
        let selectors = &locators.selectors;

        let result: Result<(), AutomationError> = async {
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

            driver.sleep(timings.watch_threshold).await;
            driver.sleep(timings.pre_submit_settle).await;

            if driver
                .wait_for_selector(&selectors.submit_button, timings.element_wait)
                .await?
                == Located::NotFound
                || !driver
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

            Ok(())
        }
        .await;

        if result.is_err() {
            driver.capture_diagnostic(snapshots::WATCH_AND_SUBMIT).await;
        }
        result
    }

    /// Navigate back `times` times, each click racing navigation with its
    /// own tolerance. The back control itself is mandatory.
    async fn navigate_back(
        driver: &dyn PageDriver,
        locators: &LocatorConfig,
        times: u32,
    ) -> Result<(), AutomationError> {
        let timings = &locators.timings;
        let back = &locators.selectors.back_button;

        for _ in 0..times {
            if driver.wait_for_selector(back, timings.element_wait).await? == Located::NotFound {
                driver.capture_diagnostic(snapshots::NAVIGATE_BACK).await;
                return Err(AutomationError::RequiredElementMissing(back.clone()));
            }
            driver.click(back).await?;
            Self::tolerant_navigation(driver, locators).await?;
        }

        Ok(())
    }

    async fn tolerant_navigation(
        driver: &dyn PageDriver,
        locators: &LocatorConfig,
    ) -> Result<(), AutomationError> {
        // Race-then-continue: a missed navigation event is not an error.
        let _ = driver
            .wait_for_navigation(locators.timings.back_navigation)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fake::FakeDriver;

    fn account() -> Account {
        Account {
            username: "tester".into(),
            telephone: "0820000000".into(),
            password: "secret".into(),
            tier: "K2".into(),
            automation_scheduled: true,
        }
    }

    #[tokio::test]
    async fn successful_recovery_repositions_at_the_tier() {
        let locators = LocatorConfig::default();
        let driver = FakeDriver::new();
        driver.set_url("https://stagwelltv88.com/#/taskList/K2");

        let recovered = StuckRecovery::unstick(&driver, &locators, &account()).await;
        assert!(recovered);

        // The session must be positioned such that a subsequent call
        // succeeds too.
        assert!(TierNavigator::navigate_to_tier(&driver, &locators, "K2").await);
    }

    #[tokio::test]
    async fn missing_back_control_fails_with_snapshot() {
        let locators = LocatorConfig::default();
        let driver = FakeDriver::new();
        driver.script_selector(&locators.selectors.back_button, Located::NotFound);

        let recovered = StuckRecovery::unstick(&driver, &locators, &account()).await;

        assert!(!recovered);
        assert_eq!(driver.snapshots(), vec![snapshots::NAVIGATE_BACK.to_string()]);
    }

    #[tokio::test]
    async fn missing_stranded_task_fails_with_snapshot() {
        let locators = LocatorConfig::default();
        let driver = FakeDriver::new();
        driver.script_selector(&locators.selectors.task_item, Located::NotFound);

        let recovered = StuckRecovery::unstick(&driver, &locators, &account()).await;

        assert!(!recovered);
        assert_eq!(driver.snapshots(), vec![snapshots::UNSTICK_SUBMIT.to_string()]);
    }

    #[tokio::test]
    async fn failed_reposition_fails_the_recovery() {
        let locators = LocatorConfig::default();
        let driver = FakeDriver::new();
        // Submit path works, but every tier landing is the not-found route.
        driver.set_url("https://stagwelltv88.com/#/404");

        let recovered = StuckRecovery::unstick(&driver, &locators, &account()).await;
        assert!(!recovered);
    }

    #[tokio::test]
    async fn recovery_dwells_instead_of_fast_forwarding() {
        let locators = LocatorConfig::default();
        let driver = FakeDriver::new();
        driver.set_url("https://stagwelltv88.com/#/taskList/K2");

        StuckRecovery::unstick(&driver, &locators, &account()).await;

        let dwell = format!("sleep:{}", locators.timings.watch_threshold.as_millis());
        assert!(driver.calls().contains(&dwell));
    }
}
