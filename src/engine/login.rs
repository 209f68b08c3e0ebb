//! Session controller: login, optional popup/overlay handling, and the
//! logout traversal.

use tracing::{debug, info, warn};

use crate::browser::{AutomationError, Located, NavOutcome, PageDriver, TextMatch};
use crate::locators::{snapshots, LocatorConfig};

pub struct SessionController;

impl SessionController {
    /// Dismiss the landing-page confirmation popup if it appears. Absence is
    /// not an error.
    pub async fn handle_popup(
        driver: &dyn PageDriver,
        locators: &LocatorConfig,
    ) -> Result<(), AutomationError> {
        let located = driver
            .wait_for_selector(&locators.selectors.popup_confirm, locators.timings.popup_wait)
            .await?;

        match located {
            Located::Found => driver.click(&locators.selectors.popup_confirm).await,
            Located::NotFound => {
                debug!("No popup appeared");
                Ok(())
            }
        }
    }

    /// Dismiss the post-login promotional overlay if it appears. Absence is
    /// not an error.
    pub async fn handle_overlay(
        driver: &dyn PageDriver,
        locators: &LocatorConfig,
    ) -> Result<(), AutomationError> {
        let located = driver
            .wait_for_selector(&locators.selectors.overlay_close, locators.timings.overlay_wait)
            .await?;

        match located {
            Located::Found => driver.click(&locators.selectors.overlay_close).await,
            Located::NotFound => {
                debug!("No overlay detected");
                Ok(())
            }
        }
    }

    /// Log the account into the platform.
    ///
    /// Fails fast on empty credentials before touching the page. Mandatory
    /// form elements capture a diagnostic snapshot before propagating.
    pub async fn login(
        driver: &dyn PageDriver,
        locators: &LocatorConfig,
        telephone: &str,
        password: &str,
    ) -> Result<(), AutomationError> {
        if telephone.is_empty() || password.is_empty() {
            return Err(AutomationError::InvalidCredentials);
        }

        let timings = &locators.timings;
        let selectors = &locators.selectors;

        Self::handle_popup(driver, locators).await?;

        if driver
            .wait_for_selector(&selectors.telephone_input, timings.element_wait)
            .await?
            == Located::NotFound
        {
            driver.capture_diagnostic(snapshots::TELEPHONE_FIELD).await;
            return Err(AutomationError::RequiredElementMissing(
                selectors.telephone_input.clone(),
            ));
        }
        driver.type_text(&selectors.telephone_input, telephone).await?;

        if driver
            .wait_for_selector(&selectors.password_input, timings.element_wait)
            .await?
            == Located::NotFound
        {
            driver.capture_diagnostic(snapshots::PASSWORD_FIELD).await;
            return Err(AutomationError::RequiredElementMissing(
                selectors.password_input.clone(),
            ));
        }
        driver.type_text(&selectors.password_input, password).await?;

        if driver
            .wait_for_selector(&selectors.login_button, timings.element_wait)
            .await?
            == Located::NotFound
        {
            driver.capture_diagnostic(snapshots::LOGIN_BUTTON).await;
            return Err(AutomationError::RequiredElementMissing(
                selectors.login_button.clone(),
            ));
        }

        // Login's navigation is the one definitive transition in the whole
        // flow; a timeout here is fatal.
        driver.click(&selectors.login_button).await?;
        match driver.wait_for_navigation(timings.login_navigation).await? {
            NavOutcome::Completed => {}
            NavOutcome::TimedOut => {
                driver.capture_diagnostic(snapshots::LOGIN_PROCESS).await;
                return Err(AutomationError::NavigationTimeout(
                    "login submit".to_string(),
                ));
            }
        }

        // Form accepted but rejected server-side, or the submit no-opped.
        let url = driver.current_url().await?;
        if url.contains(&locators.routes.login_marker) {
            driver.capture_diagnostic(snapshots::LOGIN_FAILED).await;
            return Err(AutomationError::LoginFailed);
        }

        info!("Login succeeded");
        Self::handle_overlay(driver, locators).await?;

        Ok(())
    }

    /// Traverse back → "My" tab → "Personal information" → "Exit login".
    ///
    /// Navigation waits are tolerant of timeout; each required control's
    /// absence is fatal with a diagnostic snapshot.
    pub async fn logout(
        driver: &dyn PageDriver,
        locators: &LocatorConfig,
    ) -> Result<(), AutomationError> {
        let timings = &locators.timings;
        let selectors = &locators.selectors;
        let labels = &locators.labels;

        if driver
            .wait_for_selector(&selectors.back_button, timings.logout_navigation)
            .await?
            == Located::NotFound
        {
            driver.capture_diagnostic(snapshots::NAVIGATE_BACK).await;
            return Err(AutomationError::RequiredElementMissing(
                selectors.back_button.clone(),
            ));
        }
        driver.click(&selectors.back_button).await?;
        Self::tolerant_navigation(driver, locators, "logout back").await?;

        if driver
            .wait_for_selector(&selectors.tabbar_label, timings.element_wait)
            .await?
            == Located::NotFound
            || !driver
                .click_by_text(&selectors.tabbar_label, &labels.my_tab, TextMatch::Exact)
                .await?
        {
            driver.capture_diagnostic(snapshots::LOGOUT_BUTTON).await;
            return Err(AutomationError::RequiredElementMissing(format!(
                "tab '{}'",
                labels.my_tab
            )));
        }
        Self::tolerant_navigation(driver, locators, "account tab").await?;

        if driver
            .wait_for_selector(&selectors.cell_title, timings.element_wait)
            .await?
            == Located::NotFound
            || !driver
                .click_by_text(&selectors.cell_title, &labels.personal_info, TextMatch::Exact)
                .await?
        {
            driver.capture_diagnostic(snapshots::PERSONAL_INFO).await;
            return Err(AutomationError::RequiredElementMissing(format!(
                "cell '{}'",
                labels.personal_info
            )));
        }
        Self::tolerant_navigation(driver, locators, "personal information").await?;

        if driver
            .wait_for_selector(&selectors.logout_cell, timings.element_wait)
            .await?
            == Located::NotFound
            || !driver
                .click_by_text(&selectors.logout_cell, &labels.exit_login, TextMatch::Exact)
                .await?
        {
            driver.capture_diagnostic(snapshots::LOGOUT_BUTTON).await;
            return Err(AutomationError::RequiredElementMissing(format!(
                "control '{}'",
                labels.exit_login
            )));
        }
        Self::tolerant_navigation(driver, locators, "exit login").await?;

        info!("Logout traversal completed");
        Ok(())
    }

    async fn tolerant_navigation(
        driver: &dyn PageDriver,
        locators: &LocatorConfig,
        step: &str,
    ) -> Result<(), AutomationError> {
        match driver
            .wait_for_navigation(locators.timings.logout_navigation)
            .await?
        {
            NavOutcome::Completed => {}
            NavOutcome::TimedOut => warn!("Navigation after '{}' timed out, continuing", step),
        }
        Ok(())
    }
}
