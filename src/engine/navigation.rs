//! Tier navigator
//!
//! Positions a session at a tier's task listing. The attempt loop is an
//! explicit state machine so transition coverage can be tested without a
//! live page.

use tracing::{debug, info, warn};

use crate::browser::{AutomationError, Located, PageDriver, TextMatch};
use crate::locators::{LocatorConfig, TIER_NAV_ATTEMPTS};

use super::BODY_TEXT_SCRIPT;

/// Navigation progress, tagged explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavState {
    Idle,
    Attempting(u32),
    Succeeded,
    Failed,
}

pub struct TierNavigator;

impl TierNavigator {
    /// Drive the session to `tier_name`'s task listing.
    ///
    /// Returns whether the session ended up positioned there. Never raises
    /// past this boundary: attempt errors are logged and count as failed
    /// attempts; an exhausted budget is a normal `false`.
    pub async fn navigate_to_tier(
        driver: &dyn PageDriver,
        locators: &LocatorConfig,
        tier_name: &str,
    ) -> bool {
        // Unknown tier is a validation failure: no attempts, no side effects.
        let Some(tier) = locators.resolve_tier(tier_name) else {
            warn!("Unknown tier '{}', no navigation attempted", tier_name);
            return false;
        };

        let mut state = NavState::Idle;
        debug!("Tier navigator {:?} for {}", state, tier.name);

        for attempt in 1..=TIER_NAV_ATTEMPTS {
            state = NavState::Attempting(attempt);
            debug!("Tier {} navigation {:?} of {}", tier.name, state, TIER_NAV_ATTEMPTS);

            match Self::attempt(driver, locators, &tier.match_token).await {
                Ok(true) => {
                    state = NavState::Succeeded;
                    info!("Positioned at tier {} ({:?})", tier.name, state);
                    return true;
                }
                Ok(false) => {}
                Err(e) => warn!("Tier {} attempt {} errored: {}", tier.name, attempt, e),
            }

            if attempt < TIER_NAV_ATTEMPTS {
                if let Err(e) = driver.go_back().await {
                    warn!("Error going back after failed attempt: {}", e);
                }
                driver.sleep(locators.timings.tier_retry_settle).await;
            }
        }

        state = NavState::Failed;
        warn!("Tier {} navigation exhausted ({:?})", tier.name, state);
        false
    }

    /// One attempt: reveal the tier grid, click the matching cell, race
    /// navigation against a fixed ceiling, and validate the landing state.
    async fn attempt(
        driver: &dyn PageDriver,
        locators: &LocatorConfig,
        match_token: &str,
    ) -> Result<bool, AutomationError> {
        let timings = &locators.timings;
        let selectors = &locators.selectors;

        driver.scroll_by_viewport().await?;

        // Best-effort settle; a timeout here is only a missed optimization.
        let _ = driver.wait_for_navigation(timings.navigation_race).await?;

        if driver
            .wait_for_selector(&selectors.tier_cell, timings.element_wait)
            .await?
            == Located::NotFound
        {
            return Ok(false);
        }

        if !driver
            .click_by_text(&selectors.tier_cell, match_token, TextMatch::Substring)
            .await?
        {
            return Ok(false);
        }

        // Client-side route changes may not fire a full navigation event, so
        // whichever of navigation/ceiling resolves first is accepted.
        let _ = driver.wait_for_navigation(timings.navigation_race).await?;

        Self::validate_landing(driver, locators).await
    }

    /// Reject landings on the not-found route, pages carrying the 404 marker,
    /// and the platform's outage page.
    async fn validate_landing(
        driver: &dyn PageDriver,
        locators: &LocatorConfig,
    ) -> Result<bool, AutomationError> {
        let routes = &locators.routes;

        let url = driver.current_url().await?;
        if url.contains(&routes.not_found_route) {
            debug!("Landed on not-found route: {}", url);
            return Ok(false);
        }

        let content = driver.evaluate(BODY_TEXT_SCRIPT).await?;
        let content = content.as_str().unwrap_or("");
        if content.contains(&routes.not_found_marker) {
            debug!("Page content carries the not-found marker");
            return Ok(false);
        }
        if content
            .trim()
            .to_lowercase()
            .starts_with(&routes.outage_prefix)
        {
            debug!("Page content starts with the outage marker");
            return Ok(false);
        }

        Ok(true)
    }
}
