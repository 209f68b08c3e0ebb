//! Locator configuration
//!
//! Every selector, visible label, tier definition, and fixed delay the engine
//! touches lives here. The platform relabels its UI from time to time, so
//! nothing in the engine compares against a literal string; components take
//! a `LocatorConfig` and look the values up.

use std::time::Duration;

/// Diagnostic snapshot file names, keyed by failure site.
/// Overwritten each run; intended for manual post-mortem only.
pub mod snapshots {
    pub const TELEPHONE_FIELD: &str = "error_telephone.png";
    pub const PASSWORD_FIELD: &str = "error_password.png";
    pub const LOGIN_BUTTON: &str = "error_login_button.png";
    pub const LOGIN_PROCESS: &str = "error_login_process.png";
    pub const LOGIN_FAILED: &str = "login_failed.png";
    pub const LOGOUT_BUTTON: &str = "logout_button_not_found.png";
    pub const PERSONAL_INFO: &str = "personal_info_button_not_found.png";
    pub const UNSTICK_SUBMIT: &str = "submit_button_not_found.png";
    pub const UNSTICK_ERROR: &str = "unstick_video_error.png";
    pub const WATCH_AND_SUBMIT: &str = "watch_and_submit_video_error.png";
    pub const NAVIGATE_BACK: &str = "navigate_back_error.png";
}

/// A reward tier: display name, the token matched against grid cells on the
/// tier page, and the number of videos the platform associates with it.
///
/// The quota is metadata only; the watch loop derives exhaustion from the
/// live remaining-count indicator, never from this number.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TierDefinition {
    pub name: String,
    pub match_token: String,
    pub video_quota: u32,
}

impl TierDefinition {
    fn new(name: &str, match_token: &str, video_quota: u32) -> Self {
        Self {
            name: name.to_string(),
            match_token: match_token.to_string(),
            video_quota,
        }
    }
}

/// CSS selectors for every element the engine interacts with.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Selectors {
    pub popup_confirm: String,
    pub telephone_input: String,
    pub password_input: String,
    pub login_button: String,
    pub overlay_close: String,
    pub back_button: String,
    pub tabbar_item: String,
    pub tabbar_label: String,
    pub cell_title: String,
    pub logout_cell: String,
    pub tier_cell: String,
    pub remaining_counter: String,
    pub video_thumbnail: String,
    pub video_player: String,
    pub submit_button: String,
    pub progress_label: String,
    pub task_item: String,
    pub task_submit_button: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            popup_confirm:
                "button.van-button.van-button--default.van-button--large.van-dialog__confirm".into(),
            telephone_input:
                "input[type=\"tel\"][placeholder=\"Please enter your phone number\"]".into(),
            password_input:
                "input[type=\"password\"][placeholder=\"Please enter login password\"]".into(),
            login_button:
                "button.van-button.van-button--danger.van-button--large.van-button--block.van-button--round"
                    .into(),
            overlay_close: "a.close i.van-icon-clear".into(),
            back_button: "i.van-icon-arrow-left".into(),
            tabbar_item: "div.van-tabbar-item".into(),
            tabbar_label: "div.van-tabbar-item__text".into(),
            cell_title: "div.van-cell__title".into(),
            logout_cell: "div.logout".into(),
            tier_cell: "div.van-grid-item__content".into(),
            remaining_counter:
                ".van-grid-item__content.van-grid-item__content--center".into(),
            video_thumbnail: "div[data-v-5d290310].van-image".into(),
            video_player: "video".into(),
            submit_button:
                "button.van-button.van-button--danger.van-button--normal.van-button--block".into(),
            progress_label: "span.watch-progress".into(),
            task_item: "div.TaskItem.van-cell".into(),
            task_submit_button: "button.van-button--info".into(),
        }
    }
}

/// Visible labels matched against element text. Exact matches unless a
/// component documents otherwise.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Labels {
    pub my_tab: String,
    pub personal_info: String,
    pub exit_login: String,
    pub submit_completed: String,
    /// Matched by substring against tab bar items.
    pub task_tab: String,
    /// Matched case-insensitively against task-item action controls.
    pub task_submit: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            my_tab: "My".into(),
            personal_info: "Personal information".into(),
            exit_login: "Exit login".into(),
            submit_completed: "Submit completed task".into(),
            task_tab: "Task".into(),
            task_submit: "submit".into(),
        }
    }
}

/// Route markers used to validate where the browser landed.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Routes {
    pub base_url: String,
    /// Still being on this route after submit means the login was rejected.
    pub login_marker: String,
    pub not_found_route: String,
    pub not_found_marker: String,
    /// Leading page text starting with this (case-insensitive) means the
    /// platform is serving its outage page.
    pub outage_prefix: String,
}

impl Default for Routes {
    fn default() -> Self {
        Self {
            base_url: "https://stagwelltv88.com".into(),
            login_marker: "login".into(),
            not_found_route: "#/404".into(),
            not_found_marker: "404".into(),
            outage_prefix: "service".into(),
        }
    }
}

/// Every fixed wait and settle delay, named. Timeouts are per-operation and
/// never cumulative across a run.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Timings {
    /// Optional confirm popup on the landing page.
    pub popup_wait: Duration,
    /// Mandatory form fields and controls.
    pub element_wait: Duration,
    /// Login's definitive navigation after submit.
    pub login_navigation: Duration,
    /// Optional post-login overlay.
    pub overlay_wait: Duration,
    /// Soft navigation waits during logout traversal.
    pub logout_navigation: Duration,
    /// Ceiling raced against navigation after a tier-cell click.
    pub navigation_race: Duration,
    /// Settle after a failed tier attempt before retrying.
    pub tier_retry_settle: Duration,
    /// Initial settle before the first remaining-count read.
    pub watch_initial_settle: Duration,
    /// Bounded wait for the remaining-count indicator on each retry.
    pub counter_wait: Duration,
    /// Delay between remaining-counter retries.
    pub counter_retry_delay: Duration,
    /// Minimum-watch threshold the player position is forced to.
    pub watch_threshold: Duration,
    /// Settle between fast-forward and submit.
    pub pre_submit_settle: Duration,
    /// Settle after submitting a completed task.
    pub post_submit_settle: Duration,
    /// Ceiling raced against navigation when going back after a submit.
    pub back_navigation: Duration,
    /// Settle at the end of each watch-loop iteration.
    pub loop_settle: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            popup_wait: Duration::from_secs(5),
            element_wait: Duration::from_secs(20),
            login_navigation: Duration::from_secs(60),
            overlay_wait: Duration::from_secs(10),
            logout_navigation: Duration::from_secs(10),
            navigation_race: Duration::from_secs(10),
            tier_retry_settle: Duration::from_secs(5),
            watch_initial_settle: Duration::from_secs(5),
            counter_wait: Duration::from_secs(10),
            counter_retry_delay: Duration::from_secs(2),
            watch_threshold: Duration::from_secs(15),
            pre_submit_settle: Duration::from_secs(1),
            post_submit_settle: Duration::from_secs(2),
            back_navigation: Duration::from_secs(30),
            loop_settle: Duration::from_secs(2),
        }
    }
}

/// Number of attempts the tier navigator makes before giving up.
pub const TIER_NAV_ATTEMPTS: u32 = 2;

/// Number of reads of the remaining-count indicator before the watch loop
/// treats the queue as exhausted.
pub const COUNTER_RETRIES: u32 = 5;

/// Static mapping from logical UI targets to locator strings, plus the tier
/// table and timing constants. Injected into every engine component.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LocatorConfig {
    pub selectors: Selectors,
    pub labels: Labels,
    pub routes: Routes,
    pub timings: Timings,
    pub tiers: Vec<TierDefinition>,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            selectors: Selectors::default(),
            labels: Labels::default(),
            routes: Routes::default(),
            timings: Timings::default(),
            tiers: vec![
                TierDefinition::new("intern", "intern", 5),
                TierDefinition::new("K1", "K1", 5),
                TierDefinition::new("K2", "K2", 10),
                TierDefinition::new("K3", "K3", 15),
                TierDefinition::new("K4", "K4", 30),
                TierDefinition::new("K5", "K5", 40),
                TierDefinition::new("K6", "K6", 50),
                TierDefinition::new("K7", "K7", 70),
                TierDefinition::new("K8", "K8", 100),
            ],
        }
    }
}

impl LocatorConfig {
    /// Resolve a tier name against the tier table. A miss is a validation
    /// failure at the call site, never a runtime fault.
    pub fn resolve_tier(&self, name: &str) -> Option<&TierDefinition> {
        self.tiers.iter().find(|t| t.name == name)
    }
}
