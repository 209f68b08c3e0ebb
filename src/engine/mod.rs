//! The automation engine: session controller, tier navigator, watch loop,
//! stuck recovery, and the batch runner that sequences them per account.

pub mod login;
pub mod navigation;
pub mod recovery;
pub mod runner;
pub mod watcher;

#[cfg(test)]
pub(crate) mod fake;

pub use login::SessionController;
pub use navigation::{NavState, TierNavigator};
pub use recovery::StuckRecovery;
pub use runner::{run_account, run_batch, RunOutcome, RunResult};
pub use watcher::{StopReason, VideoWatchLoop, WatchPhase, WatchReport};

/// Script that forces the player position to the minimum-watch threshold and
/// rewrites the on-screen progress label so the UI agrees with the forced
/// state before submission.
pub(crate) fn fast_forward_script(
    player_selector: &str,
    label_selector: &str,
    threshold_secs: u64,
) -> String {
    let player = serde_json::to_string(player_selector).unwrap_or_default();
    let label = serde_json::to_string(label_selector).unwrap_or_default();
    format!(
        r#"(function() {{
            const player = document.querySelector({player});
            if (!player) return false;
            player.currentTime = {threshold_secs};
            const label = document.querySelector({label});
            if (label) label.textContent = '{threshold_secs}s';
            return true;
        }})()"#
    )
}

/// Script that clicks, inside the task listing, the first task item whose
/// action control carries the expected label (case-insensitive).
pub(crate) fn stuck_task_script(
    item_selector: &str,
    button_selector: &str,
    label: &str,
) -> String {
    let item = serde_json::to_string(item_selector).unwrap_or_default();
    let button = serde_json::to_string(button_selector).unwrap_or_default();
    let target = serde_json::to_string(label).unwrap_or_default();
    format!(
        r#"(function() {{
            const target = {target}.toLowerCase();
            const items = document.querySelectorAll({item});
            for (const item of items) {{
                const control = item.querySelector({button});
                if (control && (control.textContent || '').trim().toLowerCase() === target) {{
                    control.click();
                    return true;
                }}
            }}
            return false;
        }})()"#
    )
}

/// Script reading the page's leading visible text, used to validate where a
/// tier click landed.
pub(crate) const BODY_TEXT_SCRIPT: &str = "document.body.innerText";
