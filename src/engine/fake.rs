//! Scripted in-memory [`PageDriver`] for engine tests.
//!
//! Defaults are permissive: every element is found, every labelled click
//! lands, every navigation completes, scripts return `true`. Tests script
//! the deviations they care about and inspect the recorded call log.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::browser::{AutomationError, Located, NavOutcome, PageDriver, TextMatch};

#[derive(Default)]
struct State {
    calls: Vec<String>,
    snapshots: Vec<String>,
    url: String,
    selector_overrides: HashMap<String, Located>,
    selector_queues: HashMap<String, VecDeque<Located>>,
    click_text_overrides: HashMap<String, bool>,
    click_text_queues: HashMap<String, VecDeque<bool>>,
    inner_text_queues: HashMap<String, VecDeque<Option<String>>>,
    eval_text: Option<String>,
    close_calls: u32,
}

pub(crate) struct FakeDriver {
    state: Mutex<State>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                url: "about:blank".to_string(),
                ..State::default()
            }),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn snapshots(&self) -> Vec<String> {
        self.state.lock().unwrap().snapshots.clone()
    }

    pub fn close_count(&self) -> u32 {
        self.state.lock().unwrap().close_calls
    }

    pub fn set_url(&self, url: &str) {
        self.state.lock().unwrap().url = url.to_string();
    }

    /// Pin every wait for `selector` to one outcome.
    pub fn script_selector(&self, selector: &str, located: Located) {
        self.state
            .lock()
            .unwrap()
            .selector_overrides
            .insert(selector.to_string(), located);
    }

    /// Queue per-wait outcomes for `selector`; once drained, waits fall
    /// back to the pinned outcome (or Found).
    pub fn script_selector_queue(&self, selector: &str, outcomes: Vec<Located>) {
        self.state
            .lock()
            .unwrap()
            .selector_queues
            .insert(selector.to_string(), outcomes.into());
    }

    /// Pin every labelled click on `selector` to one outcome.
    pub fn script_click_by_text(&self, selector: &str, clicked: bool) {
        self.state
            .lock()
            .unwrap()
            .click_text_overrides
            .insert(selector.to_string(), clicked);
    }

    /// Queue per-click outcomes for `selector`; once drained, clicks land.
    pub fn script_click_by_text_queue(&self, selector: &str, outcomes: Vec<bool>) {
        self.state
            .lock()
            .unwrap()
            .click_text_queues
            .insert(selector.to_string(), outcomes.into());
    }

    /// Queue the texts successive reads of `selector` observe; a drained
    /// queue reads as absent.
    pub fn script_inner_text(&self, selector: &str, texts: Vec<Option<String>>) {
        self.state
            .lock()
            .unwrap()
            .inner_text_queues
            .insert(selector.to_string(), texts.into());
    }

    /// Make every script evaluation return this string.
    pub fn script_eval_str(&self, text: &str) {
        self.state.lock().unwrap().eval_text = Some(text.to_string());
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl PageDriver for FakeDriver {
    async fn navigate(&self, url: &str, _timeout: Duration) -> Result<(), AutomationError> {
        self.record(format!("navigate:{url}"));
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        _timeout: Duration,
    ) -> Result<Located, AutomationError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("wait:{selector}"));

        if let Some(queue) = state.selector_queues.get_mut(selector) {
            if let Some(located) = queue.pop_front() {
                return Ok(located);
            }
        }
        Ok(state
            .selector_overrides
            .get(selector)
            .copied()
            .unwrap_or(Located::Found))
    }

    async fn click(&self, selector: &str) -> Result<(), AutomationError> {
        self.record(format!("click:{selector}"));
        Ok(())
    }

    async fn click_by_text(
        &self,
        selector: &str,
        needle: &str,
        _match_mode: TextMatch,
    ) -> Result<bool, AutomationError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("click_text:{selector}:{needle}"));

        if let Some(queue) = state.click_text_queues.get_mut(selector) {
            if let Some(clicked) = queue.pop_front() {
                return Ok(clicked);
            }
        }
        Ok(state
            .click_text_overrides
            .get(selector)
            .copied()
            .unwrap_or(true))
    }

    async fn type_text(&self, selector: &str, _text: &str) -> Result<(), AutomationError> {
        self.record(format!("type:{selector}"));
        Ok(())
    }

    async fn evaluate(&self, _script: &str) -> Result<Value, AutomationError> {
        let state = self.state.lock().unwrap();
        Ok(match &state.eval_text {
            Some(text) => Value::String(text.clone()),
            None => Value::Bool(true),
        })
    }

    async fn current_url(&self) -> Result<String, AutomationError> {
        Ok(self.state.lock().unwrap().url.clone())
    }

    async fn wait_for_navigation(&self, _timeout: Duration) -> Result<NavOutcome, AutomationError> {
        Ok(NavOutcome::Completed)
    }

    async fn go_back(&self) -> Result<(), AutomationError> {
        self.record("go_back".to_string());
        Ok(())
    }

    async fn scroll_by_viewport(&self) -> Result<(), AutomationError> {
        self.record("scroll".to_string());
        Ok(())
    }

    async fn inner_text(&self, selector: &str) -> Result<Option<String>, AutomationError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("inner_text:{selector}"));

        Ok(state
            .inner_text_queues
            .get_mut(selector)
            .and_then(|queue| queue.pop_front())
            .flatten())
    }

    async fn capture_diagnostic(&self, name: &str) {
        self.state.lock().unwrap().snapshots.push(name.to_string());
    }

    async fn sleep(&self, duration: Duration) {
        // Delays resolve instantly; the log keeps them observable.
        self.record(format!("sleep:{}", duration.as_millis()));
    }

    async fn close(&self) -> Result<(), AutomationError> {
        self.state.lock().unwrap().close_calls += 1;
        Ok(())
    }
}
