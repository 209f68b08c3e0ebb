//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    extract::{Extension, Json},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tracing::info;

use crate::accounts::Account;
use crate::browser::CdpSessionFactory;
use crate::engine::{self, RunOutcome};
use crate::scheduler;
use crate::{AppConfig, AppState};

/// JSON error response helper
fn err_response(status: StatusCode, msg: &str) -> impl IntoResponse {
    (status, Json(serde_json::json!({ "error": msg })))
}

/// Build the API router with all endpoints.
pub fn api_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Config
        .route("/config", get(get_config).post(configure))
        // Automation
        .route("/automation/run", post(run_now))
        .route("/automation/batch", post(trigger_batch))
        .route("/automation/schedule", post(schedule_account))
        // State
        .route("/accounts", get(get_accounts))
        .route("/runs/last", get(get_last_results))
        // Auth middleware (only if STAGWELL_WEB_PASS is set)
        .layer(middleware::from_fn(super::auth::basic_auth_middleware))
        .layer(Extension(state))
}

// ========== Config Handlers ==========

async fn get_config(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    let config = state.config.read().await.clone();
    Json(config)
}

async fn configure(
    Extension(state): Extension<Arc<AppState>>,
    Json(config): Json<AppConfig>,
) -> impl IntoResponse {
    info!("Configuring application via web API");
    state.configure(config).await;
    StatusCode::OK
}

// ========== Automation Handlers ==========

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunRequest {
    #[serde(default)]
    username: Option<String>,
    telephone: String,
    password: String,
    tier: String,
}

impl RunRequest {
    fn into_account(self, scheduled: bool) -> Account {
        Account {
            username: self.username.unwrap_or_else(|| self.telephone.clone()),
            telephone: self.telephone,
            password: self.password,
            tier: self.tier,
            automation_scheduled: scheduled,
        }
    }
}

/// Run one account synchronously; the response reports the outcome.
async fn run_now(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<RunRequest>,
) -> impl IntoResponse {
    let account = request.into_account(false);
    info!("Manual run requested for {}", account.username);

    let session_config = state.config.read().await.session_config();
    let factory = CdpSessionFactory::new(session_config);

    let result = engine::run_account(&factory, &state.locators, &account).await;
    state.last_results.write().await.push(result.clone());

    match result.outcome {
        RunOutcome::Completed => Json(serde_json::json!({
            "message": format!("Run completed for {}", result.account_id),
            "videosWatched": result.videos_watched,
        }))
        .into_response(),
        RunOutcome::Failed(reason) => {
            err_response(StatusCode::INTERNAL_SERVER_ERROR, &reason).into_response()
        }
    }
}

/// Kick off the full scheduled batch in the background.
async fn trigger_batch(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    info!("Manual batch trigger");
    tokio::spawn(scheduler::run_scheduled_batch(state));
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "message": "batch started" })),
    )
}

/// Persist an account and opt it into the scheduled batches.
async fn schedule_account(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<RunRequest>,
) -> impl IntoResponse {
    let account = request.into_account(true);

    if state.locators.resolve_tier(&account.tier).is_none() {
        return err_response(
            StatusCode::BAD_REQUEST,
            &format!("unknown tier '{}'", account.tier),
        )
        .into_response();
    }

    info!("Scheduling automation for {}", account.username);
    let username = account.username.clone();
    state.accounts.upsert(account).await;

    Json(serde_json::json!({
        "message": format!("Automation scheduled for {}", username),
    }))
    .into_response()
}

// ========== State Handlers ==========

async fn get_accounts(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    Json(state.accounts.list_info().await)
}

async fn get_last_results(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    Json(state.last_results.read().await.clone())
}
