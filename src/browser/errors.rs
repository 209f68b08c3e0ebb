//! Automation error types

use thiserror::Error;

/// Faults raised by the engine and the browser layer.
///
/// Optional-element absence is never expressed here; bounded waits on
/// optional elements resolve to [`super::Located::NotFound`], a normal
/// branch. These variants are reserved for genuinely mandatory steps.
#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Invalid credentials: telephone or password is empty")]
    InvalidCredentials,

    #[error("Unknown tier: {0}")]
    UnknownTier(String),

    #[error("Required element missing: {0}")]
    RequiredElementMissing(String),

    #[error("Navigation timed out: {0}")]
    NavigationTimeout(String),

    #[error("Login failed: still on the login route after submit")]
    LoginFailed,

    #[error("Recovery exhausted: {0}")]
    RecoveryExhausted(String),

    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<AutomationError> for String {
    fn from(err: AutomationError) -> String {
        err.to_string()
    }
}
