//! Browser layer: the page-driver capability and its CDP implementation.

mod driver;
mod errors;
mod session;

pub use driver::{Located, NavOutcome, PageDriver, SessionFactory, TextMatch};
pub use errors::AutomationError;
pub use session::{CdpSession, CdpSessionFactory, SessionConfig};
