//! Account directory
//!
//! Persisted accounts the engine consumes. The engine only ever reads an
//! account per run; mutation happens through the web surface's schedule
//! endpoint.

use std::path::PathBuf;

use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// A registered user of the rewards platform.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Identity token within this service.
    pub username: String,
    /// Third-party platform credentials.
    pub telephone: String,
    pub password: String,
    /// Assigned reward tier name (must resolve in the tier table).
    pub tier: String,
    /// Whether the recurring trigger picks this account up.
    #[serde(default)]
    pub automation_scheduled: bool,
}

/// Account info safe to return over HTTP.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub username: String,
    pub telephone: String,
    pub tier: String,
    pub automation_scheduled: bool,
}

impl From<&Account> for AccountInfo {
    fn from(account: &Account) -> Self {
        Self {
            username: account.username.clone(),
            telephone: account.telephone.clone(),
            tier: account.tier.clone(),
            automation_scheduled: account.automation_scheduled,
        }
    }
}

/// JSON-file backed account store.
pub struct AccountStore {
    accounts: RwLock<Vec<Account>>,
    path: Option<PathBuf>,
}

impl AccountStore {
    fn store_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("stagwell-runner").join("accounts.json"))
    }

    /// Load the store from disk; an absent or unreadable file yields an
    /// empty store.
    pub fn load() -> Self {
        let path = Self::store_path();
        let accounts = path
            .as_ref()
            .filter(|p| p.exists())
            .and_then(|p| match std::fs::read_to_string(p) {
                Ok(content) => match serde_json::from_str::<Vec<Account>>(&content) {
                    Ok(accounts) => {
                        info!("Loaded {} accounts from {:?}", accounts.len(), p);
                        Some(accounts)
                    }
                    Err(e) => {
                        warn!("Failed to parse accounts file: {}", e);
                        None
                    }
                },
                Err(e) => {
                    warn!("Failed to read accounts file: {}", e);
                    None
                }
            })
            .unwrap_or_default();

        Self {
            accounts: RwLock::new(accounts),
            path,
        }
    }

    /// In-memory store for tests.
    #[cfg(test)]
    pub fn in_memory(accounts: Vec<Account>) -> Self {
        Self {
            accounts: RwLock::new(accounts),
            path: None,
        }
    }

    /// All accounts flagged for scheduled automation, in directory order.
    pub async fn list_scheduled(&self) -> Vec<Account> {
        self.accounts
            .read()
            .await
            .iter()
            .filter(|a| a.automation_scheduled)
            .cloned()
            .collect()
    }

    /// Look up one account by username.
    pub async fn get(&self, username: &str) -> Option<Account> {
        self.accounts
            .read()
            .await
            .iter()
            .find(|a| a.username == username)
            .cloned()
    }

    /// All accounts, redacted for the HTTP surface.
    pub async fn list_info(&self) -> Vec<AccountInfo> {
        self.accounts.read().await.iter().map(AccountInfo::from).collect()
    }

    /// Insert or replace an account by username, then persist.
    pub async fn upsert(&self, account: Account) {
        {
            let mut accounts = self.accounts.write().await;
            if let Some(existing) = accounts.iter_mut().find(|a| a.username == account.username) {
                *existing = account;
            } else {
                accounts.push(account);
            }
        }
        self.save().await;
    }

    async fn save(&self) {
        let Some(ref path) = self.path else {
            return;
        };

        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                error!("Failed to create accounts directory: {}", e);
                return;
            }
        }

        let accounts = self.accounts.read().await;
        match serde_json::to_string_pretty(&*accounts) {
            Ok(content) => {
                if let Err(e) = std::fs::write(path, content) {
                    error!("Failed to save accounts: {}", e);
                }
            }
            Err(e) => {
                error!("Failed to serialize accounts: {}", e);
            }
        }
    }
}
