//! Credential lookup

use crate::error::Result;
use async_trait::async_trait;
use tally_model::AccountCredentials;

/// Source of per-account credentials
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Every known account
    async fn accounts(&self) -> Result<Vec<AccountCredentials>>;

    async fn get(&self, account_id: &str) -> Result<Option<AccountCredentials>>;
}

/// Credentials fixed at startup (from the `[[accounts]]` config section)
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialStore {
    accounts: Vec<AccountCredentials>,
}

impl StaticCredentialStore {
    pub fn new(accounts: Vec<AccountCredentials>) -> Self {
        Self { accounts }
    }
}

#[async_trait]
impl CredentialStore for StaticCredentialStore {
    async fn accounts(&self) -> Result<Vec<AccountCredentials>> {
        Ok(self.accounts.clone())
    }

    async fn get(&self, account_id: &str) -> Result<Option<AccountCredentials>> {
        Ok(self
            .accounts
            .iter()
            .find(|a| a.account_id == account_id)
            .cloned())
    }
}
