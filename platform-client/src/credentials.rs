use async_trait::async_trait;
use signalpost_core::{AccountConfig, CoreError, CredentialResolver, PlatformCredentials};
use std::collections::HashMap;
use tracing::debug;

/// Credentials known up front, keyed by account id. Accounts without an
/// access token are simply absent.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialResolver {
    accounts: HashMap<String, PlatformCredentials>,
}

impl StaticCredentialResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, account_id: impl Into<String>, credentials: PlatformCredentials) -> Self {
        self.accounts.insert(account_id.into(), credentials);
        self
    }

    pub fn from_config(account: &AccountConfig) -> Self {
        match account.credentials() {
            Some(credentials) => Self::new().with_account(account.id.clone(), credentials),
            None => Self::new(),
        }
    }
}

#[async_trait]
impl CredentialResolver for StaticCredentialResolver {
    async fn account_credentials(
        &self,
        account_id: &str,
    ) -> Result<Option<PlatformCredentials>, CoreError> {
        let credentials = self.accounts.get(account_id).cloned();
        if credentials.is_none() {
            debug!("No stored credentials for account {}", account_id);
        }
        Ok(credentials)
    }
}
