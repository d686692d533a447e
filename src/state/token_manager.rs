use super::secret_store::{SecretStore, SecretStoreError};
use crate::types::{TokenPair, UserRole};
use std::sync::Arc;
use thiserror::Error;

pub const KEY_ACCESS_TOKEN: &str = "accessToken";
pub const KEY_REFRESH_TOKEN: &str = "refreshToken";
pub const KEY_USER_ROLE: &str = "userRole";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenStoreError {
    #[error("failed to write {key}: {source}")]
    Write {
        key: &'static str,
        #[source]
        source: SecretStoreError,
    },
    #[error("failed to read {key}: {source}")]
    Read {
        key: &'static str,
        #[source]
        source: SecretStoreError,
    },
    #[error("failed to delete {key}: {source}")]
    Delete {
        key: &'static str,
        #[source]
        source: SecretStoreError,
    },
}

/// Typed access to the credential pair and cached role.
#[derive(Clone)]
pub struct TokenManager {
    store: Arc<dyn SecretStore>,
}

impl TokenManager {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }

    /// Writes both tokens, then the role when one is given. If the refresh token
    /// cannot be written the access token is removed again so that no half pair
    /// survives. The role is best effort: once the pair is stored a failed role
    /// write only leaves the role unknown.
    pub async fn save_tokens(
        &self,
        access_token: &str,
        refresh_token: &str,
        role: Option<UserRole>,
    ) -> Result<(), TokenStoreError> {
        let result = self.write_pair(access_token, refresh_token, role);
        if let Err(e) = &result {
            tracing::error!(error = %e, "failed to persist credentials");
        }
        result
    }

    fn write_pair(
        &self,
        access_token: &str,
        refresh_token: &str,
        role: Option<UserRole>,
    ) -> Result<(), TokenStoreError> {
        self.write(KEY_ACCESS_TOKEN, access_token)?;

        if let Err(e) = self.write(KEY_REFRESH_TOKEN, refresh_token) {
            if let Err(rollback) = self.store.delete(KEY_ACCESS_TOKEN) {
                tracing::warn!(error = %rollback, "failed to roll back access token");
            }
            return Err(e);
        }

        if let Some(role) = role {
            if let Err(e) = self.write(KEY_USER_ROLE, role.as_str()) {
                tracing::warn!(error = %e, "credentials saved without a cached role");
                // A role left over from an earlier session must not outlive it.
                if let Err(e) = self.store.delete(KEY_USER_ROLE) {
                    tracing::warn!(error = %e, "failed to drop stale user role");
                }
            }
        }
        Ok(())
    }

    pub async fn save_role(&self, role: UserRole) -> Result<(), TokenStoreError> {
        self.write(KEY_USER_ROLE, role.as_str())
    }

    pub async fn access_token(&self) -> Result<Option<String>, TokenStoreError> {
        self.read(KEY_ACCESS_TOKEN)
    }

    pub async fn refresh_token(&self) -> Result<Option<String>, TokenStoreError> {
        self.read(KEY_REFRESH_TOKEN)
    }

    /// Unknown stored strings read as absent.
    pub async fn user_role(&self) -> Result<Option<UserRole>, TokenStoreError> {
        let Some(raw) = self.read(KEY_USER_ROLE)? else {
            return Ok(None);
        };
        match raw.parse::<UserRole>() {
            Ok(role) => Ok(Some(role)),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring stored user role");
                Ok(None)
            }
        }
    }

    /// Both halves, or nothing.
    pub async fn credentials(&self) -> Result<Option<TokenPair>, TokenStoreError> {
        let access_token = self.read(KEY_ACCESS_TOKEN)?;
        let refresh_token = self.read(KEY_REFRESH_TOKEN)?;
        Ok(access_token
            .zip(refresh_token)
            .map(|(access_token, refresh_token)| TokenPair {
                access_token,
                refresh_token,
            }))
    }

    /// Deletes all three keys even when one of the deletes fails; reports the
    /// first failure.
    pub async fn clear_tokens(&self) -> Result<(), TokenStoreError> {
        let mut first_error = None;
        for key in [KEY_ACCESS_TOKEN, KEY_REFRESH_TOKEN, KEY_USER_ROLE] {
            if let Err(source) = self.store.delete(key) {
                tracing::error!(key, error = %source, "failed to delete credential");
                first_error.get_or_insert(TokenStoreError::Delete { key, source });
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn write(&self, key: &'static str, value: &str) -> Result<(), TokenStoreError> {
        self.store
            .set(key, value)
            .map_err(|source| TokenStoreError::Write { key, source })
    }

    /// Values come back byte for byte; only an empty value reads as absent.
    fn read(&self, key: &'static str) -> Result<Option<String>, TokenStoreError> {
        let value = self
            .store
            .get(key)
            .map_err(|source| TokenStoreError::Read { key, source })?;
        Ok(value.filter(|v| !v.is_empty()))
    }
}
