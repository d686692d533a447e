mod secret_store;
mod token_manager;

#[cfg(feature = "keyring")]
pub use secret_store::KeyringSecretStore;
pub use secret_store::{MemorySecretStore, SecretStore, SecretStoreError, DEFAULT_KEYRING_SERVICE};
pub use token_manager::{
    TokenManager, TokenStoreError, KEY_ACCESS_TOKEN, KEY_REFRESH_TOKEN, KEY_USER_ROLE,
};
