use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "fitcache";

/// Bearer tokens kept in the OS keychain, keyed by user id.
pub struct CredentialStore;

impl CredentialStore {
    pub fn store_token(user_id: &str, token: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, user_id).context("Failed to create keyring entry")?;
        entry
            .set_password(token)
            .context("Failed to store token in keychain")?;
        Ok(())
    }

    pub fn get_token(user_id: &str) -> Result<String> {
        let entry = Entry::new(SERVICE_NAME, user_id).context("Failed to create keyring entry")?;
        entry
            .get_password()
            .context("Failed to retrieve token from keychain")
    }

    pub fn delete(user_id: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, user_id).context("Failed to create keyring entry")?;
        entry
            .delete_credential()
            .context("Failed to delete token from keychain")?;
        Ok(())
    }

    pub fn has_token(user_id: &str) -> bool {
        Entry::new(SERVICE_NAME, user_id)
            .and_then(|entry| entry.get_password())
            .is_ok()
    }
}
