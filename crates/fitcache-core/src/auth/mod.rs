//! Authentication: session identity and token storage.
//!
//! This module provides:
//! - `SessionData` / `AuthState`: who is signed in, as the store sees it
//! - `Session`: the last session persisted to disk (tokens expire after 60 minutes)
//! - `CredentialStore`: bearer tokens in the OS keychain via keyring

pub mod credentials;
pub mod session;

pub use credentials::CredentialStore;
pub use session::{AuthState, Session, SessionData};
