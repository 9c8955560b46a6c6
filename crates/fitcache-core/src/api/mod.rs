//! REST API client for the application backend.
//!
//! This module provides the `ApiClient` used for plan generation and, via
//! `remote::HttpDocumentStore`, for reading and writing user documents.
//! Requests carry the session's bearer token.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
