//! fitcache core - user data cache and sync for a fitness app.
//!
//! Keeps a signed-in user's quiz answers, generated diet and workout plans
//! and progress data available to a front end:
//!
//! - `store`: reducer-based state container, the single source of truth
//! - `cache`: versioned TTL cache and the local mirror used as fallback
//! - `remote`: document store seam with in-memory and HTTP adapters
//! - `sync`: loading with retry, pushes, plan generation, push subscriptions
//! - `context`: the facade front ends call

pub mod api;
pub mod auth;
pub mod cache;
pub mod clock;
pub mod config;
pub mod context;
pub mod models;
pub mod nutrition;
pub mod remote;
pub mod store;
pub mod sync;
pub mod utils;

pub use context::{ConfigBinder, SessionBinder, UserDataContext};
