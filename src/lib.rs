//! Translate Android `<string>` resources into twenty languages with an LLM,
//! reusing translations cached in a shared translation memory.

pub mod auth;
pub mod config;
pub mod github;
pub mod languages;
pub mod memory;
pub mod parser;
pub mod reconcile;
pub mod retry;
pub mod server;
pub mod session;
pub mod store;
pub mod translation;
