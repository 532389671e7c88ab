//! Onboarding Flow: a configurable multi-step signup wizard served over HTTP.

pub mod config;
pub mod error;
pub mod onboarding;
pub mod records;
pub mod server;
pub mod store;
