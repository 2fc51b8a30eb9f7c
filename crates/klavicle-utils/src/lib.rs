//! Shared utilities for klavicle
//!
//! This crate provides common functionality used across the klavicle workspace,
//! including logging setup, the persisted configuration file, and credential
//! lookup for LLM providers.

pub mod config;
pub mod logging;

pub use config::{ConfigError, ConfigManager, CredentialStore};
pub use logging::{LogFormat, init_tracing, init_tracing_with};
