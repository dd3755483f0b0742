//! Finca Core - Foundation crate for the finca collection service.
//!
//! This crate provides the configuration layer, shared error types, and the
//! job-kind type that all other finca crates depend on.
//!
//! # Modules
//!
//! - [`config`] - TOML-based configuration with XDG paths and env overrides
//! - [`error`] - Configuration error types using thiserror
//! - [`types`] - Shared domain types ([`JobKind`])
//!
//! # Example
//!
//! ```rust
//! use finca_core::{AppConfig, JobKind};
//!
//! let config = AppConfig::default();
//! assert_eq!(config.api.country, "es");
//! assert_eq!(JobKind::DailyNewListings.as_str(), "daily_new_listings");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{ApiConfig, AppConfig, ArchiveConfig, DatabaseConfig, JobConfig};
pub use error::{ConfigError, ConfigResult};
pub use types::JobKind;
