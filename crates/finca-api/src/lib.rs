//! Client for the property portal's search API.
//!
//! Handles the OAuth client-credentials flow, request throttling, and
//! bounded retries, and exposes the [`PageFetcher`] trait that scan
//! coordinators consume so network access stays swappable in tests.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod auth;
pub mod client;
pub mod error;

pub use auth::TokenManager;
pub use client::{PageFetcher, PageResult, PortalClient, SearchQuery};
pub use error::{ApiError, Result};
