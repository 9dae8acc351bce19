//! Portal client: an authenticated HTTP client for the syllabus portal API.
//!
//! Attaches the current access credential to every request and recovers from
//! its expiry transparently. When the API answers 401, exactly one renewal is
//! started no matter how many requests failed at once; every affected request
//! is replayed with the new credential in the order it failed. If renewal
//! fails, all of them are rejected and the session is torn down.
//!
//! # Quick Start
//!
//! ```no_run
//! use portal_client::prelude::*;
//!
//! # async fn example() -> portal_client::error::Result<()> {
//! let client = ApiClient::from_config(ClientConfig::from_env()?)?;
//! if client.restore_session()?.is_none() {
//!     client.login("2020-0001", "secret").await?;
//! }
//! let memos: serde_json::Value = client.get_json("/memos/").await?;
//! println!("{memos}");
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod prelude;

#[cfg(feature = "cli")]
pub mod cli;
