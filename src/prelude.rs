//! Convenience re-exports for common use.

pub use crate::auth::{
    AuthError, CredentialStore, FileKeyValueStore, Identity, KeyValueStore, MemoryKeyValueStore,
    SessionSignal, TeardownReason,
};
pub use crate::client::{ApiClient, ApiRequest, ApiResponse, LoginOutcome, RefreshState};
pub use crate::config::ClientConfig;
pub use crate::error::{ClientError, Result};
