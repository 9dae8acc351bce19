//! Credential persistence, the authentication service, and session teardown.

pub mod credentials;
pub mod error;
pub mod identity;
pub mod service;
pub mod store;
pub mod teardown;
pub mod token;

pub use credentials::CredentialStore;
pub use error::AuthError;
pub use identity::{Identity, UserRole};
pub use service::{AuthEndpoint, HttpAuthEndpoint, LoginResponse};
pub use store::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
pub use teardown::{NoopSessionSignal, SessionSignal, SessionTeardown, TeardownReason};
pub use token::{Credential, RenewedCredential};
