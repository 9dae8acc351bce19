use std::sync::{Arc, Mutex, MutexGuard};

use super::error::AuthError;
use super::identity::Identity;
use super::store::KeyValueStore;
use super::token::Credential;

pub const ACCESS_KEY: &str = "access";
pub const REFRESH_KEY: &str = "refresh";
pub const USER_KEY: &str = "user";
pub const ACTIVE_ROLE_KEY: &str = "activeRole";

/// Every key owned by a session. Cleared together on teardown.
pub const SESSION_KEYS: [&str; 4] = [ACCESS_KEY, REFRESH_KEY, USER_KEY, ACTIVE_ROLE_KEY];

/// Shortest access credential accepted when restoring a persisted session.
const MIN_RESTORED_ACCESS_LEN: usize = 10;

/// Typed view over the persisted session keys.
///
/// Writes go straight through to the backing [`KeyValueStore`]; nothing is
/// cached here, so a read always sees the latest renewal.
///
/// Every login and every clear starts a new session epoch. A renewal commits
/// only into the epoch it started in, and credential writes and clears are
/// serialized under the epoch lock.
#[derive(Clone)]
pub struct CredentialStore {
    kv: Arc<dyn KeyValueStore>,
    epoch: Arc<Mutex<u64>>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore").field("kv", &"..").finish()
    }
}

impl CredentialStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            epoch: Arc::new(Mutex::new(0)),
        }
    }

    fn lock_epoch(&self) -> Result<MutexGuard<'_, u64>, AuthError> {
        self.epoch
            .lock()
            .map_err(|_| AuthError::Io("session epoch lock poisoned".to_string()))
    }

    /// Identifies the current session. Changes on every login and clear.
    pub fn session_epoch(&self) -> Result<u64, AuthError> {
        Ok(*self.lock_epoch()?)
    }

    /// Current credential pair; `None` unless both halves are present.
    pub fn credential(&self) -> Result<Option<Credential>, AuthError> {
        let access = self.kv.get(ACCESS_KEY)?;
        let refresh = self.kv.get(REFRESH_KEY)?;
        Ok(match (access, refresh) {
            (Some(access), Some(refresh)) => Some(Credential { access, refresh }),
            _ => None,
        })
    }

    pub fn access(&self) -> Result<Option<String>, AuthError> {
        Ok(self.kv.get(ACCESS_KEY)?.filter(|v| !v.is_empty()))
    }

    pub fn refresh(&self) -> Result<Option<String>, AuthError> {
        Ok(self.kv.get(REFRESH_KEY)?.filter(|v| !v.is_empty()))
    }

    /// Store a freshly issued credential pair. Starts a new session epoch.
    pub fn set_credential(&self, credential: &Credential) -> Result<(), AuthError> {
        let mut epoch = self.lock_epoch()?;
        self.kv.set_many(&[
            (ACCESS_KEY, credential.access.as_str()),
            (REFRESH_KEY, credential.refresh.as_str()),
        ])?;
        *epoch = epoch.wrapping_add(1);
        Ok(())
    }

    /// Store a renewed access credential, replacing the refresh credential too
    /// when the service rotated it.
    ///
    /// Returns `false` without writing when the session epoch has moved past
    /// `expected_epoch`, i.e. the session the renewal belonged to is gone.
    pub fn commit_renewal(
        &self,
        expected_epoch: u64,
        access: &str,
        rotated_refresh: Option<&str>,
    ) -> Result<bool, AuthError> {
        let epoch = self.lock_epoch()?;
        if *epoch != expected_epoch {
            return Ok(false);
        }
        match rotated_refresh {
            Some(refresh) => self
                .kv
                .set_many(&[(ACCESS_KEY, access), (REFRESH_KEY, refresh)])?,
            None => self.kv.set(ACCESS_KEY, access)?,
        }
        Ok(true)
    }

    pub fn clear_credential(&self) -> Result<(), AuthError> {
        let mut epoch = self.lock_epoch()?;
        self.kv.remove_many(&[ACCESS_KEY, REFRESH_KEY])?;
        *epoch = epoch.wrapping_add(1);
        Ok(())
    }

    pub fn identity(&self) -> Result<Option<Identity>, AuthError> {
        match self.kv.get(USER_KEY)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn set_identity(&self, identity: &Identity) -> Result<(), AuthError> {
        let raw = serde_json::to_string(identity)?;
        self.kv.set(USER_KEY, &raw)
    }

    pub fn clear_identity(&self) -> Result<(), AuthError> {
        self.kv.remove_many(&[USER_KEY, ACTIVE_ROLE_KEY])
    }

    pub fn active_role(&self) -> Result<Option<String>, AuthError> {
        Ok(self.kv.get(ACTIVE_ROLE_KEY)?.filter(|v| !v.is_empty()))
    }

    pub fn set_active_role(&self, role: &str) -> Result<(), AuthError> {
        self.kv.set(ACTIVE_ROLE_KEY, role)
    }

    pub fn clear_active_role(&self) -> Result<(), AuthError> {
        self.kv.remove(ACTIVE_ROLE_KEY)
    }

    /// Whether any session key is persisted.
    pub fn has_session_state(&self) -> Result<bool, AuthError> {
        for key in SESSION_KEYS {
            if self.kv.get(key)?.is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn clear_all(&self) -> Result<(), AuthError> {
        self.clear_session(None).map(|_| ())
    }

    /// Remove every session key and start a new epoch.
    ///
    /// With `Some(epoch)`, clears only if that session is still the current
    /// one and returns whether it did.
    pub fn clear_session(&self, expected_epoch: Option<u64>) -> Result<bool, AuthError> {
        let mut epoch = self.lock_epoch()?;
        if expected_epoch.is_some_and(|expected| expected != *epoch) {
            return Ok(false);
        }
        self.kv.remove_many(&SESSION_KEYS)?;
        *epoch = epoch.wrapping_add(1);
        Ok(true)
    }

    /// Validate a persisted session.
    ///
    /// A session is usable only when identity, access and refresh are all
    /// present, the identity parses, and the access credential is longer than
    /// a trivial placeholder. Anything else wipes every session key.
    pub fn restore(&self) -> Result<Option<Identity>, AuthError> {
        let raw_user = self.kv.get(USER_KEY)?;
        let access = self.kv.get(ACCESS_KEY)?;
        let refresh = self.kv.get(REFRESH_KEY)?;

        let (Some(raw_user), Some(access), Some(refresh)) = (raw_user, access, refresh) else {
            if self.has_session_state()? {
                tracing::debug!("incomplete persisted session, clearing");
                self.clear_all()?;
            }
            return Ok(None);
        };

        let identity = match serde_json::from_str::<Identity>(&raw_user) {
            Ok(identity) => identity,
            Err(e) => {
                tracing::warn!(error = %e, "persisted identity is unreadable, clearing session");
                self.clear_all()?;
                return Ok(None);
            }
        };

        if access.len() <= MIN_RESTORED_ACCESS_LEN || refresh.is_empty() {
            tracing::warn!(user_id = identity.id, "persisted credential failed sanity check, clearing session");
            self.clear_all()?;
            return Ok(None);
        }

        Ok(Some(identity))
    }
}
