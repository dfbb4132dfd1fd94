//! Session resolution from the shared credential keys.

use habitsync_store::StateStore;

/// An authenticated session: the record owner and the bearer token written by
/// the auth module. The engine's poll loop treats a change of user (or of
/// credential presence) as a transition; the token alone may rotate freely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub token: String,
}

impl Session {
    /// Read the current session out of the store. `None` while signed out or
    /// while either credential key is missing.
    pub fn resolve(store: &StateStore) -> Option<Self> {
        let token = store.auth_token()?;
        let user_id = store.auth_user_id()?;
        Some(Self { user_id, token })
    }
}
