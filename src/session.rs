use anyhow::{Context, Result};
use log::warn;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::model::storage::Profile;

const SESSION_DIR: &str = "~/.config/labloan";

/// Shown on the profile screen when no email was ever persisted. Display
/// only, never used for identity matching.
pub const PLACEHOLDER_EMAIL: &str = "student@ssct.edu.ph";

const TOKEN_KEY: &str = "token";
const EMAIL_KEY: &str = "email";
const USER_KEY: &str = "user";
const BORROWER_ID_KEY: &str = "borrower_id";

/// File-backed key-value store for the signed-in identity.
///
/// One file per key under the session directory, so every write is
/// independent of the others; there is no atomicity across keys. An absent
/// token means unauthenticated no matter what else is cached.
pub struct SessionStore {
    dir: PathBuf,
}

fn read_if_found(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(&path) {
        Ok(c) => Ok(Some(c)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl SessionStore {
    pub fn open() -> Result<Self> {
        let dir = shellexpand::full(SESSION_DIR)
            .with_context(|| format!("Session directory path {} is invalid", SESSION_DIR))?;
        Ok(Self::at(Path::new(dir.as_ref())))
    }

    pub fn at(dir: impl Into<PathBuf>) -> Self {
        SessionStore { dir: dir.into() }
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    fn write_key(&self, key: &str, value: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Error ensuring path {:?} exists", self.dir))?;
        std::fs::write(self.key_path(key), value)
            .with_context(|| format!("Error writing session key {}", key))
    }

    fn read_key(&self, key: &str) -> Option<String> {
        match read_if_found(&self.key_path(key)) {
            Ok(v) => v,
            Err(e) => {
                warn!("Error reading session key {}: {}", key, e);
                None
            }
        }
    }

    /// Persist the fields of a fresh login. Writes are sequential and
    /// per-key; a failure leaves earlier keys written.
    pub fn save_session(&self, token: &str, email: Option<&str>, user: Option<&Value>) -> Result<()> {
        self.write_key(TOKEN_KEY, token.trim())?;
        if let Some(email) = email.filter(|e| !e.is_empty()) {
            self.write_key(EMAIL_KEY, email)?;
        }
        if let Some(user) = user {
            self.write_key(USER_KEY, &serde_json::to_string(user)?)?;
        }
        Ok(())
    }

    pub fn token(&self) -> Option<String> {
        self.read_key(TOKEN_KEY).filter(|t| !t.is_empty())
    }

    pub fn email(&self) -> Option<String> {
        self.read_key(EMAIL_KEY).filter(|e| !e.is_empty())
    }

    /// Email for display. Falls back to the institutional placeholder so the
    /// profile screen always has something to show.
    pub fn display_email(&self) -> String {
        self.email().unwrap_or_else(|| PLACEHOLDER_EMAIL.to_owned())
    }

    /// Cached user profile. A corrupt or missing blob degrades to `None`.
    pub fn user(&self) -> Option<Profile> {
        let raw = self.read_key(USER_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!("Discarding unreadable cached user profile: {}", e);
                None
            }
        }
    }

    pub fn borrower_id(&self) -> Option<String> {
        self.read_key(BORROWER_ID_KEY).filter(|id| !id.is_empty())
    }

    /// Remember the ID number entered on a submitted request, for receipt
    /// matching later.
    pub fn save_borrower_id(&self, id: &str) -> Result<()> {
        self.write_key(BORROWER_ID_KEY, id)
    }

    /// Logout. Only the token goes; email, user and borrower_id stay for
    /// display prefill.
    pub fn clear_token(&self) -> Result<()> {
        match std::fs::remove_file(self.key_path(TOKEN_KEY)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("Error clearing session token"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> (tempfile::TempDir, SessionStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::at(dir.path());
        (dir, store)
    }

    #[test]
    fn save_and_read_back_session() {
        let (_dir, store) = store();
        let user = json!({"id": 7, "email": "a@b.c", "name": "Alice"});
        store
            .save_session("tok-123", Some("a@b.c"), Some(&user))
            .unwrap();

        assert_eq!(store.token().as_deref(), Some("tok-123"));
        assert_eq!(store.email().as_deref(), Some("a@b.c"));
        let profile = store.user().unwrap();
        assert_eq!(profile.email.as_deref(), Some("a@b.c"));
        assert_eq!(profile.name.as_deref(), Some("Alice"));
    }

    #[test]
    fn logout_clears_token_but_keeps_email_and_user() {
        let (_dir, store) = store();
        let user = json!({"id": "2021-0042", "name": "Bob"});
        store
            .save_session("tok-xyz", Some("bob@ssct.edu.ph"), Some(&user))
            .unwrap();

        store.clear_token().unwrap();

        assert_eq!(store.token(), None);
        assert_eq!(store.email().as_deref(), Some("bob@ssct.edu.ph"));
        assert!(store.user().is_some());
    }

    #[test]
    fn clear_token_when_never_logged_in_is_fine() {
        let (_dir, store) = store();
        store.clear_token().unwrap();
        assert_eq!(store.token(), None);
    }

    #[test]
    fn corrupt_user_blob_reads_as_absent() {
        let (_dir, store) = store();
        store.write_key(USER_KEY, "{not json").unwrap();
        assert!(store.user().is_none());
    }

    #[test]
    fn display_email_falls_back_to_placeholder() {
        let (_dir, store) = store();
        assert_eq!(store.display_email(), PLACEHOLDER_EMAIL);

        store.write_key(EMAIL_KEY, "me@ssct.edu.ph").unwrap();
        assert_eq!(store.display_email(), "me@ssct.edu.ph");
    }

    #[test]
    fn borrower_id_round_trip() {
        let (_dir, store) = store();
        assert_eq!(store.borrower_id(), None);
        store.save_borrower_id("2021-0042").unwrap();
        assert_eq!(store.borrower_id().as_deref(), Some("2021-0042"));
    }

    #[test]
    fn token_is_trimmed_on_save() {
        let (_dir, store) = store();
        store.save_session("  tok-1\n", None, None).unwrap();
        assert_eq!(store.token().as_deref(), Some("tok-1"));
    }
}
