//! Credential persistence for the login session.
//!
//! Stores the extracted token and the fetched profile together in
//! `~/.papergate/credentials.json` with restricted permissions (0600).
//! Both values are written only after a fully successful login and are
//! always cleared together on logout; at startup they restore the session
//! without re-authenticating.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::github::UserProfile;

const CREDENTIALS_FILE: &str = "credentials.json";

/// Persisted session state: the token and the profile fetched with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredentials {
    pub token: String,
    pub user: UserProfile,
    pub saved_at: DateTime<Utc>,
}

/// File-backed credential store, the CLI analog of the site's local storage.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store under `~/.papergate/`.
    pub fn open_default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(home.join(".papergate").join(CREDENTIALS_FILE))
    }

    /// Loads the stored session, or `None` when nothing is persisted.
    pub fn load(&self) -> Result<Option<StoredCredentials>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read credentials from {}", self.path.display()))?;
        let creds = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse credentials from {}", self.path.display()))?;
        Ok(Some(creds))
    }

    /// Persists token and profile together with restricted permissions (0600).
    pub fn save(&self, token: &str, user: &UserProfile) -> Result<()> {
        let creds = StoredCredentials {
            token: token.to_string(),
            user: user.clone(),
            saved_at: Utc::now(),
        };
        let contents =
            serde_json::to_string_pretty(&creds).context("Failed to serialize credentials")?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&self.path)
                .with_context(|| format!("Failed to open {} for writing", self.path.display()))?;
            file.write_all(contents.as_bytes())
                .with_context(|| format!("Failed to write to {}", self.path.display()))?;
        }

        #[cfg(not(unix))]
        {
            fs::write(&self.path, contents)
                .with_context(|| format!("Failed to write to {}", self.path.display()))?;
        }

        Ok(())
    }

    /// Removes the stored session. Returns whether one was present.
    pub fn clear(&self) -> Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.path)
            .with_context(|| format!("Failed to remove {}", self.path.display()))?;
        Ok(true)
    }
}

/// Masked form of a token for display (first 12 chars followed by ...).
pub fn mask_token(token: &str) -> String {
    if token.len() <= 16 {
        return "***".to_string();
    }
    format!("{}...", &token[..12])
}
