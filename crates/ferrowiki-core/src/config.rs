use crate::auth::{AuthGate, BCRYPT_COST};
use crate::error::WikiError;
use crate::vfs::FileSystem;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Top-level configuration, persisted as a JSON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WikiConfig {
    /// Content root holding the page files.
    #[serde(default = "default_content_dir")]
    pub content_dir: PathBuf,
    /// Credential table: lowercase username -> bcrypt digest. Plaintext
    /// entries are migrated on load.
    #[serde(default)]
    pub users: BTreeMap<String, String>,
    /// Whether the search form defaults to case-insensitive matching.
    #[serde(default = "default_true")]
    pub default_search_ignore_case: bool,
    #[serde(default)]
    pub debug: bool,
}

fn default_content_dir() -> PathBuf {
    PathBuf::from("content")
}

fn default_true() -> bool {
    true
}

impl Default for WikiConfig {
    fn default() -> Self {
        Self {
            content_dir: default_content_dir(),
            users: BTreeMap::new(),
            default_search_ignore_case: true,
            debug: false,
        }
    }
}

impl WikiConfig {
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load the config, run the credential migration and, if it changed
    /// anything, rewrite the document before it serves any request.
    pub fn load(path: &Path, fs: &dyn FileSystem) -> Result<Self, WikiError> {
        let raw = fs.read_to_string(path)?;
        let mut config = Self::from_json(&raw)?;
        if config.migrate_credentials() {
            info!("credential migration updated the user table, rewriting {:?}", path);
            fs.write(path, &config.to_json()?)?;
        }
        Ok(config)
    }

    /// Lenient boot: a missing or malformed config is logged and degrades to
    /// defaults instead of aborting startup.
    pub fn load_or_default(path: &Path, fs: &dyn FileSystem) -> Self {
        match Self::load(path, fs) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "failed to load config {:?}: {}; starting with defaults",
                    path, e
                );
                Self::default()
            }
        }
    }

    /// Normalize stored credentials: bcrypt-hash any plaintext password in
    /// place and fold any mixed-case username to its lowercase key. Returns
    /// whether anything changed; running it twice is a no-op.
    pub fn migrate_credentials(&mut self) -> bool {
        let mut changed = false;
        let mut migrated = BTreeMap::new();

        for (user, password) in std::mem::take(&mut self.users) {
            let lower = user.to_lowercase();
            if lower != user {
                changed = true;
            }

            // A bcrypt digest always carries the `$2…$` version prefix.
            let credential = if password.starts_with("$2") {
                password
            } else {
                match bcrypt::hash(&password, BCRYPT_COST) {
                    Ok(digest) => {
                        changed = true;
                        digest
                    }
                    Err(e) => {
                        warn!("could not hash password for user {}: {}", lower, e);
                        password
                    }
                }
            };

            migrated.insert(lower, credential);
        }

        self.users = migrated;
        changed
    }

    /// Auth gate over this config's user table.
    pub fn auth_gate(&self) -> AuthGate {
        AuthGate::new(self.users.clone().into_iter().collect())
    }
}
