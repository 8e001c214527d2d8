//! OpenSSH `authorized_keys` files

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use russh_keys::key::PublicKey;

/// Fingerprints of the keys allowed to authenticate
#[derive(Debug, Default)]
pub struct AuthorizedKeys {
    fingerprints: HashSet<String>,
}

impl AuthorizedKeys {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge every listed file into one store
    ///
    /// A leading `~` is expanded to the home directory. Files that do not
    /// exist are skipped with a warning so a server can start before keys
    /// are provisioned.
    pub fn load_from_files(paths: &[impl AsRef<Path>]) -> Result<Self> {
        let mut store = Self::new();

        for path in paths.iter().map(|p| expand_home(p.as_ref())) {
            if path.exists() {
                store.load_from_file(&path)?;
            } else {
                tracing::warn!("Authorized keys file not found: {:?}", path);
            }
        }

        Ok(store)
    }

    /// Add the keys listed in one file
    pub fn load_from_file(&mut self, path: &Path) -> Result<()> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read authorized keys {:?}", path))?;

        let before = self.len();
        for (idx, entry) in text.lines().map(str::trim).enumerate() {
            if entry.is_empty() || entry.starts_with('#') {
                continue;
            }

            match parse_entry(entry) {
                Some(key) => self.add_key(&key, comment_of(entry)),
                None => tracing::warn!("Skipping unparseable key at {:?}:{}", path, idx + 1),
            }
        }

        tracing::info!("Loaded {} authorized keys from {:?}", self.len() - before, path);
        Ok(())
    }

    /// Whether `fingerprint` belongs to an authorized key
    pub fn is_authorized(&self, fingerprint: &str) -> bool {
        self.fingerprints.contains(fingerprint)
    }

    /// Authorize `key`
    pub fn add_key(&mut self, key: &PublicKey, comment: Option<&str>) {
        let fingerprint = key.fingerprint();
        tracing::debug!("Authorized key {} ({})", fingerprint, comment.unwrap_or("-"));
        self.fingerprints.insert(fingerprint);
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

/// Parse `[options] type base64 [comment]`; options may precede the key
fn parse_entry(entry: &str) -> Option<PublicKey> {
    entry
        .split_whitespace()
        .find_map(|field| russh_keys::parse_public_key_base64(field).ok())
}

/// Text after the base64 field, if any
fn comment_of(entry: &str) -> Option<&str> {
    let mut fields = entry.splitn(3, char::is_whitespace);
    fields.next()?;
    fields.next()?;
    fields.next().map(str::trim).filter(|c| !c.is_empty())
}
