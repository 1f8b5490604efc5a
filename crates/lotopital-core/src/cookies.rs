//! Session cookie storage and retrieval.
//!
//! The API keeps the admin session in HTTP-only cookies. A browser holds them
//! for us; a CLI has to carry them between runs, so they are stored in
//! `<base>/cookies.json` with restricted permissions (0600), keyed by API base
//! URL. Each cookie keeps its domain, path and expiry, so a rotated cookie
//! replaces the stored one instead of being sent next to it. Cookie values are
//! never logged or displayed.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::PoisonError;

use anyhow::{Context, Result};
use cookie_store::{Cookie, CookieStore};
use reqwest_cookie_store::CookieStoreMutex;
use serde::{Deserialize, Serialize};

use crate::config::paths;

/// A cookie as the server set it, with its domain, path and expiry.
pub type StoredCookie = Cookie<'static>;

/// Cookie cache structure.
/// Maps API base URLs to the cookies the jar held for them.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CookieCache {
    #[serde(flatten)]
    pub sites: BTreeMap<String, Vec<StoredCookie>>,
}

impl CookieCache {
    /// Returns the path to the cookie cache file.
    pub fn cache_path() -> PathBuf {
        paths::cookies_path()
    }

    /// Loads the cookie cache from the default path.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::cache_path())
    }

    /// Loads the cookie cache from `path`.
    /// Returns an empty cache if the file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read cookie cache from {}", path.display()))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cookie cache from {}", path.display()))
    }

    /// Saves the cookie cache to the default path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::cache_path())
    }

    /// Saves the cookie cache to `path` with restricted permissions (0600).
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let contents =
            serde_json::to_string_pretty(self).context("Failed to serialize cookie cache")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(path)
                .with_context(|| format!("Failed to open {} for writing", path.display()))?;
            file.write_all(contents.as_bytes())
                .with_context(|| format!("Failed to write to {}", path.display()))?;
        }

        #[cfg(not(unix))]
        {
            fs::write(path, contents)
                .with_context(|| format!("Failed to write to {}", path.display()))?;
        }

        Ok(())
    }

    /// Gets the cookies stored for an API base URL.
    pub fn get(&self, site: &str) -> &[StoredCookie] {
        self.sites.get(site).map(Vec::as_slice).unwrap_or_default()
    }

    /// Replaces the cookies for an API base URL. An empty list removes the entry.
    pub fn set(&mut self, site: &str, cookies: Vec<StoredCookie>) {
        if cookies.is_empty() {
            self.sites.remove(site);
        } else {
            self.sites.insert(site.to_string(), cookies);
        }
    }

    /// Removes the cookies for an API base URL.
    pub fn remove(&mut self, site: &str) -> Option<Vec<StoredCookie>> {
        self.sites.remove(site)
    }
}

/// Copies the unexpired cookies out of `store`.
pub fn snapshot(store: &CookieStoreMutex) -> Vec<StoredCookie> {
    let store = store.lock().unwrap_or_else(PoisonError::into_inner);
    store.iter_unexpired().cloned().collect()
}

/// Replaces the contents of `store` with `cookies`, dropping any that have
/// expired since they were saved.
pub fn restore(store: &CookieStoreMutex, cookies: &[StoredCookie]) {
    let restored =
        CookieStore::from_cookies(cookies.iter().cloned().map(Ok::<_, Infallible>), false)
            .unwrap_or_else(|never| match never {});
    *store.lock().unwrap_or_else(PoisonError::into_inner) = restored;
}
