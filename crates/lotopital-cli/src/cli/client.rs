//! Per-run API client: coordinator, content API and persisted cookies.

use anyhow::{Context, Result};
use lotopital_core::api::ContentApi;
use lotopital_core::config::Config;
use lotopital_core::cookies::CookieCache;
use lotopital_core::session::{SessionCoordinator, SessionOptions};
use tracing::debug;

pub struct AdminClient {
    api_url: String,
    session: SessionCoordinator,
    content: ContentApi,
    keep_cookies: bool,
}

impl AdminClient {
    /// Builds the coordinator for the resolved API URL and loads the cookies
    /// saved by earlier runs.
    pub fn open(config: &Config, api_url_flag: Option<&str>) -> Result<Self> {
        let api_url = config.resolve_api_url(api_url_flag)?;
        let session = SessionCoordinator::new(SessionOptions::from_config(config, api_url.as_str()))
            .context("create session")?;

        let cache = CookieCache::load().context("load stored cookies")?;
        let stored = cache.get(&api_url);
        debug!(
            api_url = %api_url,
            retry_auth = config.retry_auth.display_name(),
            cookies = stored.len(),
            "restoring session cookies"
        );
        session.import_cookies(stored);

        Ok(Self {
            api_url,
            content: ContentApi::new(session.clone()),
            session,
            keep_cookies: true,
        })
    }

    pub fn session(&self) -> &SessionCoordinator {
        &self.session
    }

    pub fn content(&self) -> &ContentApi {
        &self.content
    }

    /// Drops the stored cookies for this API when the run ends.
    pub fn forget_cookies(&mut self) {
        self.keep_cookies = false;
    }

    /// Writes the jar back to disk (or removes this API's entry after logout).
    pub fn finish(self) -> Result<()> {
        let mut cache = CookieCache::load().context("load stored cookies")?;
        if self.keep_cookies {
            cache.set(&self.api_url, self.session.export_cookies());
        } else {
            cache.remove(&self.api_url);
        }
        cache.save().context("save session cookies")
    }
}
