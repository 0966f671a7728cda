//! Google Alerts feeds.
//!
//! Alerts are delivered as Atom (older alerts as RSS). Entry links point at a
//! `google.com/url?...&url=<target>` redirect; the target is unwrapped so the
//! notification links straight to the page and the id follows the page, not
//! the tracking parameters.

use super::feed::parse_feed;
use super::{HttpClient, SourceAdapter, fetch_pages};
use crate::config::SourceConfig;
use crate::error::{ConfigError, SourceError};
use crate::keywords::{Gate, KeywordPolicy};
use crate::models::{Record, SourceTag};
use async_trait::async_trait;
use tracing::{debug, instrument};
use url::Url;

pub struct GoogleAlerts {
    http: HttpClient,
    config: SourceConfig,
    title_filter: KeywordPolicy,
}

impl GoogleAlerts {
    pub fn new(http: HttpClient, config: SourceConfig) -> Result<Self, ConfigError> {
        let title_filter = config.title_filter()?;
        Ok(Self {
            http,
            config,
            title_filter,
        })
    }
}

#[async_trait]
impl SourceAdapter for GoogleAlerts {
    fn tag(&self) -> SourceTag {
        SourceTag::Google
    }

    fn gate(&self) -> Gate {
        self.config.gate
    }

    #[instrument(level = "info", skip_all, fields(source = "Google"))]
    async fn fetch(&self, _policy: &KeywordPolicy) -> Result<Vec<Record>, SourceError> {
        fetch_pages(
            &self.http,
            SourceTag::Google,
            self.config.urls.clone(),
            self.config.timeout(),
            |feed_url, body| parse_alerts(feed_url, body, &self.title_filter),
        )
        .await
    }
}

pub(crate) fn parse_alerts(
    feed_url: &str,
    xml: &str,
    title_filter: &KeywordPolicy,
) -> Result<Vec<Record>, SourceError> {
    let items = parse_feed(xml).map_err(|reason| SourceError::Feed {
        url: feed_url.to_string(),
        reason,
    })?;

    Ok(items
        .into_iter()
        .filter(|item| title_filter.matches(&item.title))
        .filter_map(|item| {
            let link = unwrap_redirect(item.link.as_deref()?);
            Record::hashed(SourceTag::Google, item.title, None, &link)
                .map_err(|e| debug!(error = %e, "Skipping Google alert"))
                .ok()
        })
        .collect())
}

/// `https://www.google.com/url?rct=j&url=https://x/y&ct=ga` → `https://x/y`.
/// Anything else is returned unchanged.
fn unwrap_redirect(link: &str) -> String {
    Url::parse(link)
        .ok()
        .filter(|u| u.host_str().is_some_and(|h| h.ends_with("google.com")) && u.path() == "/url")
        .and_then(|u| {
            u.query_pairs()
                .find(|(k, _)| k == "url" || k == "q")
                .map(|(_, v)| v.into_owned())
        })
        .unwrap_or_else(|| link.to_string())
}
