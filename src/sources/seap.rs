//! SEAP public procurement notices (e-licitatie.ro RSS).
//!
//! Feed items are kept when their title passes the configured product filter.
//! The feed GUID is the record id; items without a GUID fall back to the
//! SHA-256 of their link.

use super::feed::parse_feed;
use super::{HttpClient, SourceAdapter, fetch_pages};
use crate::config::SourceConfig;
use crate::error::{ConfigError, SourceError};
use crate::keywords::{Gate, KeywordPolicy};
use crate::models::{Record, SourceTag};
use async_trait::async_trait;
use tracing::{debug, instrument};

pub struct Seap {
    http: HttpClient,
    config: SourceConfig,
    title_filter: KeywordPolicy,
}

impl Seap {
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
impl SourceAdapter for Seap {
    fn tag(&self) -> SourceTag {
        SourceTag::Seap
    }

    fn gate(&self) -> Gate {
        self.config.gate
    }

    #[instrument(level = "info", skip_all, fields(source = "SEAP"))]
    async fn fetch(&self, _policy: &KeywordPolicy) -> Result<Vec<Record>, SourceError> {
        fetch_pages(
            &self.http,
            SourceTag::Seap,
            self.config.urls.clone(),
            self.config.timeout(),
            |feed_url, body| parse_notices(feed_url, body, &self.title_filter),
        )
        .await
    }
}

pub(crate) fn parse_notices(
    feed_url: &str,
    xml: &str,
    title_filter: &KeywordPolicy,
) -> Result<Vec<Record>, SourceError> {
    let items = parse_feed(xml).map_err(|reason| SourceError::Feed {
        url: feed_url.to_string(),
        reason,
    })?;

    let mut records = Vec::new();
    for item in items {
        if !title_filter.matches(&item.title) {
            continue;
        }
        let Some(link) = item.link else {
            debug!(title = %item.title, "SEAP item without link");
            continue;
        };
        let record = match item.guid {
            Some(guid) => Record::new(SourceTag::Seap, guid, item.title, None, &link),
            None => Record::hashed(SourceTag::Seap, item.title, None, &link),
        };
        match record {
            Ok(record) => records.push(record),
            Err(e) => debug!(error = %e, "Skipping SEAP item"),
        }
    }
    Ok(records)
}
