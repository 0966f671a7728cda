//! Public Facebook group pages (mobile site).
//!
//! Group markup is unstable, so instead of relying on post containers this
//! adapter searches every text node for the configured buyer phrase and uses
//! the nearest enclosing link as the post URL.

use super::{HttpClient, SourceAdapter, fetch_pages, resolve_link};
use crate::config::SourceConfig;
use crate::error::{ConfigError, SourceError};
use crate::keywords::{Gate, KeywordPolicy};
use crate::models::{Record, SourceTag};
use crate::utils::{clean_text, truncate_chars};
use async_trait::async_trait;
use itertools::Itertools;
use scraper::{ElementRef, Html, Node};
use tracing::{debug, instrument};

/// Post snippets longer than this are cut for the notification title.
const TITLE_MAX_CHARS: usize = 120;

pub struct FacebookGroups {
    http: HttpClient,
    config: SourceConfig,
    text_filter: KeywordPolicy,
}

impl FacebookGroups {
    pub fn new(http: HttpClient, config: SourceConfig) -> Result<Self, ConfigError> {
        let text_filter = config.title_filter()?;
        Ok(Self {
            http,
            config,
            text_filter,
        })
    }
}

#[async_trait]
impl SourceAdapter for FacebookGroups {
    fn tag(&self) -> SourceTag {
        SourceTag::Facebook
    }

    fn gate(&self) -> Gate {
        self.config.gate
    }

    #[instrument(level = "info", skip_all, fields(source = "Facebook"))]
    async fn fetch(&self, _policy: &KeywordPolicy) -> Result<Vec<Record>, SourceError> {
        let base = self.config.base_url.clone();
        fetch_pages(
            &self.http,
            SourceTag::Facebook,
            self.config.urls.clone(),
            self.config.timeout(),
            |page, body| Ok(parse_posts(base.as_deref().unwrap_or(page), body, &self.text_filter)),
        )
        .await
    }
}

/// Find text nodes matching `text_filter` that sit inside a link.
pub(crate) fn parse_posts(base_url: &str, html: &str, text_filter: &KeywordPolicy) -> Vec<Record> {
    let document = Html::parse_document(html);
    let mut records = Vec::new();

    for node in document.tree.nodes() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let in_script = node
            .parent()
            .and_then(ElementRef::wrap)
            .is_some_and(|p| matches!(p.value().name(), "script" | "style"));
        if in_script {
            continue;
        }
        let body = clean_text(text);
        if body.is_empty() || !text_filter.matches(&body) {
            continue;
        }
        let Some(href) = node
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "a")
            .and_then(|a| a.value().attr("href"))
        else {
            continue;
        };
        let Some(link) = resolve_link(base_url, href) else {
            debug!(%href, "Unresolvable Facebook link");
            continue;
        };
        match Record::hashed(SourceTag::Facebook, truncate_chars(&body, TITLE_MAX_CHARS), None, &link) {
            Ok(record) => records.push(record),
            Err(e) => debug!(error = %e, "Skipping Facebook post"),
        }
    }

    records.into_iter().unique_by(|r| r.id.clone()).collect()
}
