//! Alibaba product search, one search per keyword query.
//!
//! Result cards link with protocol-relative URLs (`//www.alibaba.com/...`),
//! which are resolved against the search page.

use super::{HttpClient, SourceAdapter, expand_search_urls, fetch_pages, resolve_link};
use crate::config::SourceConfig;
use crate::error::{ConfigError, SourceError};
use crate::keywords::{Gate, KeywordPolicy};
use crate::models::{Record, SourceTag};
use crate::utils::clean_text;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{debug, instrument};

static CARD: Lazy<Selector> = Lazy::new(|| Selector::parse("div.J-offer-list-row").unwrap());
static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a.PortalCard__img-link").unwrap());
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("h2").unwrap());

pub struct Alibaba {
    http: HttpClient,
    config: SourceConfig,
    title_filter: KeywordPolicy,
}

impl Alibaba {
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
impl SourceAdapter for Alibaba {
    fn tag(&self) -> SourceTag {
        SourceTag::Alibaba
    }

    fn gate(&self) -> Gate {
        self.config.gate
    }

    #[instrument(level = "info", skip_all, fields(source = "Alibaba"))]
    async fn fetch(&self, policy: &KeywordPolicy) -> Result<Vec<Record>, SourceError> {
        let urls = expand_search_urls(&self.config.urls, &policy.search_terms(), "+");
        fetch_pages(&self.http, SourceTag::Alibaba, urls, self.config.timeout(), |page, body| {
            Ok(parse_offers(page, body, &self.title_filter))
        })
        .await
    }
}

pub(crate) fn parse_offers(page_url: &str, html: &str, title_filter: &KeywordPolicy) -> Vec<Record> {
    let document = Html::parse_document(html);
    let mut records = Vec::new();

    for card in document.select(&CARD) {
        let Some(href) = card
            .select(&LINK)
            .next()
            .and_then(|a| a.value().attr("href"))
        else {
            continue;
        };
        let Some(title) = card
            .select(&TITLE)
            .next()
            .map(|h| clean_text(&h.text().collect::<String>()))
        else {
            continue;
        };
        if !title_filter.matches(&title) {
            continue;
        }
        let Some(link) = resolve_link(page_url, href) else {
            continue;
        };
        match Record::hashed(SourceTag::Alibaba, title, None, &link) {
            Ok(record) => records.push(record),
            Err(e) => debug!(error = %e, "Skipping Alibaba offer"),
        }
    }
    records
}
