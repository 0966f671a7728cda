//! Agrobiznis.ro classified-ad listing.
//!
//! The listing renders one `<article>` per ad with the ad title in its `h2`.
//! Only articles whose heading passes the title filter become records.

use super::{HttpClient, SourceAdapter, fetch_pages, resolve_link};
use crate::config::SourceConfig;
use crate::error::{ConfigError, SourceError};
use crate::keywords::{Gate, KeywordPolicy};
use crate::models::{Record, SourceTag};
use crate::utils::clean_text;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{debug, instrument};

static ARTICLE: Lazy<Selector> = Lazy::new(|| Selector::parse("article").unwrap());
static HEADING: Lazy<Selector> = Lazy::new(|| Selector::parse("h2").unwrap());
static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

pub struct Agrobiznis {
    http: HttpClient,
    config: SourceConfig,
    title_filter: KeywordPolicy,
}

impl Agrobiznis {
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
impl SourceAdapter for Agrobiznis {
    fn tag(&self) -> SourceTag {
        SourceTag::Agrobiznis
    }

    fn gate(&self) -> Gate {
        self.config.gate
    }

    #[instrument(level = "info", skip_all, fields(source = "Agrobiznis"))]
    async fn fetch(&self, _policy: &KeywordPolicy) -> Result<Vec<Record>, SourceError> {
        fetch_pages(
            &self.http,
            SourceTag::Agrobiznis,
            self.config.urls.clone(),
            self.config.timeout(),
            |page, body| Ok(parse_articles(page, body, &self.title_filter)),
        )
        .await
    }
}

pub(crate) fn parse_articles(page_url: &str, html: &str, title_filter: &KeywordPolicy) -> Vec<Record> {
    let document = Html::parse_document(html);
    let mut records = Vec::new();

    for article in document.select(&ARTICLE) {
        let Some(title) = article
            .select(&HEADING)
            .next()
            .map(|h| clean_text(&h.text().collect::<String>()))
        else {
            continue;
        };
        if !title_filter.matches(&title) {
            continue;
        }
        let Some(link) = article
            .select(&LINK)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| resolve_link(page_url, href))
        else {
            debug!(%title, "Agrobiznis article without link");
            continue;
        };
        match Record::hashed(SourceTag::Agrobiznis, title, None, &link) {
            Ok(record) => records.push(record),
            Err(e) => debug!(error = %e, "Skipping Agrobiznis article"),
        }
    }
    records
}
