//! eBay search results, one search per keyword query.

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

static ITEM: Lazy<Selector> = Lazy::new(|| Selector::parse("li.s-item").unwrap());
static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a.s-item__link").unwrap());
static PRICE: Lazy<Selector> = Lazy::new(|| Selector::parse(".s-item__price").unwrap());

pub struct Ebay {
    http: HttpClient,
    config: SourceConfig,
    title_filter: KeywordPolicy,
}

impl Ebay {
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
impl SourceAdapter for Ebay {
    fn tag(&self) -> SourceTag {
        SourceTag::Ebay
    }

    fn gate(&self) -> Gate {
        self.config.gate
    }

    #[instrument(level = "info", skip_all, fields(source = "eBay"))]
    async fn fetch(&self, policy: &KeywordPolicy) -> Result<Vec<Record>, SourceError> {
        let urls = expand_search_urls(&self.config.urls, &policy.search_terms(), "+");
        fetch_pages(&self.http, SourceTag::Ebay, urls, self.config.timeout(), |page, body| {
            Ok(parse_results(page, body, &self.title_filter))
        })
        .await
    }
}

pub(crate) fn parse_results(page_url: &str, html: &str, title_filter: &KeywordPolicy) -> Vec<Record> {
    let document = Html::parse_document(html);
    let mut records = Vec::new();

    for item in document.select(&ITEM) {
        let Some(a) = item.select(&LINK).next() else {
            continue;
        };
        let title = clean_text(&a.text().collect::<String>());
        if title.is_empty() || !title_filter.matches(&title) {
            continue;
        }
        let Some(link) = a.value().attr("href").and_then(|h| resolve_link(page_url, h)) else {
            continue;
        };
        let price = item
            .select(&PRICE)
            .next()
            .map(|p| clean_text(&p.text().collect::<String>()));
        match Record::hashed(SourceTag::Ebay, title, price, &link) {
            Ok(record) => records.push(record),
            Err(e) => debug!(error = %e, "Skipping eBay item"),
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    const PAGE: &str = r#"
<ul>
  <li class="s-item">
    <a class="s-item__link" href="https://www.ebay.com/itm/1234567890">WANT TO BUY: dried elderberry 50kg</a>
    <span class="s-item__price">$120.00</span>
  </li>
  <li class="s-item">
    <a class="s-item__link" href="https://www.ebay.com/itm/555">Dried elderberry 1lb</a>
    <span class="s-item__price">$9.99</span>
  </li>
  <li class="s-item"><span>no link</span></li>
</ul>"#;

    #[test]
    fn test_parse_results() {
        let filter = KeywordPolicy::require_each(&["buy|cump[ăa]r"]).unwrap();
        let records = parse_results("https://www.ebay.com/sch/i.html?_nkw=dried+elderberry", PAGE, &filter);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "WANT TO BUY: dried elderberry 50kg");
        assert_eq!(records[0].price.as_deref(), Some("$120.00"));
        assert_eq!(records[0].url.as_str(), "https://www.ebay.com/itm/1234567890");
    }

    #[tokio::test]
    async fn test_fetch_joins_query_words_with_plus() {
        let mut server = Server::new_async().await;
        let mut mocks = Vec::new();
        for term in ["dried elderberry", "macese"] {
            mocks.push(
                server
                    .mock("GET", "/sch/i.html")
                    .match_query(Matcher::UrlEncoded("_nkw".into(), term.into()))
                    .with_status(200)
                    .with_body(PAGE)
                    .expect(1)
                    .create_async()
                    .await,
            );
        }

        let config = SourceConfig {
            enabled: true,
            timeout_secs: 5,
            urls: vec![format!("{}/sch/i.html?_nkw={{kw}}", server.url())],
            base_url: None,
            title_filter: vec!["buy|cump[ăa]r".to_string()],
            gate: Gate::Adapter,
        };
        let adapter = Ebay::new(HttpClient::new("WildBerryBot/1.0").unwrap(), config).unwrap();
        let policy = KeywordPolicy::any(&["buy dried elderberry", "cump[ăa]r macese"]).unwrap();

        let records = adapter.fetch(&policy).await.unwrap();
        for mock in &mocks {
            mock.assert_async().await;
        }
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.title.starts_with("WANT TO BUY")));
    }
}
