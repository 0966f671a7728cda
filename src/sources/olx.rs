//! OLX classifieds search (Romania, Poland, Hungary).
//!
//! Each configured regional search template is expanded with every keyword
//! query (`https://www.olx.ro/oferte/q-{kw}/` → `.../q-aronia-uscată/`), so one
//! poll issues `regions × queries` requests. Listing cards carry a link, an
//! `h6` title and an optional price paragraph.

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

static CARD: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div[data-testid='offer-card'], div[data-testid='l-card']").unwrap());
static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("h6, h4").unwrap());
static PRICE: Lazy<Selector> = Lazy::new(|| Selector::parse("p[data-testid='ad-price']").unwrap());

pub struct Olx {
    http: HttpClient,
    config: SourceConfig,
    title_filter: KeywordPolicy,
}

impl Olx {
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
impl SourceAdapter for Olx {
    fn tag(&self) -> SourceTag {
        SourceTag::Olx
    }

    fn gate(&self) -> Gate {
        self.config.gate
    }

    #[instrument(level = "info", skip_all, fields(source = "OLX"))]
    async fn fetch(&self, policy: &KeywordPolicy) -> Result<Vec<Record>, SourceError> {
        let urls = expand_search_urls(&self.config.urls, &policy.search_terms(), "-");
        debug!(count = urls.len(), "OLX search URLs");
        fetch_pages(&self.http, SourceTag::Olx, urls, self.config.timeout(), |page, body| {
            Ok(parse_listings(page, body, &self.title_filter))
        })
        .await
    }
}

/// Extract listing cards from an OLX search page.
pub(crate) fn parse_listings(page_url: &str, html: &str, title_filter: &KeywordPolicy) -> Vec<Record> {
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
            .filter(|t| !t.is_empty())
        else {
            continue;
        };
        if !title_filter.matches(&title) {
            continue;
        }
        let price = card
            .select(&PRICE)
            .next()
            .map(|p| clean_text(&p.text().collect::<String>()));

        let Some(link) = resolve_link(page_url, href) else {
            debug!(%href, "Unresolvable OLX link");
            continue;
        };
        match Record::hashed(SourceTag::Olx, title, price, &link) {
            Ok(record) => records.push(record),
            Err(e) => debug!(error = %e, "Skipping OLX card"),
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    const PAGE: &str = r#"
<html><body>
  <div data-testid="offer-card">
    <a href="/d/oferta/cumpar-macese-uscate-IDj1k2.html#gallery"><img/></a>
    <h6>Cumpăr macese
        uscate</h6>
    <p data-testid="ad-price">12 lei</p>
  </div>
  <div data-testid="offer-card">
    <a href="https://www.olx.ro/d/oferta/vand-aronia-IDx9.html">x</a>
    <h6>Vând aronia</h6>
  </div>
  <div data-testid="offer-card">
    <h6>Card without link</h6>
  </div>
</body></html>"#;

    #[test]
    fn test_parse_listings() {
        let any = KeywordPolicy::all_of(vec![]);
        let records = parse_listings("https://www.olx.ro/oferte/q-macese/", PAGE, &any);
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.title, "Cumpăr macese uscate");
        assert_eq!(first.price.as_deref(), Some("12 lei"));
        assert_eq!(
            first.url.as_str(),
            "https://www.olx.ro/d/oferta/cumpar-macese-uscate-IDj1k2.html"
        );
        assert_eq!(records[1].price, None);
    }

    #[test]
    fn test_ids_are_stable_across_polls() {
        let any = KeywordPolicy::all_of(vec![]);
        let a = parse_listings("https://www.olx.ro/oferte/q-macese/", PAGE, &any);
        let b = parse_listings("https://www.olx.ro/oferte/q-aronia/", PAGE, &any);
        assert_eq!(a[0].id, b[0].id);
        assert_ne!(a[0].id, a[1].id);
    }

    #[test]
    fn test_title_filter_applies() {
        let filter = KeywordPolicy::require_each(&["cump[ăa]r"]).unwrap();
        let records = parse_listings("https://www.olx.ro/", PAGE, &filter);
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_searches_every_region_and_term() {
        let mut server = Server::new_async().await;
        let mut mocks = Vec::new();
        for path in ["/ro/q-macese/", "/ro/q-dried-rosehip/", "/pl/q-macese/", "/pl/q-dried-rosehip/"] {
            mocks.push(
                server
                    .mock("GET", path)
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
            urls: vec![
                format!("{}/ro/q-{{kw}}/", server.url()),
                format!("{}/pl/q-{{kw}}/", server.url()),
            ],
            base_url: None,
            title_filter: vec![],
            gate: Gate::Policy,
        };
        let adapter = Olx::new(HttpClient::new("WildBerryBot/1.0").unwrap(), config).unwrap();
        let policy = KeywordPolicy::any(&["cump[ăa]r macese", "buy dried rosehip"]).unwrap();

        let records = adapter.fetch(&policy).await.unwrap();
        for mock in &mocks {
            mock.assert_async().await;
        }
        // Two linked cards on each of the four pages.
        assert_eq!(records.len(), 8);
        assert_eq!(adapter.gate(), Gate::Policy);
    }
}
