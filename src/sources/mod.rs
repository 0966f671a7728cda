//! Source adapters: one per polled site or feed.
//!
//! Every adapter implements [`SourceAdapter`], a single `fetch` capability that
//! performs a full, independent poll and returns normalized [`Record`]s. The
//! coordinator only ever sees that trait; markup and feed shapes stay inside
//! each module.
//!
//! # Supported Sources
//!
//! | Source | Module | Method | Identity |
//! |--------|--------|--------|----------|
//! | OLX (ro/pl/hu) | [`olx`] | search page per keyword slug | SHA-256 of listing URL |
//! | Facebook groups | [`facebook`] | group page, free-text match on posts | SHA-256 of post link |
//! | SEAP | [`seap`] | RSS feed, title filter | feed GUID |
//! | Agrobiznis | [`agrobiznis`] | article listing, heading filter | SHA-256 of article URL |
//! | Google Alerts | [`google`] | RSS/Atom feed, title filter | SHA-256 of link |
//! | eBay | [`ebay`] | search page per keyword | SHA-256 of listing URL |
//! | Alibaba | [`alibaba`] | search page per keyword | SHA-256 of listing URL |
//!
//! # Common Patterns
//!
//! - Requests go through [`HttpClient`], which sets the identification
//!   header and a per-request timeout.
//! - Adapters with several URLs fetch them concurrently with
//!   [`fetch_pages`]; a failed page is logged and skipped, and the adapter
//!   only fails when every page failed.
//! - Each adapter applies its own title pre-filter (from config) before
//!   building records.

pub mod agrobiznis;
pub mod alibaba;
pub mod ebay;
pub mod facebook;
mod feed;
pub mod google;
pub mod olx;
pub mod seap;

use crate::config::{RadarConfig, SourceConfig};
use crate::error::{ConfigError, SourceError};
use crate::keywords::{Gate, KeywordPolicy};
use crate::models::{Record, SourceTag};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// Pages fetched concurrently within one adapter.
const PAGE_CONCURRENCY: usize = 4;

/// A polled source.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn tag(&self) -> SourceTag;

    /// Whether the coordinator should run this source's records through the
    /// keyword policy.
    fn gate(&self) -> Gate {
        Gate::Policy
    }

    /// Poll the source once. `policy` is the run's keyword policy; search
    /// adapters derive their queries from it.
    async fn fetch(&self, policy: &KeywordPolicy) -> Result<Vec<Record>, SourceError>;
}

/// Result of one adapter poll after the error boundary.
#[derive(Debug)]
pub enum FetchOutcome {
    Succeeded(Vec<Record>),
    Failed(String),
}

/// Run `adapter` behind an error boundary: any error becomes
/// [`FetchOutcome::Failed`] and is logged with the source tag.
#[instrument(level = "info", skip_all, fields(source = %adapter.tag()))]
pub async fn poll(adapter: &dyn SourceAdapter, policy: &KeywordPolicy) -> FetchOutcome {
    let t0 = std::time::Instant::now();
    match adapter.fetch(policy).await {
        Ok(records) => {
            info!(
                count = records.len(),
                elapsed_ms = t0.elapsed().as_millis() as u64,
                "Source polled"
            );
            FetchOutcome::Succeeded(records)
        }
        Err(e) => {
            error!(error = %e, elapsed_ms = t0.elapsed().as_millis() as u64, "Source failed; contributing no records this run");
            FetchOutcome::Failed(e.to_string())
        }
    }
}

/// Shared HTTP client carrying the identification header.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(user_agent: &str) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self { client })
    }

    /// GET `url` and return the body, failing on timeout or non-2xx status.
    #[instrument(level = "debug", skip(self))]
    pub async fn get_text(&self, url: &str, timeout: Duration) -> Result<String, SourceError> {
        let http_err = |source| SourceError::Http {
            url: url.to_string(),
            source,
        };
        let resp = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(http_err)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = resp.text().await.map_err(http_err)?;
        debug!(bytes = body.len(), "Fetched page");
        Ok(body)
    }
}

/// Fetch `urls` concurrently and parse each body with `parse(page_url, body)`.
///
/// Failed pages are logged and skipped. Returns the last error only when
/// every page failed; no URLs means no records.
pub(crate) async fn fetch_pages<F>(
    http: &HttpClient,
    tag: SourceTag,
    urls: Vec<String>,
    timeout: Duration,
    parse: F,
) -> Result<Vec<Record>, SourceError>
where
    F: Fn(&str, &str) -> Result<Vec<Record>, SourceError> + Send + Sync,
{
    let bodies: Vec<(String, Result<String, SourceError>)> = stream::iter(urls)
        .map(|url| async move {
            let body = http.get_text(&url, timeout).await;
            (url, body)
        })
        .buffer_unordered(PAGE_CONCURRENCY)
        .collect()
        .await;

    let mut records = Vec::new();
    let mut last_err = None;
    let mut any_ok = false;
    for (url, body) in bodies {
        match body.and_then(|b| parse(&url, &b)) {
            Ok(mut page) => {
                any_ok = true;
                debug!(source = %tag, %url, count = page.len(), "Parsed page");
                records.append(&mut page);
            }
            Err(e) => {
                warn!(source = %tag, %url, error = %e, "Page failed; skipping");
                last_err = Some(e);
            }
        }
    }

    match last_err {
        Some(e) if !any_ok => Err(e),
        _ => Ok(records),
    }
}

/// Expand `{kw}` templates with every search term. Words are URL-encoded
/// and joined with `sep` (`-` for path slugs, `+` for query strings).
pub(crate) fn expand_search_urls(templates: &[String], terms: &[String], sep: &str) -> Vec<String> {
    templates
        .iter()
        .cartesian_product(terms)
        .map(|(template, term)| {
            let slug = term
                .split_whitespace()
                .map(|w| urlencoding::encode(w).into_owned())
                .join(sep);
            template.replace("{kw}", &slug)
        })
        .collect()
}

/// Resolve `href` against `base`; handles relative and protocol-relative links.
pub(crate) fn resolve_link(base: &str, href: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    base.join(href.trim()).ok().map(|u| u.to_string())
}

/// Build every enabled adapter from `config`.
pub fn from_config(
    config: &RadarConfig,
    http: &HttpClient,
) -> Result<Vec<Arc<dyn SourceAdapter>>, ConfigError> {
    let sources = &config.sources;
    let mut adapters: Vec<Arc<dyn SourceAdapter>> = Vec::new();

    let enabled = |s: &Option<SourceConfig>| s.clone().filter(|s| s.enabled);

    if let Some(cfg) = enabled(&sources.olx) {
        adapters.push(Arc::new(olx::Olx::new(http.clone(), cfg)?));
    }
    if let Some(cfg) = enabled(&sources.facebook) {
        adapters.push(Arc::new(facebook::FacebookGroups::new(http.clone(), cfg)?));
    }
    if let Some(cfg) = enabled(&sources.seap) {
        adapters.push(Arc::new(seap::Seap::new(http.clone(), cfg)?));
    }
    if let Some(cfg) = enabled(&sources.agrobiznis) {
        adapters.push(Arc::new(agrobiznis::Agrobiznis::new(http.clone(), cfg)?));
    }
    if let Some(cfg) = enabled(&sources.google) {
        adapters.push(Arc::new(google::GoogleAlerts::new(http.clone(), cfg)?));
    }
    if let Some(cfg) = enabled(&sources.ebay) {
        adapters.push(Arc::new(ebay::Ebay::new(http.clone(), cfg)?));
    }
    if let Some(cfg) = enabled(&sources.alibaba) {
        adapters.push(Arc::new(alibaba::Alibaba::new(http.clone(), cfg)?));
    }

    info!(
        count = adapters.len(),
        sources = %adapters.iter().map(|a| a.tag().label()).join(", "),
        "Source adapters configured"
    );
    Ok(adapters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    #[test]
    fn test_expand_search_urls() {
        let templates = vec![
            "https://www.olx.ro/oferte/q-{kw}/".to_string(),
            "https://www.olx.pl/oferty/q-{kw}/".to_string(),
        ];
        let terms = vec!["macese".to_string(), "aronia uscată".to_string()];
        let urls = expand_search_urls(&templates, &terms, "-");
        assert_eq!(
            urls,
            vec![
                "https://www.olx.ro/oferte/q-macese/",
                "https://www.olx.ro/oferte/q-aronia-uscat%C4%83/",
                "https://www.olx.pl/oferty/q-macese/",
                "https://www.olx.pl/oferty/q-aronia-uscat%C4%83/",
            ]
        );
    }

    #[test]
    fn test_resolve_link() {
        assert_eq!(
            resolve_link("https://m.facebook.com", "/groups/1/posts/2/").as_deref(),
            Some("https://m.facebook.com/groups/1/posts/2/")
        );
        assert_eq!(
            resolve_link("https://www.alibaba.com/trade/search", "//www.alibaba.com/product/9.html").as_deref(),
            Some("https://www.alibaba.com/product/9.html")
        );
        assert_eq!(resolve_link("not a url", "/x"), None);
    }

    #[tokio::test]
    async fn test_get_text_sends_identification_header() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/feed")
            .match_header("user-agent", "WildBerryBot/1.0")
            .with_status(200)
            .with_body("<rss/>")
            .create_async()
            .await;

        let http = HttpClient::new("WildBerryBot/1.0").unwrap();
        let body = http
            .get_text(&format!("{}/feed", server.url()), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(body, "<rss/>");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_text_rejects_error_status() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/down")
            .with_status(503)
            .create_async()
            .await;

        let http = HttpClient::new("WildBerryBot/1.0").unwrap();
        let err = http
            .get_text(&format!("{}/down", server.url()), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_fetch_pages_skips_failed_pages() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/ok")
            .with_status(200)
            .with_body("https://example.test/listing/1")
            .create_async()
            .await;
        server
            .mock("GET", "/broken")
            .with_status(500)
            .create_async()
            .await;

        let http = HttpClient::new("WildBerryBot/1.0").unwrap();
        let urls = vec![format!("{}/ok", server.url()), format!("{}/broken", server.url())];
        let records = fetch_pages(&http, SourceTag::Olx, urls, Duration::from_secs(5), |_, body| {
            Ok(vec![Record::hashed(SourceTag::Olx, "t", None, body.trim())?])
        })
        .await
        .unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_pages_fails_when_every_page_fails() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/broken")
            .with_status(500)
            .create_async()
            .await;

        let http = HttpClient::new("WildBerryBot/1.0").unwrap();
        let urls = vec![format!("{}/broken", server.url())];
        let result = fetch_pages(&http, SourceTag::Olx, urls, Duration::from_secs(5), |_, _| Ok(vec![])).await;
        assert!(matches!(result, Err(SourceError::Status { status: 500, .. })));
    }

    #[test]
    fn test_from_config_builds_enabled_adapters() {
        let yaml = r#"
keywords:
  buyer: ['cump[ăa]r macese']
sources:
  seap:
    feeds: ["https://example.test/rss"]
  ebay:
    enabled: false
    search_urls: ["https://example.test/?q={kw}"]
"#;
        let config = RadarConfig::from_yaml(yaml).unwrap();
        let http = HttpClient::new(&config.user_agent).unwrap();
        let adapters = from_config(&config, &http).unwrap();
        assert_eq!(adapters.len(), 1);
        assert_eq!(adapters[0].tag(), SourceTag::Seap);
    }
}
