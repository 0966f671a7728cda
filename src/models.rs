//! Data models shared by every source adapter and the coordinator.
//!
//! - [`SourceTag`]: which adapter produced a record
//! - [`Record`]: a normalized candidate listing, identical in shape for every source
//! - [`content_id`]: the SHA-256 identity used when a source has no native id

use crate::error::SourceError;
use sha2::{Digest, Sha256};
use std::fmt;
use url::Url;

/// Identifies the adapter a [`Record`] came from.
///
/// The tag is half of the dedup identity, so [`SourceTag::key`] must never
/// change once state has been persisted with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceTag {
    Olx,
    Facebook,
    Seap,
    Agrobiznis,
    Google,
    Ebay,
    Alibaba,
}

impl SourceTag {
    /// Stable lowercase key used in persisted identities.
    pub fn key(self) -> &'static str {
        match self {
            SourceTag::Olx => "olx",
            SourceTag::Facebook => "facebook",
            SourceTag::Seap => "seap",
            SourceTag::Agrobiznis => "agrobiznis",
            SourceTag::Google => "google",
            SourceTag::Ebay => "ebay",
            SourceTag::Alibaba => "alibaba",
        }
    }

    /// Human-facing name used in notifications and logs.
    pub fn label(self) -> &'static str {
        match self {
            SourceTag::Olx => "OLX",
            SourceTag::Facebook => "Facebook",
            SourceTag::Seap => "SEAP",
            SourceTag::Agrobiznis => "Agrobiznis",
            SourceTag::Google => "Google",
            SourceTag::Ebay => "eBay",
            SourceTag::Alibaba => "Alibaba",
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A candidate listing extracted from one source during one run.
///
/// Records are never persisted; only [`Record::identity`] survives a run,
/// through the [`SeenStore`](crate::store::SeenStore).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Identity scoped to `source`.
    pub id: String,
    pub source: SourceTag,
    pub title: String,
    /// Display-only; `None` when the source shows no price.
    pub price: Option<String>,
    /// Absolute link to the listing, fragment stripped.
    pub url: Url,
}

impl Record {
    /// Build a record, validating that `url` is absolute.
    ///
    /// Fragments are dropped so that `…/ad-123.html#gallery` and
    /// `…/ad-123.html` are the same listing.
    pub fn new(
        source: SourceTag,
        id: impl Into<String>,
        title: impl Into<String>,
        price: Option<String>,
        url: &str,
    ) -> Result<Self, SourceError> {
        let mut url = Url::parse(url).map_err(|_| SourceError::InvalidUrl(url.to_string()))?;
        url.set_fragment(None);
        Ok(Self {
            id: id.into(),
            source,
            title: title.into(),
            price: price.filter(|p| !p.trim().is_empty()),
            url,
        })
    }

    /// Build a record whose id is the [`content_id`] of its canonical URL.
    pub fn hashed(
        source: SourceTag,
        title: impl Into<String>,
        price: Option<String>,
        url: &str,
    ) -> Result<Self, SourceError> {
        let mut record = Self::new(source, String::new(), title, price, url)?;
        record.id = content_id(&[record.url.as_str()]);
        Ok(record)
    }

    /// Global dedup identity: `"<source-key>:<id>"`.
    pub fn identity(&self) -> String {
        format!("{}:{}", self.source.key(), self.id)
    }

    /// Notification body for this record.
    pub fn message(&self) -> String {
        format!(
            "📢 BUYER • {}\n{}\n{}\n{}",
            self.source,
            self.title,
            self.price.as_deref().unwrap_or("-"),
            self.url
        )
    }
}

/// Deterministic content identity: SHA-256 over the parts, truncated to 128 bits.
///
/// Parts are length-prefixed so `["ab", "c"]` and `["a", "bc"]` hash differently.
pub fn content_id(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part.as_bytes());
    }
    let digest = hasher.finalize();
    hex::encode(&digest[..16])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_scoped_by_source() {
        let a = Record::new(SourceTag::Olx, "42", "t", None, "https://a.example/42").unwrap();
        let b = Record::new(SourceTag::Ebay, "42", "t", None, "https://a.example/42").unwrap();
        assert_eq!(a.identity(), "olx:42");
        assert_ne!(a.identity(), b.identity());
    }

    #[test]
    fn test_relative_url_is_rejected() {
        let err = Record::new(SourceTag::Olx, "1", "t", None, "/d/oferta/x.html").unwrap_err();
        assert!(matches!(err, SourceError::InvalidUrl(_)));
    }

    #[test]
    fn test_fragment_is_stripped() {
        let r = Record::hashed(SourceTag::Olx, "t", None, "https://www.olx.ro/d/a-IDx.html#gallery").unwrap();
        assert_eq!(r.url.as_str(), "https://www.olx.ro/d/a-IDx.html");
        let plain = Record::hashed(SourceTag::Olx, "t", None, "https://www.olx.ro/d/a-IDx.html").unwrap();
        assert_eq!(r.id, plain.id);
    }

    #[test]
    fn test_content_id_is_stable_and_wide() {
        let a = content_id(&["https://m.facebook.com/groups/1/posts/2"]);
        let b = content_id(&["https://m.facebook.com/groups/1/posts/2"]);
        let c = content_id(&["https://m.facebook.com/groups/1/posts/3"]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_content_id_parts_are_delimited() {
        assert_ne!(content_id(&["ab", "c"]), content_id(&["a", "bc"]));
    }

    #[test]
    fn test_message_renders_missing_price_as_dash() {
        let r = Record::new(
            SourceTag::Seap,
            "guid-1",
            "Achiziție macese uscate",
            Some("  ".to_string()),
            "https://e-licitatie.ro/pub/notices/1",
        )
        .unwrap();
        assert_eq!(
            r.message(),
            "📢 BUYER • SEAP\nAchiziție macese uscate\n-\nhttps://e-licitatie.ro/pub/notices/1"
        );
    }
}
