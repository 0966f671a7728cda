//! RSS 2.0 and Atom parsing shared by the feed adapters.

use once_cell::sync::Lazy;
use quick_xml::Reader;
use quick_xml::events::Event;
use regex::Regex;
use serde::Deserialize;

/// One feed entry, normalized across RSS and Atom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FeedItem {
    pub title: String,
    pub link: Option<String>,
    /// RSS `<guid>` or Atom `<id>`.
    pub guid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<Text>,
    link: Option<Text>,
    guid: Option<Text>,
}

#[derive(Debug, Deserialize)]
struct Atom {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<Text>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    id: Option<Text>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

/// Element text, ignoring attributes such as `isPermaLink` or `type`.
#[derive(Debug, Deserialize)]
struct Text {
    #[serde(rename = "$text", default)]
    value: String,
}

impl Text {
    fn into_nonempty(self) -> Option<String> {
        let v = self.value.trim();
        (!v.is_empty()).then(|| v.to_string())
    }
}

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));

/// Parse an RSS or Atom document. Items without a title are dropped.
pub(crate) fn parse_feed(xml: &str) -> Result<Vec<FeedItem>, String> {
    let xml = scrub_html_entities_for_xml(xml);
    let items = match root_name(&xml).as_deref() {
        Some("rss") => {
            let rss: Rss = quick_xml::de::from_str(&xml).map_err(|e| e.to_string())?;
            rss.channel
                .items
                .into_iter()
                .map(|it| FeedItem {
                    title: it.title.and_then(Text::into_nonempty).unwrap_or_default(),
                    link: it.link.and_then(Text::into_nonempty),
                    guid: it.guid.and_then(Text::into_nonempty),
                })
                .collect::<Vec<_>>()
        }
        Some("feed") => {
            let atom: Atom = quick_xml::de::from_str(&xml).map_err(|e| e.to_string())?;
            atom.entries
                .into_iter()
                .map(|e| {
                    let link = e
                        .links
                        .iter()
                        .find(|l| l.rel.as_deref().is_none_or(|r| r == "alternate"))
                        .or(e.links.first())
                        .and_then(|l| l.href.clone());
                    FeedItem {
                        title: e.title.and_then(Text::into_nonempty).unwrap_or_default(),
                        link,
                        guid: e.id.and_then(Text::into_nonempty),
                    }
                })
                .collect()
        }
        Some(other) => return Err(format!("unexpected root element <{other}>")),
        None => return Err("no root element".to_string()),
    };

    Ok(items
        .into_iter()
        .map(|mut it| {
            // Atom titles with type="html" arrive as escaped markup.
            it.title = crate::utils::clean_text(&RE_TAGS.replace_all(&it.title, " "));
            it
        })
        .filter(|it| !it.title.is_empty())
        .collect())
}

fn root_name(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Some(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Ok(Event::Eof) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

/// Replace HTML entities that are not valid XML so the parser does not choke.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&bdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}
