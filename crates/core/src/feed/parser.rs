//! RSS document parsing.

use chrono::{DateTime, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex_lite::Regex;
use tracing::debug;

use crate::torrent_client::normalize_info_hash;

use super::FeedError;

/// One `<item>` as found in the document, before .torrent resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFeedItem {
    pub title: Option<String>,
    pub link: Option<String>,
    pub pub_date: Option<DateTime<Utc>>,
    /// Magnet link and its normalized hash, if the item carries one.
    pub magnet: Option<(String, String)>,
    /// First .torrent URL in the item, used when there is no magnet.
    pub torrent_url: Option<String>,
}

/// Parsed document: channel title and items in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFeed {
    pub title: Option<String>,
    pub items: Vec<RawFeedItem>,
}

#[derive(Default)]
struct ItemBuilder {
    title: Option<String>,
    link: Option<String>,
    pub_date: Option<String>,
    texts: Vec<String>,
    attributes: Vec<String>,
}

static MAGNET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"magnet:\?xt=urn:btih:([a-zA-Z0-9]+)[^\s<>"]*"#).unwrap());

static TORRENT_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s<>"]+?\.torrent"#).unwrap());

/// First magnet in `text` whose hash is a valid v1 info hash, with that hash.
pub fn find_magnet(text: &str) -> Option<(String, String)> {
    MAGNET_RE.captures_iter(text).find_map(|caps| {
        let magnet = caps.get(0)?.as_str();
        let hash = normalize_info_hash(caps.get(1)?.as_str())?;
        Some((magnet.to_string(), hash))
    })
}

/// First `http(s)://....torrent` URL in `text`.
pub fn find_torrent_url(text: &str) -> Option<String> {
    TORRENT_URL_RE.find(text).map(|m| m.as_str().to_string())
}

/// Parse an RSS document.
pub fn parse_feed(content: &str) -> Result<RawFeed, FeedError> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut feed = RawFeed::default();
    let mut path: Vec<String> = Vec::new();
    let mut item: Option<ItemBuilder> = None;
    // Depth of the open <item> element within `path`.
    let mut item_depth = 0;
    let mut saw_element = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                saw_element = true;
                let name = local_name(e);
                if let Some(builder) = item.as_mut() {
                    collect_attributes(e, builder);
                } else if name == "item" {
                    item = Some(ItemBuilder::default());
                    item_depth = path.len() + 1;
                }
                path.push(name);
            }
            Ok(Event::Empty(ref e)) => {
                saw_element = true;
                if let Some(builder) = item.as_mut() {
                    collect_attributes(e, builder);
                }
            }
            Ok(Event::End(_)) => {
                if item.is_some() && path.len() == item_depth {
                    if let Some(builder) = item.take() {
                        feed.items.push(build_item(builder));
                    }
                }
                path.pop();
            }
            Ok(Event::Text(ref e)) => {
                let text = e
                    .unescape()
                    .map(|t| t.into_owned())
                    .unwrap_or_else(|_| String::from_utf8_lossy(e).into_owned());
                handle_text(text, &path, item_depth, item.as_mut(), &mut feed);
            }
            Ok(Event::CData(ref e)) => {
                let text = String::from_utf8_lossy(e).into_owned();
                handle_text(text, &path, item_depth, item.as_mut(), &mut feed);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(FeedError::Parse(format!(
                    "at byte {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
    }

    if !saw_element {
        return Err(FeedError::Parse("document has no XML elements".to_string()));
    }
    if !path.is_empty() {
        return Err(FeedError::Parse(format!("unclosed <{}>", path.join("/"))));
    }

    debug!(items = feed.items.len(), "Parsed feed document");
    Ok(feed)
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn collect_attributes(e: &BytesStart<'_>, builder: &mut ItemBuilder) {
    for attr in e.attributes().flatten() {
        let value = attr
            .unescape_value()
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
        builder.attributes.push(value);
    }
}

fn handle_text(
    text: String,
    path: &[String],
    item_depth: usize,
    item: Option<&mut ItemBuilder>,
    feed: &mut RawFeed,
) {
    let text = text.trim().to_string();
    if text.is_empty() {
        return;
    }

    match item {
        Some(builder) => {
            // Only direct children of <item> name its fields.
            if path.len() == item_depth + 1 {
                match path.last().map(String::as_str) {
                    Some("title") => builder.title = Some(text.clone()),
                    Some("link") => builder.link = Some(text.clone()),
                    Some("pubDate") => builder.pub_date = Some(text.clone()),
                    _ => {}
                }
            }
            builder.texts.push(text);
        }
        None => {
            let in_channel_title = path.len() >= 2
                && path[path.len() - 1] == "title"
                && path[path.len() - 2] == "channel";
            if in_channel_title && feed.title.is_none() {
                feed.title = Some(text);
            }
        }
    }
}

fn build_item(builder: ItemBuilder) -> RawFeedItem {
    let magnet = builder
        .texts
        .iter()
        .chain(builder.attributes.iter())
        .find_map(|text| find_magnet(text));

    let torrent_url = if magnet.is_none() {
        builder
            .texts
            .iter()
            .chain(builder.attributes.iter())
            .find_map(|text| find_torrent_url(text))
    } else {
        None
    };

    RawFeedItem {
        title: builder.title,
        link: builder.link,
        pub_date: builder.pub_date.as_deref().and_then(parse_rss_date),
        magnet,
        torrent_url,
    }
}

/// Parse RSS date format (RFC 2822), with a few common variations.
pub fn parse_rss_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    let formats = ["%a, %d %b %Y %H:%M:%S GMT", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];
    for fmt in formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc());
        }
    }

    debug!(date = s, "Failed to parse RSS date");
    None
}
