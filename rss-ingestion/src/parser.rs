use crate::types::{IngestError, ParsedAuthor, ParsedFeed, ParsedItem, Result};
use chrono::{DateTime, Utc};
use feed_rs::parser;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, info};

pub struct FeedParser;

impl FeedParser {
    /// Parse an RSS/Atom document. Items are kept in document order.
    pub fn parse_feed(content: &[u8]) -> Result<ParsedFeed> {
        debug!("Parsing feed content ({} bytes)", content.len());

        let feed = parser::parse(content)
            .map_err(|e| IngestError::Parse(format!("Failed to parse feed: {}", e)))?;

        let title = feed.title.map(|t| t.content);
        let updated = format_marker(feed.updated.or(feed.published));
        let mut items: Vec<ParsedItem> = feed.entries.into_iter().map(Self::parse_entry).collect();

        // feed-rs hands back links run through `Url`; article identity uses the published text.
        match raw_item_links(content) {
            Some(raw) if raw.len() == items.len() => {
                for (item, link) in items.iter_mut().zip(raw) {
                    if let Some(link) = link {
                        item.link = link;
                    }
                }
            }
            _ => debug!("Raw link scan did not line up with {} entries, keeping parsed links", items.len()),
        }

        info!("Parsed feed with {} entries (updated {:?})", items.len(), updated);

        Ok(ParsedFeed {
            title,
            updated,
            items,
            etag: None, // Will be set by the fetcher
        })
    }

    fn parse_entry(entry: feed_rs::model::Entry) -> ParsedItem {
        let title = entry.title.map(|t| t.content).unwrap_or_default();

        let link = entry
            .links
            .first()
            .map(|l| l.href.clone())
            .or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()))
            .unwrap_or_default();

        let description = entry.summary.map(|s| s.content).unwrap_or_default();

        let authors = entry
            .authors
            .into_iter()
            .map(|person| match person.email {
                Some(email) => ParsedAuthor {
                    name: person.name.trim().to_string(),
                    email,
                },
                None => split_rss_author(&person.name),
            })
            .filter(|a| !a.name.is_empty())
            .collect();

        ParsedItem {
            title,
            link,
            description,
            published: format_marker(entry.published),
            updated: format_marker(entry.updated),
            authors,
        }
    }
}

/// First `link` of every `item`/`entry`, in document order, exactly as
/// written. `None` when the document does not scan as XML.
fn raw_item_links(content: &[u8]) -> Option<Vec<Option<String>>> {
    let mut reader = Reader::from_reader(content);
    let mut buf = Vec::new();
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut links: Vec<Option<String>> = Vec::new();
    let mut text: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf).ok()? {
            Event::Start(e) => {
                let name = e.local_name().as_ref().to_vec();
                if is_item(&name) {
                    links.push(None);
                } else if name.as_slice() == b"link" && wants_link(&path, &links) {
                    match href(&e) {
                        Some(href) => set_last(&mut links, href),
                        None => text = Some(String::new()),
                    }
                }
                path.push(name);
            }
            Event::Empty(e) => {
                let name = e.local_name();
                if is_item(name.as_ref()) {
                    links.push(None);
                } else if name.as_ref() == b"link" && wants_link(&path, &links) {
                    if let Some(href) = href(&e) {
                        set_last(&mut links, href);
                    }
                }
            }
            Event::Text(t) => {
                if let Some(acc) = text.as_mut() {
                    acc.push_str(&t.unescape().ok()?);
                }
            }
            Event::CData(c) => {
                if let Some(acc) = text.as_mut() {
                    acc.push_str(std::str::from_utf8(&c).ok()?);
                }
            }
            Event::End(_) => {
                if let Some(acc) = text.take() {
                    let acc = acc.trim();
                    if !acc.is_empty() {
                        set_last(&mut links, acc.to_string());
                    }
                }
                path.pop();
            }
            Event::Eof => return Some(links),
            _ => {}
        }
        buf.clear();
    }
}

fn is_item(name: &[u8]) -> bool {
    matches!(name, b"item" | b"entry")
}

/// A direct `link` child of an item whose link slot is still empty.
fn wants_link(path: &[Vec<u8>], links: &[Option<String>]) -> bool {
    path.last().is_some_and(|parent| is_item(parent)) && matches!(links.last(), Some(None))
}

fn href(e: &BytesStart) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == b"href")
        .and_then(|a| a.unescape_value().ok().map(|v| v.trim().to_string()))
        .filter(|v| !v.is_empty())
}

fn set_last(links: &mut [Option<String>], link: String) {
    if let Some(slot) = links.last_mut() {
        *slot = Some(link);
    }
}

fn format_marker(value: Option<DateTime<Utc>>) -> String {
    value.map(|dt| dt.to_rfc3339()).unwrap_or_default()
}

/// RSS 2.0 `<author>` carries `email (Name)`; split it the way readers do.
pub fn split_rss_author(raw: &str) -> ParsedAuthor {
    let raw = raw.trim();
    if let (Some(open), true) = (raw.find('('), raw.ends_with(')')) {
        let email = raw[..open].trim();
        let name = raw[open + 1..raw.len() - 1].trim();
        if email.contains('@') && !name.is_empty() {
            return ParsedAuthor {
                name: name.to_string(),
                email: email.to_string(),
            };
        }
    }
    if raw.contains('@') && !raw.contains(' ') {
        return ParsedAuthor {
            name: raw.to_string(),
            email: raw.to_string(),
        };
    }
    ParsedAuthor {
        name: raw.to_string(),
        email: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>38 North</title>
  <id>urn:uuid:60a76c80-d399-11d9-b91C-0003939e0af6</id>
  <updated>2024-01-01T00:00:00Z</updated>
  <entry>
    <title>Report X</title>
    <link href="https://x"/>
    <id>urn:uuid:1225c695-cfb8-4ebb-aaaa-80da344efa6a</id>
    <updated>2023-12-31T12:00:00Z</updated>
    <published>2023-12-31T10:00:00Z</published>
    <summary>First report</summary>
    <author><name>Jane Doe</name><email>jane@x.com</email></author>
  </entry>
  <entry>
    <title>Report Y</title>
    <link href="https://y"/>
    <id>urn:uuid:1225c695-cfb8-4ebb-aaaa-80da344efa6b</id>
    <updated>2023-12-30T12:00:00Z</updated>
  </entry>
</feed>"#;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Example</title>
    <link>https://example.com</link>
    <description>Example feed</description>
    <pubDate>Mon, 01 Jan 2024 00:00:00 +0000</pubDate>
    <lastBuildDate>Mon, 01 Jan 2024 00:00:00 +0000</lastBuildDate>
    <item>
      <title>Hello</title>
      <link>https://example.com/hello</link>
      <description>Hi there</description>
      <pubDate>Sun, 31 Dec 2023 08:00:00 +0000</pubDate>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_atom_document() {
        let feed = FeedParser::parse_feed(ATOM.as_bytes()).unwrap();

        assert_eq!(feed.title.as_deref(), Some("38 North"));
        assert_eq!(feed.updated, "2024-01-01T00:00:00+00:00");
        assert_eq!(feed.items.len(), 2);

        let first = &feed.items[0];
        assert_eq!(first.title, "Report X");
        assert_eq!(first.link, "https://x");
        assert_eq!(first.description, "First report");
        assert_eq!(first.published, "2023-12-31T10:00:00+00:00");
        assert_eq!(
            first.authors,
            vec![ParsedAuthor {
                name: "Jane Doe".into(),
                email: "jane@x.com".into()
            }]
        );

        let second = &feed.items[1];
        assert_eq!(second.title, "Report Y");
        assert_eq!(second.published, "");
        assert!(second.authors.is_empty());
    }

    #[test]
    fn parses_rss_document() {
        let feed = FeedParser::parse_feed(RSS.as_bytes()).unwrap();

        assert_eq!(feed.updated, "2024-01-01T00:00:00+00:00");
        assert_eq!(feed.items.len(), 1);
        assert_eq!(feed.items[0].link, "https://example.com/hello");
        assert_eq!(feed.items[0].published, "2023-12-31T08:00:00+00:00");
    }

    #[test]
    fn item_links_are_kept_as_published() {
        let rss = r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
  <channel>
    <title>Example</title>
    <link>https://EXAMPLE.com/channel</link>
    <description>Example feed</description>
    <item>
      <title>Bare host</title>
      <link>https://x</link>
    </item>
    <item>
      <title>Dot segments</title>
      <link>
        https://EXAMPLE.com/a/../b?q=1
      </link>
    </item>
    <item>
      <title>Escaped</title>
      <link><![CDATA[https://x/?a=1&b=2]]></link>
    </item>
  </channel>
</rss>"#;
        let feed = FeedParser::parse_feed(rss.as_bytes()).unwrap();

        let links: Vec<&str> = feed.items.iter().map(|i| i.link.as_str()).collect();
        assert_eq!(
            links,
            vec!["https://x", "https://EXAMPLE.com/a/../b?q=1", "https://x/?a=1&b=2"]
        );

        let atom = FeedParser::parse_feed(ATOM.as_bytes()).unwrap();
        assert_eq!(atom.items[0].link, "https://x");
        assert_eq!(atom.items[1].link, "https://y");
    }

    #[test]
    fn raw_scan_ignores_channel_links() {
        let links = raw_item_links(RSS.as_bytes()).unwrap();
        assert_eq!(links, vec![Some("https://example.com/hello".to_string())]);
    }

    #[test]
    fn rejects_non_feed_content() {
        let err = FeedParser::parse_feed(b"<html><body>not a feed</body></html>").unwrap_err();
        assert!(matches!(err, IngestError::Parse(_)));
    }

    #[test]
    fn splits_rss_author_forms() {
        assert_eq!(
            split_rss_author("jane@x.com (Jane Doe)"),
            ParsedAuthor {
                name: "Jane Doe".into(),
                email: "jane@x.com".into()
            }
        );
        assert_eq!(split_rss_author(" Jane Doe ").email, "");
        assert_eq!(split_rss_author("Jane Doe").name, "Jane Doe");
        assert_eq!(split_rss_author("jane@x.com").email, "jane@x.com");
    }
}
