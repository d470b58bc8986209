use feed_rs::model::Link;
use feed_rs::parser;

use super::models::{Entry, Feed};
use crate::{Error, Result};

/// Turns a normalized feed document into a feed with its entries
pub trait FeedParser: Send + Sync {
    fn parse(&self, body: &str) -> Result<Feed>;
}

/// RSS, Atom and JSON Feed parsing through `feed-rs`
#[derive(Debug, Default, Clone)]
pub struct FeedRsParser;

impl FeedParser for FeedRsParser {
    fn parse(&self, body: &str) -> Result<Feed> {
        let document = parser::parse(body.as_bytes()).map_err(|e| Error::Parse(e.to_string()))?;

        let site_url = preferred_link(&document.links).unwrap_or_default();
        let title = document.title.map(|t| t.content).unwrap_or_default();

        let entries = document
            .entries
            .into_iter()
            .map(|entry| {
                let url = preferred_link(&entry.links).unwrap_or_default();

                let hash = if entry.id.is_empty() {
                    url.clone()
                } else {
                    entry.id
                };

                let title = entry
                    .title
                    .map(|t| t.content)
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| url.clone());

                let content = entry
                    .content
                    .and_then(|c| c.body)
                    .or_else(|| entry.summary.map(|s| s.content))
                    .unwrap_or_default();

                Entry {
                    hash,
                    url,
                    title,
                    author: entry.authors.into_iter().next().map(|a| a.name),
                    content,
                    published_at: entry.published.or(entry.updated),
                    ..Entry::default()
                }
            })
            .collect();

        Ok(Feed {
            title,
            site_url,
            entries,
            ..Feed::default()
        })
    }
}

/// The alternate (HTML) link if one is marked, else the first link
fn preferred_link(links: &[Link]) -> Option<String> {
    links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| links.first())
        .map(|l| l.href.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rss() {
        let rss = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>Example</title>
    <link>https://example.org/</link>
    <item>
        <guid>entry-1</guid>
        <title>First</title>
        <link>https://example.org/first</link>
        <description>&lt;p&gt;Summary&lt;/p&gt;</description>
    </item>
    <item>
        <link>https://example.org/second</link>
    </item>
</channel></rss>"#;

        let feed = FeedRsParser.parse(rss).unwrap();
        assert_eq!(feed.title, "Example");
        assert_eq!(feed.site_url, "https://example.org/");
        assert_eq!(feed.entries.len(), 2);

        let first = &feed.entries[0];
        assert_eq!(first.hash, "entry-1");
        assert_eq!(first.url, "https://example.org/first");
        assert_eq!(first.content, "<p>Summary</p>");

        // Untitled entries are named after their URL
        assert_eq!(feed.entries[1].title, "https://example.org/second");
        assert_eq!(feed.entries[1].feed_id, 0);
    }

    #[test]
    fn test_parse_atom_prefers_alternate_link() {
        let atom = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
    <title>Atom Example</title>
    <id>urn:example</id>
    <updated>2024-10-01T10:00:00Z</updated>
    <link rel="self" href="https://example.org/atom.xml"/>
    <link rel="alternate" href="https://example.org/"/>
    <entry>
        <id>urn:example:1</id>
        <title>Entry</title>
        <updated>2024-10-01T10:00:00Z</updated>
        <link rel="alternate" href="https://example.org/entry"/>
        <author><name>Jane</name></author>
        <content type="html">&lt;b&gt;Full&lt;/b&gt;</content>
    </entry>
</feed>"#;

        let feed = FeedRsParser.parse(atom).unwrap();
        assert_eq!(feed.site_url, "https://example.org/");
        assert_eq!(feed.entries[0].url, "https://example.org/entry");
        assert_eq!(feed.entries[0].author.as_deref(), Some("Jane"));
        assert_eq!(feed.entries[0].content, "<b>Full</b>");
        assert!(feed.entries[0].published_at.is_some());
    }

    #[test]
    fn test_malformed_document_is_parse_error() {
        let result = FeedRsParser.parse("<not valid xml");
        assert!(matches!(result, Err(Error::Parse(_))));
    }
}
