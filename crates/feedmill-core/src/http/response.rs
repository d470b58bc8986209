use std::sync::OnceLock;

use bytes::Bytes;
use encoding_rs::{Encoding, UTF_8};
use regex::Regex;
use reqwest::StatusCode;

use crate::{Error, Result};

/// Only this many leading bytes are searched for an in-document charset
const SNIFF_LEN: usize = 1024;

/// Outcome of a GET, with the fields the refresh flow consumes
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: StatusCode,
    /// URL reached after following redirects
    pub effective_url: String,
    pub etag: String,
    pub last_modified: String,
    pub content_type: String,
    /// `None` when the server sent no `Content-Length` header
    pub content_length: Option<u64>,
    pub body: Bytes,
}

impl FetchResponse {
    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND
    }

    pub fn has_server_failure(&self) -> bool {
        self.status.as_u16() >= 400
    }

    /// Map failure statuses to the feed error taxonomy
    pub fn ensure_success(&self) -> Result<()> {
        if self.is_not_found() {
            return Err(Error::ResourceNotFound);
        }
        if self.has_server_failure() {
            return Err(Error::ServerFailure(self.status.as_u16()));
        }
        Ok(())
    }

    /// Whether the document changed relative to the stored caching tokens
    pub fn is_modified(&self, etag: &str, last_modified: &str) -> bool {
        if self.status == StatusCode::NOT_MODIFIED {
            return false;
        }
        if !self.etag.is_empty() && self.etag == etag {
            return false;
        }
        if !self.last_modified.is_empty() && self.last_modified == last_modified {
            return false;
        }
        true
    }

    /// True only for an explicit `Content-Length: 0`
    pub fn is_empty(&self) -> bool {
        self.content_length == Some(0)
    }

    pub fn is_html(&self) -> bool {
        self.content_type.to_ascii_lowercase().contains("text/html")
    }

    /// Decode the body to UTF-8.
    ///
    /// The charset comes from the `Content-Type` header, then from an XML
    /// declaration or HTML meta tag, and defaults to UTF-8. A byte-order mark
    /// overrides all of them. An XML declaration naming another encoding is
    /// rewritten so downstream parsers read the text as UTF-8.
    pub fn normalize_body_encoding(&self) -> Result<String> {
        let encoding = match charset_from_content_type(&self.content_type) {
            Some(label) => encoding_for_label(&label)?,
            // A declaration read as ASCII cannot describe a UTF-16 body
            None => match sniff_document_charset(&self.body) {
                Some(label) => encoding_for_label(&label)?.output_encoding(),
                None => UTF_8,
            },
        };

        let (text, actual, had_errors) = encoding.decode(&self.body);
        if had_errors {
            tracing::debug!(
                "{}: malformed {} sequences replaced",
                self.effective_url,
                actual.name()
            );
        }

        Ok(rewrite_xml_declaration(text.into_owned()))
    }
}

fn encoding_for_label(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| Error::Encoding(format!("unsupported charset {:?}", label)))
}

fn charset_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("charset") {
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
            (!value.is_empty()).then(|| value.to_string())
        } else {
            None
        }
    })
}

fn declared_charset_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r#"(?i)<\?xml[^>]*\bencoding\s*=\s*["']([^"']+)["']|<meta[^>]+charset\s*=\s*["']?([A-Za-z0-9._:-]+)"#,
        )
        .expect("valid charset pattern")
    })
}

fn xml_declaration_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)^(\s*<\?xml[^>]*\bencoding\s*=\s*["'])([^"']+)(["'])"#)
            .expect("valid declaration pattern")
    })
}

fn sniff_document_charset(body: &[u8]) -> Option<String> {
    let head = String::from_utf8_lossy(&body[..body.len().min(SNIFF_LEN)]);
    let captures = declared_charset_pattern().captures(&head)?;
    captures
        .get(1)
        .or_else(|| captures.get(2))
        .map(|m| m.as_str().to_string())
}

fn rewrite_xml_declaration(text: String) -> String {
    let pattern = xml_declaration_pattern();
    let declares_other = pattern
        .captures(&text)
        .is_some_and(|captures| !captures[2].eq_ignore_ascii_case("utf-8"));

    if declares_other {
        pattern.replace(&text, "${1}UTF-8${3}").into_owned()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(content_type: &str, body: &[u8]) -> FetchResponse {
        FetchResponse {
            status: StatusCode::OK,
            effective_url: "https://example.org/feed.xml".into(),
            etag: String::new(),
            last_modified: String::new(),
            content_type: content_type.into(),
            content_length: Some(body.len() as u64),
            body: Bytes::copy_from_slice(body),
        }
    }

    #[test]
    fn test_empty_means_explicit_zero_length() {
        let mut resp = response("application/xml", b"");
        assert!(resp.is_empty());

        resp.content_length = None;
        assert!(!resp.is_empty());
    }

    #[test]
    fn test_is_modified() {
        let mut resp = response("application/xml", b"<rss/>");
        resp.etag = "\"v2\"".into();
        resp.last_modified = "Tue, 01 Oct 2024 10:00:00 GMT".into();

        assert!(resp.is_modified("\"v1\"", "Mon, 30 Sep 2024 10:00:00 GMT"));
        assert!(!resp.is_modified("\"v2\"", ""));
        assert!(!resp.is_modified("", "Tue, 01 Oct 2024 10:00:00 GMT"));

        resp.status = StatusCode::NOT_MODIFIED;
        resp.etag.clear();
        resp.last_modified.clear();
        assert!(!resp.is_modified("", ""));
    }

    #[test]
    fn test_ensure_success_classifies_statuses() {
        let mut resp = response("text/html", b"");
        resp.status = StatusCode::NOT_FOUND;
        assert!(matches!(resp.ensure_success(), Err(Error::ResourceNotFound)));

        resp.status = StatusCode::BAD_GATEWAY;
        assert!(matches!(resp.ensure_success(), Err(Error::ServerFailure(502))));

        resp.status = StatusCode::NOT_MODIFIED;
        assert!(resp.ensure_success().is_ok());
    }

    #[test]
    fn test_html_content_type() {
        assert!(response("text/html; charset=utf-8", b"").is_html());
        assert!(response("TEXT/HTML", b"").is_html());
        assert!(!response("application/pdf", b"").is_html());
    }

    #[test]
    fn test_decodes_charset_from_header() {
        let resp = response("text/html; charset=ISO-8859-1", b"caf\xe9");
        assert_eq!(resp.normalize_body_encoding().unwrap(), "café");
    }

    #[test]
    fn test_decodes_charset_from_xml_declaration() {
        let body = b"<?xml version=\"1.0\" encoding=\"windows-1252\"?><rss><title>\x93quoted\x94</title></rss>";
        let text = response("application/xml", body).normalize_body_encoding().unwrap();

        assert_eq!(
            text,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><rss><title>\u{201c}quoted\u{201d}</title></rss>"
        );
    }

    #[test]
    fn test_decodes_charset_from_meta_tag() {
        let body = b"<html><head><meta charset=\"iso-8859-15\"></head><body>\xa4</body></html>";
        let text = response("text/html", body).normalize_body_encoding().unwrap();
        assert!(text.contains('\u{20ac}'));
    }

    #[test]
    fn test_utf16_meta_declaration_reads_as_utf8() {
        let body = "<html><head><meta charset=\"utf-16\"></head><body>café</body></html>";
        let text = response("text/html", body.as_bytes()).normalize_body_encoding().unwrap();
        assert!(text.contains("café"));
    }

    #[test]
    fn test_unknown_charset_is_encoding_error() {
        let resp = response("text/xml; charset=x-klingon", b"<rss/>");
        assert!(matches!(resp.normalize_body_encoding(), Err(Error::Encoding(_))));
    }

    #[test]
    fn test_utf8_passthrough() {
        let resp = response("application/atom+xml", "<feed>naïve</feed>".as_bytes());
        assert_eq!(resp.normalize_body_encoding().unwrap(), "<feed>naïve</feed>");
    }
}
