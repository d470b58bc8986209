//! Allow-list HTML sanitizer for entry content.
//!
//! Content is re-serialized from a parsed tree: only known tags and
//! attributes survive, URLs are made absolute against the entry URL and
//! restricted to safe schemes, and dangerous elements are dropped along
//! with everything inside them.

use ::scraper::{ElementRef, Html, Node};
use url::Url;

/// Makes entry content safe to display
pub trait Sanitizer: Send + Sync {
    fn sanitize(&self, entry_url: &str, content: &str) -> String;
}

/// Elements removed together with their content
const BLOCKED_TAGS: &[&str] = &[
    "script", "style", "noscript", "object", "embed", "applet", "form", "head", "title",
    "template", "svg", "math", "frameset", "frame",
];

const VOID_TAGS: &[&str] = &["br", "hr", "img", "source", "wbr"];

/// Attributes holding a URL
const URL_ATTRIBUTES: &[&str] = &["href", "src", "cite", "poster"];

/// Hosts whose embedded players may stay in the content
const IFRAME_HOSTS: &[&str] = &[
    "youtube.com",
    "youtube-nocookie.com",
    "player.vimeo.com",
    "dailymotion.com",
    "player.twitch.tv",
    "bandcamp.com",
    "w.soundcloud.com",
];

fn allowed_attributes(tag: &str) -> Option<&'static [&'static str]> {
    let attributes: &'static [&'static str] = match tag {
        "a" => &["href", "title"],
        "abbr" | "acronym" => &["title"],
        "audio" => &["src", "controls"],
        "bdo" => &["dir"],
        "blockquote" | "q" => &["cite"],
        "iframe" => &["src", "width", "height", "frameborder", "allowfullscreen"],
        "img" => &["src", "alt", "title", "width", "height"],
        "source" => &["src", "type"],
        "td" | "th" => &["rowspan", "colspan"],
        "time" => &["datetime"],
        "video" => &["src", "poster", "controls", "width", "height"],
        "address" | "article" | "aside" | "b" | "bdi" | "big" | "br" | "caption" | "center"
        | "cite" | "code" | "col" | "colgroup" | "dd" | "del" | "details" | "dfn" | "div"
        | "dl" | "dt" | "em" | "figcaption" | "figure" | "h1" | "h2" | "h3" | "h4" | "h5"
        | "h6" | "hr" | "i" | "ins" | "kbd" | "li" | "mark" | "ol" | "p" | "picture" | "pre"
        | "rp" | "rt" | "ruby" | "s" | "samp" | "section" | "small" | "span" | "strike"
        | "strong" | "sub" | "summary" | "sup" | "table" | "tbody" | "tfoot" | "thead"
        | "tr" | "tt" | "u" | "ul" | "var" | "wbr" => &[],
        _ => return None,
    };
    Some(attributes)
}

/// Default allow-list sanitizer
#[derive(Debug, Default, Clone)]
pub struct HtmlSanitizer;

impl Sanitizer for HtmlSanitizer {
    fn sanitize(&self, entry_url: &str, content: &str) -> String {
        let base = Url::parse(entry_url).ok();
        let fragment = Html::parse_fragment(content);

        let mut output = String::with_capacity(content.len());
        write_children(fragment.root_element(), base.as_ref(), &mut output);
        output
    }
}

fn write_children(element: ElementRef<'_>, base: Option<&Url>, output: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => output.push_str(&escape_text(text)),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    write_element(child, base, output);
                }
            }
            _ => {}
        }
    }
}

fn write_element(element: ElementRef<'_>, base: Option<&Url>, output: &mut String) {
    let tag = element.value().name();

    if BLOCKED_TAGS.contains(&tag) {
        return;
    }

    let Some(attributes) = allowed_attributes(tag) else {
        // Unknown wrapper, keep what it wraps
        write_children(element, base, output);
        return;
    };

    if tag == "iframe" && !is_allowed_iframe(element, base) {
        return;
    }

    output.push('<');
    output.push_str(tag);

    for name in attributes {
        let Some(value) = element.value().attr(name) else {
            continue;
        };

        let value = if URL_ATTRIBUTES.contains(name) {
            match safe_url(value, base, *name == "href") {
                Some(url) => url,
                None => continue,
            }
        } else {
            value.to_string()
        };

        output.push(' ');
        output.push_str(name);
        output.push_str("=\"");
        output.push_str(&escape_attribute(&value));
        output.push('"');
    }

    if tag == "a" {
        output.push_str(r#" rel="noopener noreferrer" target="_blank""#);
    }

    output.push('>');

    if VOID_TAGS.contains(&tag) {
        return;
    }

    write_children(element, base, output);

    output.push_str("</");
    output.push_str(tag);
    output.push('>');
}

/// Resolve `value` against the entry URL and keep it only for safe schemes
fn safe_url(value: &str, base: Option<&Url>, allow_mailto: bool) -> Option<String> {
    let value = value.trim();
    let url = match base {
        Some(base) => base.join(value).ok()?,
        None => Url::parse(value).ok()?,
    };

    match url.scheme() {
        "http" | "https" => Some(url.to_string()),
        "mailto" if allow_mailto => Some(url.to_string()),
        _ => None,
    }
}

fn is_allowed_iframe(element: ElementRef<'_>, base: Option<&Url>) -> bool {
    let Some(src) = element
        .value()
        .attr("src")
        .and_then(|src| safe_url(src, base, false))
    else {
        return false;
    };

    let host = crate::scraper::domain(&src);
    IFRAME_HOSTS
        .iter()
        .any(|allowed| host == *allowed || host.ends_with(&format!(".{}", allowed)))
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attribute(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}
