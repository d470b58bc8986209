//! Content rewrite rules applied to every entry before sanitizing.
//!
//! Rules are a comma-separated list of names. A feed without rules gets the
//! predefined rules for the entry's domain, if any.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::scraper::find_predefined;

/// Rewrites entry content according to named rules
pub trait Rewriter: Send + Sync {
    fn rewrite(&self, entry_url: &str, content: &str, rules: &str) -> String;
}

/// Rewrite rules for sites that need them, same ordering contract as the
/// scraper rules: a domain precedes any shorter domain it contains.
pub const PREDEFINED_REWRITE_RULES: &[(&str, &str)] = &[
    ("abstrusegoose.com", "add_image_title"),
    ("amazingsuperpowers.com", "add_image_title"),
    ("monkeyuser.com", "add_image_title"),
    ("mrlovenstein.com", "add_image_title"),
    ("nedroid.com", "add_image_title"),
    ("thedoghousediaries.com", "add_image_title"),
    ("turnoff.us", "add_image_title"),
    ("xkcd.com", "add_image_title"),
    ("youtube.com", "add_youtube_video"),
];

/// Built-in rules: `add_image_title`, `add_youtube_video`
#[derive(Debug, Default, Clone)]
pub struct RuleRewriter;

impl Rewriter for RuleRewriter {
    fn rewrite(&self, entry_url: &str, content: &str, rules: &str) -> String {
        let rules = if rules.trim().is_empty() {
            find_predefined(PREDEFINED_REWRITE_RULES, entry_url)
                .map(|(_, rules)| rules)
                .unwrap_or_default()
        } else {
            rules
        };

        let mut content = content.to_string();
        for rule in rules.split(',').map(str::trim).filter(|r| !r.is_empty()) {
            match rule {
                "add_image_title" => content = add_image_title(&content),
                "add_youtube_video" => content = add_youtube_video(entry_url, &content),
                unknown => tracing::debug!("Ignoring unknown rewrite rule {:?}", unknown),
            }
        }

        content
    }
}

fn image_with_title() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)<img\b[^>]*\btitle\s*=\s*"([^"]+)"[^>]*>"#).expect("valid image pattern")
    })
}

fn youtube_watch_url() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^https?://(?:www\.|m\.)?youtube\.com/watch\?(?:.*&)?v=([\w-]+)")
            .expect("valid youtube pattern")
    })
}

/// Wrap images carrying a title (comic punchlines) in a captioned figure
fn add_image_title(content: &str) -> String {
    image_with_title()
        .replace_all(content, |caps: &Captures| {
            format!(
                "<figure>{}<figcaption><p>{}</p></figcaption></figure>",
                &caps[0], &caps[1]
            )
        })
        .into_owned()
}

/// Prepend an embedded player for YouTube watch pages
fn add_youtube_video(entry_url: &str, content: &str) -> String {
    match youtube_watch_url().captures(entry_url) {
        Some(caps) => format!(
            r#"<iframe width="650" height="350" frameborder="0" src="https://www.youtube-nocookie.com/embed/{}" allowfullscreen></iframe><br>{}"#,
            &caps[1], content
        ),
        None => content.to_string(),
    }
}
