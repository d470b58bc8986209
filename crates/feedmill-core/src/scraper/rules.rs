/// Selector rules for publishers whose pages defeat generic extraction.
///
/// Matched by substring against the page host, first match wins, so a
/// domain must come before any shorter domain it contains.
pub const PREDEFINED_RULES: &[(&str, &str)] = &[
    ("blog.cloudflare.com", "div.post-content"),
    ("cbc.ca", ".story-content"),
    ("dilbert.com", "span.comic-title-name, img.img-comic"),
    ("igen.fr", "section.corps"),
    ("lapresse.ca", ".amorce, .entry"),
    ("lemonde.fr", "div#articleBody"),
    ("lesjoiesducode.fr", ".blog-post-content img"),
    ("linux.com", "div.content, div[property]"),
    ("medium.com", ".section-content"),
    ("monwindows.com", ".blog-post-body"),
    ("npr.org", "#storytext"),
    ("oglaf.com", ".content img"),
    ("opensource.com", "div[property='schema:text']"),
    ("phoronix.com", "div.content"),
    ("pseudo-sciences.org", "#art_main"),
    ("raywenderlich.com", "article"),
    ("royalroad.com", ".author-note-portlet, .chapter-content"),
    ("slate.com", ".slate-paragraph, .slate-image-wrapper, .slate-paragraph-header"),
    ("smbc-comics.com", "div#cc-comicbody, div#aftercomic"),
    ("techcrunch.com", "div.article-entry"),
    ("theregister.co.uk", "#body"),
    ("turnoff.us", "article.post-content"),
    ("wired.com", "main figure, article"),
    ("xkcd.com", "div#comic"),
];

/// Lowercased host of `url`, or an empty string when it has none
pub(crate) fn domain(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
        .unwrap_or_default()
}

/// Look up the first table entry whose domain occurs in the URL's host
pub fn find_predefined<'t>(
    table: &'t [(&'t str, &'t str)],
    url: &str,
) -> Option<(&'t str, &'t str)> {
    let host = domain(url);
    if host.is_empty() {
        return None;
    }

    table
        .iter()
        .find(|(domain, _)| host.contains(domain))
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_entry_is_shadowed() {
        for (i, (earlier, _)) in PREDEFINED_RULES.iter().enumerate() {
            for (later, _) in &PREDEFINED_RULES[i + 1..] {
                assert!(
                    !later.contains(earlier),
                    "{} would never match because {} comes first",
                    later,
                    earlier
                );
            }
        }
    }

    #[test]
    fn test_subdomain_matches() {
        let found = find_predefined(PREDEFINED_RULES, "https://www.phoronix.com/news/Linux-6.12");
        assert_eq!(found, Some(("phoronix.com", "div.content")));
    }

    #[test]
    fn test_first_match_wins() {
        let table = [("blog.example.com", "article"), ("example.com", "main")];
        assert_eq!(
            find_predefined(&table, "https://blog.example.com/post").map(|(_, r)| r),
            Some("article")
        );
        assert_eq!(
            find_predefined(&table, "https://example.com/post").map(|(_, r)| r),
            Some("main")
        );
    }

    #[test]
    fn test_unknown_or_invalid_url() {
        assert!(find_predefined(PREDEFINED_RULES, "https://example.net/").is_none());
        assert!(find_predefined(PREDEFINED_RULES, "not a url").is_none());
    }
}
