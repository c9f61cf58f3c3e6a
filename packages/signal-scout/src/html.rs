//! Small HTML helpers shared by the classifier, verifier and link scorer.

use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Selector};
use url::Url;

lazy_static! {
    static ref TITLE: Selector = Selector::parse("title").expect("static selector");
    static ref META_DESCRIPTION: Selector =
        Selector::parse(r#"meta[name="description"], meta[property="og:description"]"#)
            .expect("static selector");
    static ref ANCHOR: Selector = Selector::parse("a[href]").expect("static selector");
}

/// An outbound link with its anchor text.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub url: Url,
    pub text: String,
}

/// Trimmed `<title>` text.
pub fn title(document: &Html) -> Option<String> {
    document
        .select(&TITLE)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty())
}

/// Meta description (or og:description).
pub fn meta_description(document: &Html) -> Option<String> {
    document
        .select(&META_DESCRIPTION)
        .filter_map(|el| el.value().attr("content"))
        .map(collapse_whitespace)
        .find(|d| !d.is_empty())
}

/// Text a reader would see: script, style and noscript content excluded.
pub fn visible_text(document: &Html) -> String {
    let mut out = String::new();
    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| e.name().to_string()))
            .is_some_and(|name| matches!(name.as_str(), "script" | "style" | "noscript" | "template"));
        if hidden {
            continue;
        }
        let text = text.trim();
        if !text.is_empty() {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(text);
        }
    }
    collapse_whitespace(&out)
}

/// Absolute http(s) links, in document order, without fragments.
pub fn links(document: &Html, base: &Url) -> Vec<Link> {
    document
        .select(&ANCHOR)
        .filter_map(|el| {
            let href = el.value().attr("href")?.trim();
            if href.starts_with('#')
                || href.starts_with("javascript:")
                || href.starts_with("mailto:")
                || href.starts_with("tel:")
            {
                return None;
            }
            let mut url = base.join(href).ok()?;
            if !matches!(url.scheme(), "http" | "https") {
                return None;
            }
            url.set_fragment(None);
            Some(Link {
                url,
                text: collapse_whitespace(&el.text().collect::<String>()),
            })
        })
        .collect()
}

/// Deepest element nesting level.
pub fn dom_depth(document: &Html) -> usize {
    document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .map(|el| el.ancestors().filter(|a| a.value().is_element()).count() + 1)
        .max()
        .unwrap_or(0)
}

/// Lowercased alphanumeric words.
pub fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// First `max_chars` characters, cut on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// [`truncate_chars`] with `...` appended when anything was cut.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let mut out = truncate_chars(text, max_chars);
    if text.chars().nth(max_chars).is_some() {
        out.push_str("...");
    }
    out
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html>
          <head>
            <title>  Watch   Live NBA </title>
            <meta name="description" content="Free HD streams">
            <script>var player = "jwplayer";</script>
            <style>.x { color: red }</style>
          </head>
          <body>
            <div><p>Tonight's <b>games</b></p></div>
            <a href="/schedule#today">Schedule</a>
            <a href="https://other.tv/live">Other</a>
            <a href="mailto:x@y.z">Mail</a>
            <a href="javascript:void(0)">JS</a>
          </body>
        </html>"#;

    #[test]
    fn test_title_and_meta() {
        let doc = Html::parse_document(PAGE);
        assert_eq!(title(&doc).as_deref(), Some("Watch Live NBA"));
        assert_eq!(meta_description(&doc).as_deref(), Some("Free HD streams"));
    }

    #[test]
    fn test_visible_text_skips_scripts() {
        let doc = Html::parse_document(PAGE);
        let text = visible_text(&doc);
        assert!(text.contains("Tonight's games"));
        assert!(!text.contains("jwplayer"));
        assert!(!text.contains("color"));
    }

    #[test]
    fn test_links_are_resolved_and_filtered() {
        let doc = Html::parse_document(PAGE);
        let base = Url::parse("https://site.tv/home").unwrap();
        let links = links(&doc, &base);
        let urls: Vec<_> = links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(urls, vec!["https://site.tv/schedule", "https://other.tv/live"]);
        assert_eq!(links[0].text, "Schedule");
    }

    #[test]
    fn test_dom_depth() {
        let doc = Html::parse_document("<html><body><div><p><b>x</b></p></div></body></html>");
        assert_eq!(dom_depth(&doc), 5);
    }

    #[test]
    fn test_excerpt_marks_cut_text() {
        assert_eq!(excerpt("héllo", 5), "héllo");
        assert_eq!(excerpt("héllo", 2), "hé...");
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
    }
}
