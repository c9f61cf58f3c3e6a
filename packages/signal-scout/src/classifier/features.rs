//! Feature extraction for the content classifier.
//!
//! Three families of named features are computed from one parse of the
//! page: technical indicators (players, embeds), content indicators
//! (keyword density, title and meta hits) and structure (links, scripts,
//! nesting). Feature names are the keys of the model's weight table.

use lazy_static::lazy_static;
use scraper::{Html, Selector};
use std::collections::BTreeMap;
use url::Url;

use crate::html;
use crate::types::ClassifierConfig;

lazy_static! {
    static ref VIDEO: Selector = Selector::parse("video").expect("static selector");
    static ref IFRAME: Selector = Selector::parse("iframe").expect("static selector");
    static ref EMBED: Selector = Selector::parse("embed").expect("static selector");
    static ref OBJECT: Selector = Selector::parse("object").expect("static selector");
    static ref SCRIPT: Selector = Selector::parse("script").expect("static selector");
    static ref STYLESHEET: Selector =
        Selector::parse(r#"link[rel="stylesheet"], style"#).expect("static selector");
}

/// Named feature values for one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Features(BTreeMap<String, f32>);

impl Features {
    pub fn get(&self, name: &str) -> f32 {
        self.0.get(name).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, name: impl Into<String>, value: f32) {
        self.0.insert(name.into(), value);
    }

    fn flag(&mut self, name: &str, on: bool) {
        self.set(name, if on { 1.0 } else { 0.0 });
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f32)> {
        self.0.iter()
    }

    pub fn into_map(self) -> BTreeMap<String, f32> {
        self.0
    }
}

/// Computes `Features` from raw HTML.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    target_keywords: Vec<String>,
    streaming_markers: Vec<String>,
}

impl FeatureExtractor {
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            target_keywords: lowercase_all(&config.target_keywords),
            streaming_markers: lowercase_all(&config.streaming_markers),
        }
    }

    pub fn extract(&self, url: &Url, body: &str) -> Features {
        let document = Html::parse_document(body);
        let mut features = Features::default();

        self.technical(&document, &mut features);
        self.content(url, &document, &mut features);
        self.structural(url, body, &document, &mut features);

        features
    }

    fn technical(&self, document: &Html, f: &mut Features) {
        let video_count = document.select(&VIDEO).count();
        let iframe_count = document.select(&IFRAME).count();
        f.flag("has_video_tag", video_count > 0);
        f.set("video_count", video_count as f32);
        f.flag("has_iframe", iframe_count > 0);
        f.set("iframe_count", iframe_count as f32);
        f.flag("has_embed", document.select(&EMBED).next().is_some());
        f.flag("has_object", document.select(&OBJECT).next().is_some());

        // Inline script bodies plus external script URLs.
        let scripts: String = document
            .select(&SCRIPT)
            .map(|s| {
                let mut text = s.text().collect::<String>();
                if let Some(src) = s.value().attr("src") {
                    text.push(' ');
                    text.push_str(src);
                }
                text.to_lowercase()
            })
            .collect::<Vec<_>>()
            .join(" ");

        f.flag("has_jwplayer", scripts.contains("jwplayer"));
        f.flag("has_videojs", scripts.contains("videojs") || scripts.contains("video.js"));
        f.flag("has_hls", scripts.contains("hls") || scripts.contains("m3u8"));
        f.flag(
            "has_streaming_js",
            self.streaming_markers.iter().any(|m| scripts.contains(m.as_str())),
        );
    }

    fn content(&self, url: &Url, document: &Html, f: &mut Features) {
        let text = html::visible_text(document);
        let words = html::words(&text);
        let total = words.len().max(1) as f32;

        let mut total_hits = 0usize;
        for keyword in &self.target_keywords {
            let hits = words.iter().filter(|w| w.starts_with(keyword.as_str())).count();
            total_hits += hits;
            f.set(format!("kw_{keyword}"), hits as f32 / total);
        }
        f.set("keyword_density_total", total_hits as f32 / total);
        f.set("word_count", words.len() as f32);

        let title = html::title(document).unwrap_or_default().to_lowercase();
        let meta = html::meta_description(document).unwrap_or_default().to_lowercase();
        let url_text = url.as_str().to_lowercase();
        f.flag("title_has_keyword", self.mentions_keyword(&title));
        f.flag("meta_has_keyword", self.mentions_keyword(&meta));
        f.flag("url_has_keyword", self.mentions_keyword(&url_text));
        f.set("title_length", title.chars().count() as f32);
    }

    fn structural(&self, url: &Url, body: &str, document: &Html, f: &mut Features) {
        let links = html::links(document, url);
        let host = url.host_str().unwrap_or_default();
        let external = links
            .iter()
            .filter(|l| l.url.host_str().is_some_and(|h| h != host))
            .count();
        let words = f.get("word_count").max(1.0);

        f.set("link_count", links.len() as f32);
        f.set("external_link_count", external as f32);
        f.set("link_density", links.len() as f32 * 100.0 / words);

        let text_len = html::visible_text(document).len() as f32;
        f.set("text_to_html_ratio", text_len / (body.len().max(1) as f32));
        f.set("script_count", document.select(&SCRIPT).count() as f32);
        f.set("css_count", document.select(&STYLESHEET).count() as f32);
        f.set("dom_depth", html::dom_depth(document) as f32);
        f.set(
            "path_depth",
            url.path_segments()
                .map(|s| s.filter(|p| !p.is_empty()).count())
                .unwrap_or(0) as f32,
        );
        f.set("domain_length", host.len() as f32);
    }

    fn mentions_keyword(&self, text: &str) -> bool {
        self.target_keywords.iter().any(|k| text.contains(k.as_str()))
    }
}

fn lowercase_all(items: &[String]) -> Vec<String> {
    items.iter().map(|s| s.to_lowercase()).collect()
}
