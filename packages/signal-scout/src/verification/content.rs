//! Content analysis stage: weighted keyword hits in the title and meta
//! description.

use indexmap::IndexMap;
use scraper::Html;

use super::StageReport;
use crate::html;

/// Score title and meta description against weighted keywords.
///
/// Raw score in [0, 100]. A bonus is added when more than three keywords
/// match.
pub fn analyze_content(document: &Html, keywords: &IndexMap<String, u32>, indicator_bonus: u32) -> StageReport {
    let title = html::title(document).unwrap_or_default();
    let description = html::meta_description(document).unwrap_or_default();
    let text = format!("{title} {description}").to_lowercase();

    let mut raw = 0u32;
    let mut indicators = Vec::new();
    for (keyword, weight) in keywords {
        if text.contains(keyword.to_lowercase().as_str()) {
            raw = raw.saturating_add(*weight);
            indicators.push(format!("keyword_{keyword}"));
        }
    }
    if indicators.len() > 3 {
        raw = raw.saturating_add(indicator_bonus);
    }

    StageReport {
        raw: raw.min(100),
        indicators,
    }
}
