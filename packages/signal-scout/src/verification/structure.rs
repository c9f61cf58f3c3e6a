//! Structural fingerprinting stage: markup that streaming portals share.

use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::StageReport;

lazy_static! {
    static ref VIDEO: Selector = Selector::parse("video").expect("static selector");
    static ref IFRAME: Selector = Selector::parse("iframe").expect("static selector");
    static ref DIV: Selector = Selector::parse("div").expect("static selector");
    static ref SCRIPT: Selector = Selector::parse("script").expect("static selector");
    static ref TABLE: Selector = Selector::parse("table").expect("static selector");
    static ref SCHEDULE_CLASS: Regex = Regex::new(r"(?i)schedule").expect("static regex");
    static ref GAMES_CLASS: Regex = Regex::new(r"(?i)games|matches").expect("static regex");
}

const PLAYER_SRC_MARKERS: [&str; 4] = ["player", "stream", "video", "embed"];
const PLAYER_SCRIPT_MARKERS: [&str; 4] = ["player", "video", "stream", "jwplayer"];
const CONTAINER_NAMES: [&str; 6] = ["player", "video-player", "stream", "schedule", "games", "matches"];

/// Score the document's structure. Raw score in [0, 100].
pub fn fingerprint_dom(document: &Html) -> StageReport {
    let mut raw = 0u32;
    let mut indicators = Vec::new();

    let videos = document.select(&VIDEO).count();
    if videos > 0 {
        raw += 30;
        indicators.push(format!("video_tags_{videos}"));
    }

    let iframes: Vec<ElementRef> = document.select(&IFRAME).collect();
    if !iframes.is_empty() {
        raw += 25;
        indicators.push(format!("iframes_{}", iframes.len()));

        let player_iframe = iframes.iter().any(|f| {
            let src = f.value().attr("src").unwrap_or_default().to_lowercase();
            PLAYER_SRC_MARKERS.iter().any(|m| src.contains(m))
        });
        if player_iframe {
            raw += 15;
            indicators.push("streaming_iframe".to_string());
        }
    }

    let divs: Vec<ElementRef> = document.select(&DIV).collect();
    for name in CONTAINER_NAMES {
        if divs.iter().any(|d| d.value().id() == Some(name)) {
            raw += 10;
            indicators.push(format!("id_{name}"));
        }
        if divs.iter().any(|d| d.value().classes().any(|c| c == name)) {
            raw += 10;
            indicators.push(format!("class_{name}"));
        }
    }

    let player_script = document.select(&SCRIPT).any(|s| {
        let body = s.text().collect::<String>().to_lowercase();
        PLAYER_SCRIPT_MARKERS.iter().any(|m| body.contains(m))
    });
    if player_script {
        raw += 15;
        indicators.push("streaming_script".to_string());
    }

    if divs
        .iter()
        .any(|d| d.value().attr("class").is_some_and(|c| SCHEDULE_CLASS.is_match(c)))
    {
        raw += 20;
        indicators.push("schedule_div".to_string());
    }

    if document
        .select(&TABLE)
        .any(|t| t.value().attr("class").is_some_and(|c| GAMES_CLASS.is_match(c)))
    {
        raw += 20;
        indicators.push("games_table".to_string());
    }

    StageReport {
        raw: raw.min(100),
        indicators,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fingerprint(html: &str) -> StageReport {
        fingerprint_dom(&Html::parse_document(html))
    }

    #[test]
    fn test_plain_page_scores_zero() {
        let report = fingerprint("<html><body><p>Hello</p></body></html>");
        assert_eq!(report.raw, 0);
        assert!(report.indicators.is_empty());
    }

    #[test]
    fn test_video_and_player_iframe() {
        let report = fingerprint(
            r#"<html><body><video></video>
               <iframe src="https://x.example/EMBED/1"></iframe></body></html>"#,
        );
        // video 30 + iframe 25 + player iframe 15
        assert_eq!(report.raw, 70);
        assert!(report.indicators.contains(&"streaming_iframe".to_string()));
    }

    #[test]
    fn test_containers_schedule_and_tables() {
        let report = fingerprint(
            r#"<html><body>
               <div id="player"></div>
               <div class="schedule today"></div>
               <table class="upcoming-games"></table>
               </body></html>"#,
        );
        // id_player 10 + class_schedule 10 + schedule_div 20 + games_table 20
        assert_eq!(report.raw, 60);
    }

    #[test]
    fn test_inline_script_only_counts_once() {
        let report = fingerprint(
            r#"<html><body>
               <script>jwplayer("x").setup({})</script>
               <script>var video = 1;</script>
               </body></html>"#,
        );
        assert_eq!(report.raw, 15);
    }

    #[test]
    fn test_score_is_capped() {
        let report = fingerprint(
            r#"<html><body><video></video><iframe src="/player"></iframe>
               <div id="player" class="player stream"></div><div id="stream"></div>
               <div class="schedule"></div><table class="matches"></table>
               <script>player()</script></body></html>"#,
        );
        assert_eq!(report.raw, 100);
    }
}
