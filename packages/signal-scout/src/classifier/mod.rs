//! Content classifier: decides whether a fetched page looks like the
//! target profile before it is worth verifying.

pub mod features;
pub mod model;

pub use features::{FeatureExtractor, Features};
pub use model::LinearModel;

use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{ClassifyError, ScoutError};
use crate::types::{ClassificationResult, ClassifierConfig, ConfidenceBand, FetchedPage, Verdict};

/// Feature extraction plus a shared, immutable model.
///
/// Cheap to clone; every clone shares the same model.
#[derive(Debug, Clone)]
pub struct ContentClassifier {
    extractor: FeatureExtractor,
    model: Arc<LinearModel>,
    threshold: f32,
}

impl ContentClassifier {
    /// Load the configured artifact, or the baseline model when none is set.
    pub fn from_config(config: &ClassifierConfig) -> Result<Self, ScoutError> {
        let model = match &config.model_path {
            Some(path) => LinearModel::load(path)?,
            None => LinearModel::baseline(),
        };
        let classifier = Self::new(config, model);
        info!(
            model_version = classifier.model_version(),
            features = classifier.model.weights.len(),
            threshold = classifier.threshold(),
            "Classifier model loaded"
        );
        Ok(classifier)
    }

    /// The artifact's own threshold wins over `ai_confidence_threshold`.
    pub fn new(config: &ClassifierConfig, model: LinearModel) -> Self {
        Self {
            extractor: FeatureExtractor::new(config),
            threshold: model.threshold.unwrap_or(config.ai_confidence_threshold),
            model: Arc::new(model),
        }
    }

    pub fn model_version(&self) -> &str {
        &self.model.version
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Classify a fetched page. Pure in the page content.
    pub fn classify(&self, page: &FetchedPage) -> Result<ClassificationResult, ClassifyError> {
        if !page.is_html() {
            return Err(ClassifyError::NotHtml {
                url: page.url.to_string(),
                content_type: page.content_type.clone().unwrap_or_default(),
            });
        }
        if page.body.trim().is_empty() {
            return Err(ClassifyError::EmptyContent {
                url: page.url.to_string(),
            });
        }

        let features = self.extractor.extract(&page.final_url, &page.body);
        let probability = self.model.predict(&features);
        let verdict = if probability >= self.threshold {
            Verdict::Positive
        } else {
            Verdict::Negative
        };

        debug!(
            url = %page.url,
            probability,
            verdict = ?verdict,
            "Page classified"
        );

        Ok(ClassificationResult {
            url: page.url.clone(),
            probability,
            verdict,
            band: ConfidenceBand::from_probability(probability),
            model_version: self.model.version.clone(),
            features: features.into_map(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    const STREAM_PAGE: &str = r#"<html>
        <head><title>Watch NBA Live Stream Free</title>
        <meta name="description" content="Live sports streams, NFL, NBA and soccer schedule"></head>
        <body>
          <div id="player"><video src="live.m3u8"></video></div>
          <iframe src="https://embed.example/stream/1"></iframe>
          <script src="https://cdn.jwplayer.com/player.js"></script>
          <p>Watch live NBA games tonight. Live streams for every match on the schedule.</p>
        </body></html>"#;

    const BLOG_PAGE: &str = r#"<html>
        <head><title>Grandma's kitchen</title></head>
        <body><article><h1>Sourdough</h1><p>Mix flour and water, then wait a day before baking the loaf.</p></article></body>
        </html>"#;

    fn page(body: &str) -> FetchedPage {
        let url = Url::parse("https://site.example/").unwrap();
        FetchedPage::new(url.clone(), url, 200, Some("text/html".into()), body.to_string())
    }

    fn classifier() -> ContentClassifier {
        ContentClassifier::from_config(&ClassifierConfig::default()).unwrap()
    }

    #[test]
    fn test_streaming_page_is_positive() {
        let result = classifier().classify(&page(STREAM_PAGE)).unwrap();
        assert!(result.probability >= 0.7, "p = {}", result.probability);
        assert!(result.is_positive());
        assert_eq!(result.model_version, "baseline-1");
    }

    #[test]
    fn test_blog_page_is_negative() {
        let result = classifier().classify(&page(BLOG_PAGE)).unwrap();
        assert!(result.probability < 0.3, "p = {}", result.probability);
        assert_eq!(result.verdict, Verdict::Negative);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let c = classifier();
        let a = c.classify(&page(STREAM_PAGE)).unwrap();
        let b = c.classify(&page(STREAM_PAGE)).unwrap();
        assert_eq!(a.probability, b.probability);
        assert_eq!(a.features, b.features);
    }

    #[test]
    fn test_empty_and_non_html_are_errors() {
        let c = classifier();
        assert!(matches!(c.classify(&page("   ")), Err(ClassifyError::EmptyContent { .. })));

        let url = Url::parse("https://site.example/file.pdf").unwrap();
        let pdf = FetchedPage::new(url.clone(), url, 200, Some("application/pdf".into()), "%PDF".into());
        assert!(matches!(c.classify(&pdf), Err(ClassifyError::NotHtml { .. })));
    }

    #[test]
    fn test_threshold_is_configurable() {
        let config = ClassifierConfig {
            ai_confidence_threshold: 0.999_999,
            ..ClassifierConfig::default()
        };
        let c = ContentClassifier::from_config(&config).unwrap();
        let result = c.classify(&page(BLOG_PAGE)).unwrap();
        assert_eq!(result.verdict, Verdict::Negative);
    }

    #[test]
    fn test_model_threshold_overrides_config() {
        let model = LinearModel {
            threshold: Some(0.0),
            ..LinearModel::baseline()
        };
        let c = ContentClassifier::new(&ClassifierConfig::default(), model);
        assert_eq!(c.threshold(), 0.0);
        assert_eq!(c.model_version(), "baseline-1");
        assert!(c.classify(&page(BLOG_PAGE)).unwrap().is_positive());

        let c = ContentClassifier::new(&ClassifierConfig::default(), LinearModel::baseline());
        assert_eq!(c.threshold(), 0.7);
    }
}
