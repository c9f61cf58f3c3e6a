//! Logistic-regression model artifact.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::features::Features;
use crate::error::ClassifyError;

/// A versioned linear model over named features.
///
/// Serialized as JSON:
///
/// ```json
/// { "version": "2024-06-01", "bias": -4.0, "weights": { "has_video_tag": 2.0 }, "threshold": 0.8 }
/// ```
///
/// A `threshold` shipped with the artifact replaces the configured one.
/// Features absent from `weights` are ignored; weights naming features the
/// extractor never produces contribute nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub version: String,
    pub bias: f32,
    pub weights: BTreeMap<String, f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f32>,
}

impl LinearModel {
    /// Load and validate an artifact from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ClassifyError> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| ClassifyError::InvalidModel {
            reason: format!("{}: {e}", path.as_ref().display()),
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ClassifyError> {
        let model: Self = serde_json::from_str(raw).map_err(|e| ClassifyError::InvalidModel {
            reason: e.to_string(),
        })?;
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<(), ClassifyError> {
        if !self.bias.is_finite() {
            return Err(ClassifyError::InvalidModel {
                reason: "bias is not finite".to_string(),
            });
        }
        if let Some((name, _)) = self.weights.iter().find(|(_, w)| !w.is_finite()) {
            return Err(ClassifyError::InvalidModel {
                reason: format!("weight for {name} is not finite"),
            });
        }
        if let Some(threshold) = self.threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(ClassifyError::InvalidModel {
                    reason: format!("threshold {threshold} is outside [0, 1]"),
                });
            }
        }
        Ok(())
    }

    /// Built-in model used when no artifact is configured.
    ///
    /// Hand-weighted towards pages that embed players and talk about live
    /// sports; plain content pages land well below 0.5.
    pub fn baseline() -> Self {
        let weights = [
            ("has_video_tag", 2.0),
            ("has_iframe", 1.5),
            ("has_embed", 0.5),
            ("has_object", 0.3),
            ("has_jwplayer", 1.5),
            ("has_videojs", 1.5),
            ("has_hls", 1.5),
            ("has_streaming_js", 1.0),
            ("keyword_density_total", 25.0),
            ("title_has_keyword", 1.0),
            ("meta_has_keyword", 0.5),
            ("url_has_keyword", 0.5),
            ("text_to_html_ratio", -1.0),
        ]
        .into_iter()
        .map(|(k, w)| (k.to_string(), w))
        .collect();

        Self {
            version: "baseline-1".to_string(),
            bias: -4.0,
            weights,
            threshold: None,
        }
    }

    /// Probability in [0, 1].
    pub fn predict(&self, features: &Features) -> f32 {
        let logit = self
            .weights
            .iter()
            .fold(self.bias, |acc, (name, weight)| acc + weight * features.get(name));
        sigmoid(logit)
    }
}

fn sigmoid(x: f32) -> f32 {
    let p = 1.0 / (1.0 + (-x).exp());
    if p.is_nan() {
        0.0
    } else {
        p.clamp(0.0, 1.0)
    }
}
