use serde::{Deserialize, Serialize};

use super::domain::QuoteInput;

/// Per-dimension confidence sub-scores in `[0, 1]` produced by whatever
/// estimates the quote (the model itself is out of scope here). A missing
/// sub-score is treated as zero: absence of evidence is low confidence,
/// not neutral.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceSubScores {
    pub item_recognition: Option<f64>,
    pub quantity_estimation: Option<f64>,
    pub access_assessment: Option<f64>,
    pub pricing_model_fit: Option<f64>,
}

/// Source of sub-scores for a quote input, substituted in tests and
/// implemented by the service layer's heuristic (or a real model upstream).
pub trait ConfidenceSource: Send + Sync {
    fn sub_scores(&self, input: &QuoteInput) -> ConfidenceSubScores;
}

/// Relative weights for the four dimensions. Equal by default.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceWeights {
    pub item_recognition: f64,
    pub quantity_estimation: f64,
    pub access_assessment: f64,
    pub pricing_model_fit: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            item_recognition: 1.0,
            quantity_estimation: 1.0,
            access_assessment: 1.0,
            pricing_model_fit: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    pub const fn label(self) -> &'static str {
        match self {
            ConfidenceBand::High => "high",
            ConfidenceBand::Medium => "medium",
            ConfidenceBand::Low => "low",
        }
    }
}

/// Combined confidence verdict attached to AI-assisted quotes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceScore {
    pub item_recognition: f64,
    pub quantity_estimation: f64,
    pub access_assessment: f64,
    pub pricing_model_fit: f64,
    pub overall: f64,
    pub band: ConfidenceBand,
    pub review_required: bool,
}

const HIGH_THRESHOLD: f64 = 0.8;
const MEDIUM_THRESHOLD: f64 = 0.6;

/// Weighted aggregation of the sub-scores into an overall confidence and a
/// review decision. Only `overall >= 0.8` is released for automatic
/// processing; everything below stays flagged for a human.
pub fn score(sub_scores: ConfidenceSubScores, weights: &ConfidenceWeights) -> ConfidenceScore {
    let item_recognition = sub_scores.item_recognition.unwrap_or(0.0).clamp(0.0, 1.0);
    let quantity_estimation = sub_scores.quantity_estimation.unwrap_or(0.0).clamp(0.0, 1.0);
    let access_assessment = sub_scores.access_assessment.unwrap_or(0.0).clamp(0.0, 1.0);
    let pricing_model_fit = sub_scores.pricing_model_fit.unwrap_or(0.0).clamp(0.0, 1.0);

    let weight_sum = weights.item_recognition
        + weights.quantity_estimation
        + weights.access_assessment
        + weights.pricing_model_fit;
    let overall = if weight_sum > 0.0 {
        (item_recognition * weights.item_recognition
            + quantity_estimation * weights.quantity_estimation
            + access_assessment * weights.access_assessment
            + pricing_model_fit * weights.pricing_model_fit)
            / weight_sum
    } else {
        0.0
    };

    let band = if overall >= HIGH_THRESHOLD {
        ConfidenceBand::High
    } else if overall >= MEDIUM_THRESHOLD {
        ConfidenceBand::Medium
    } else {
        ConfidenceBand::Low
    };

    ConfidenceScore {
        item_recognition,
        quantity_estimation,
        access_assessment,
        pricing_model_fit,
        overall,
        band,
        review_required: band != ConfidenceBand::High,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all(scores: [f64; 4]) -> ConfidenceSubScores {
        ConfidenceSubScores {
            item_recognition: Some(scores[0]),
            quantity_estimation: Some(scores[1]),
            access_assessment: Some(scores[2]),
            pricing_model_fit: Some(scores[3]),
        }
    }

    #[test]
    fn medium_band_still_requires_review() {
        let verdict = score(all([0.9, 0.85, 0.3, 0.8]), &ConfidenceWeights::default());
        assert!((verdict.overall - 0.7125).abs() < 1e-9);
        assert_eq!(verdict.band, ConfidenceBand::Medium);
        assert!(verdict.review_required);
    }

    #[test]
    fn high_band_releases_for_automatic_processing() {
        let verdict = score(all([0.9, 0.85, 0.8, 0.9]), &ConfidenceWeights::default());
        assert_eq!(verdict.band, ConfidenceBand::High);
        assert!(!verdict.review_required);
    }

    #[test]
    fn missing_sub_scores_pull_the_overall_down() {
        let sub_scores = ConfidenceSubScores {
            item_recognition: Some(1.0),
            quantity_estimation: Some(1.0),
            access_assessment: None,
            pricing_model_fit: None,
        };
        let verdict = score(sub_scores, &ConfidenceWeights::default());
        assert!((verdict.overall - 0.5).abs() < 1e-9);
        assert_eq!(verdict.band, ConfidenceBand::Low);
        assert!(verdict.review_required);
    }

    #[test]
    fn weights_shift_the_aggregate() {
        let weights = ConfidenceWeights {
            access_assessment: 0.0,
            ..ConfidenceWeights::default()
        };
        let verdict = score(all([0.9, 0.9, 0.1, 0.9]), &weights);
        assert!((verdict.overall - 0.9).abs() < 1e-9);
        assert_eq!(verdict.band, ConfidenceBand::High);
    }
}
