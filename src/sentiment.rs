use crate::constants::env::NEUTRAL_SENTIMENT;

/// Source of the observation's news channel.
///
/// Implementations must be deterministic for a given step so episodes stay
/// reproducible.
pub trait SentimentProvider: Send + Sync {
    fn news_signal(&self, step: usize) -> f32;
}

/// Always reports a neutral score
#[derive(Debug, Clone, Copy, Default)]
pub struct NeutralSentiment;

impl SentimentProvider for NeutralSentiment {
    fn news_signal(&self, _step: usize) -> f32 {
        NEUTRAL_SENTIMENT
    }
}

/// Precomputed per-row scores, neutral past the end of the series.
#[derive(Debug, Clone, Default)]
pub struct SentimentSeries {
    scores: Vec<f32>,
}

impl SentimentSeries {
    pub fn new(scores: Vec<f32>) -> Self {
        Self { scores }
    }
}

impl SentimentProvider for SentimentSeries {
    fn news_signal(&self, step: usize) -> f32 {
        match self.scores.get(step) {
            Some(score) if score.is_finite() => score.clamp(-1.0, 1.0),
            _ => NEUTRAL_SENTIMENT,
        }
    }
}
