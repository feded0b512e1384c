use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One emotion inference result from the video service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoObservation {
    pub emotion: String,
    /// Likelihood contribution in [0, 1]
    pub score: f64,
    /// Server-side timestamp, passed through untouched
    pub timestamp: String,
}

/// Derived view over every observation in the current video session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoStats {
    pub dominant_emotion: Option<String>,
    /// 0.0 while no observations exist
    pub average_score: f64,
    pub observation_count: usize,
}

impl Default for VideoStats {
    fn default() -> Self {
        Self {
            dominant_emotion: None,
            average_score: 0.0,
            observation_count: 0,
        }
    }
}

/// Running tally behind `VideoStats`
///
/// Dominant emotion is the label with the highest count; among labels with
/// equal counts the lexicographically smallest wins, so the result does not
/// depend on arrival order.
#[derive(Debug, Clone, Default)]
pub struct EmotionTally {
    counts: HashMap<String, usize>,
    score_sum: f64,
    total: usize,
    dominant: Option<(String, usize)>,
}

impl EmotionTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, observation: &VideoObservation) {
        let count = self.counts.entry(observation.emotion.clone()).or_insert(0);
        *count += 1;
        let count = *count;

        self.score_sum += observation.score;
        self.total += 1;

        let takes_lead = match &self.dominant {
            None => true,
            Some((label, best)) => {
                count > *best || (count == *best && observation.emotion.as_str() < label.as_str())
            }
        };

        if takes_lead {
            self.dominant = Some((observation.emotion.clone(), count));
        }
    }

    pub fn stats(&self) -> VideoStats {
        VideoStats {
            dominant_emotion: self.dominant.as_ref().map(|(label, _)| label.clone()),
            average_score: if self.total == 0 {
                0.0
            } else {
                self.score_sum / self.total as f64
            },
            observation_count: self.total,
        }
    }

    pub fn count_of(&self, emotion: &str) -> usize {
        self.counts.get(emotion).copied().unwrap_or(0)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
