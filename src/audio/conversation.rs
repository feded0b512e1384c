use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const NO_RESPONSE_TEXT: &str = "No response generated";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Bot,
}

/// One utterance in the conversation log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub speaker: Speaker,
    pub text: String,
    pub confidence: Option<f64>,
    pub is_flagged: Option<bool>,
    /// When the exchange arrived
    pub at: DateTime<Utc>,
}

/// Aggregate over the bot's turns, computed on request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioSummary {
    pub average_confidence: f64,
    pub total_messages: usize,
    pub flagged_count: usize,
}

/// Ordered log of the current audio session
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<ConversationTurn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one completed exchange
    ///
    /// The user's words are logged first when the service echoed a transcription.
    pub fn push_exchange(
        &mut self,
        transcription: Option<String>,
        response: Option<String>,
        confidence: Option<f64>,
        is_flagged: Option<bool>,
    ) {
        let at = Utc::now();

        if let Some(heard) = transcription.filter(|t| !t.trim().is_empty()) {
            self.turns.push(ConversationTurn {
                speaker: Speaker::User,
                text: heard,
                confidence: None,
                is_flagged: None,
                at,
            });
        }

        self.turns.push(ConversationTurn {
            speaker: Speaker::Bot,
            text: response
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| NO_RESPONSE_TEXT.to_string()),
            confidence,
            is_flagged,
            at,
        });
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Summary over bot turns; zeroed when the bot has not spoken yet
    pub fn summary(&self) -> AudioSummary {
        let bot_turns: Vec<&ConversationTurn> = self
            .turns
            .iter()
            .filter(|t| t.speaker == Speaker::Bot)
            .collect();

        if bot_turns.is_empty() {
            return AudioSummary::default();
        }

        let total_confidence: f64 = bot_turns.iter().map(|t| t.confidence.unwrap_or(0.0)).sum();
        let flagged_count = bot_turns
            .iter()
            .filter(|t| t.is_flagged == Some(true))
            .count();

        AudioSummary {
            average_confidence: total_confidence / bot_turns.len() as f64,
            total_messages: bot_turns.len(),
            flagged_count,
        }
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}
