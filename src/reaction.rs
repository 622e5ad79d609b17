//! Reaction events and chat message classification
//!
//! Viewers vote on a joke by typing `+2` or `-2` in chat. Every other message is noise.

use serde::{Deserialize, Serialize};

/// Token that marks a positive reaction
pub const POSITIVE_TOKEN: &str = "+2";

/// Token that marks a negative reaction
pub const NEGATIVE_TOKEN: &str = "-2";

/// Points a single reaction moves the score by
pub const REACTION_WEIGHT: i64 = 2;

/// Direction of a reaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Positive,
    Negative,
}

impl Polarity {
    /// Signed contribution to the net score
    #[must_use]
    pub const fn delta(self) -> i64 {
        match self {
            Self::Positive => REACTION_WEIGHT,
            Self::Negative => -REACTION_WEIGHT,
        }
    }

    /// Whether this is a positive reaction
    #[must_use]
    pub const fn is_positive(self) -> bool {
        matches!(self, Self::Positive)
    }
}

/// Classify a chat message
///
/// `+2` is checked before `-2`, so a message carrying both counts as positive.
#[must_use]
pub fn classify(text: &str) -> Option<Polarity> {
    if text.contains(POSITIVE_TOKEN) {
        Some(Polarity::Positive)
    } else if text.contains(NEGATIVE_TOKEN) {
        Some(Polarity::Negative)
    } else {
        None
    }
}

/// A classified audience reaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionEvent {
    /// Message identifier assigned by the chat source
    pub id: String,

    /// Send time in milliseconds since the Unix epoch
    pub posted_at: i64,

    /// Vote direction
    pub polarity: Polarity,

    /// Original message text
    pub text: String,
}

impl ReactionEvent {
    /// Classify `text` and build an event from it
    ///
    /// Returns `None` when the message is not a reaction.
    #[must_use]
    pub fn from_message(id: impl Into<String>, posted_at: i64, text: &str) -> Option<Self> {
        classify(text).map(|polarity| Self {
            id: id.into(),
            posted_at,
            polarity,
            text: text.to_string(),
        })
    }

    /// Build an event with a known polarity
    #[must_use]
    pub fn new(id: impl Into<String>, posted_at: i64, polarity: Polarity) -> Self {
        let text = match polarity {
            Polarity::Positive => POSITIVE_TOKEN,
            Polarity::Negative => NEGATIVE_TOKEN,
        };
        Self {
            id: id.into(),
            posted_at,
            polarity,
            text: text.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_tokens() {
        assert_eq!(classify("+2"), Some(Polarity::Positive));
        assert_eq!(classify("that was great +2 lol"), Some(Polarity::Positive));
        assert_eq!(classify("-2"), Some(Polarity::Negative));
        assert_eq!(classify("nah -2"), Some(Polarity::Negative));
    }

    #[test]
    fn test_classify_ignores_other_messages() {
        assert_eq!(classify("hello chat"), None);
        assert_eq!(classify(""), None);
        assert_eq!(classify("+1"), None);
        assert_eq!(classify("2"), None);
    }

    #[test]
    fn test_positive_wins_when_both_present() {
        assert_eq!(classify("-2 no wait +2"), Some(Polarity::Positive));
        assert_eq!(classify("+2 -2"), Some(Polarity::Positive));
    }

    #[test]
    fn test_polarity_delta() {
        assert_eq!(Polarity::Positive.delta(), 2);
        assert_eq!(Polarity::Negative.delta(), -2);
        assert!(Polarity::Positive.is_positive());
        assert!(!Polarity::Negative.is_positive());
    }

    #[test]
    fn test_from_message() {
        let event = ReactionEvent::from_message("abc", 1_000, "LUL +2").unwrap();
        assert_eq!(event.id, "abc");
        assert_eq!(event.posted_at, 1_000);
        assert_eq!(event.polarity, Polarity::Positive);
        assert_eq!(event.text, "LUL +2");

        assert!(ReactionEvent::from_message("def", 1_000, "just chatting").is_none());
    }
}
