//! Vote values

use serde::{Deserialize, Serialize};

/// The card that stands for "no idea"
pub const UNKNOWN_CARD: &str = "?";

/// A card cast by a participant. Validated against the deck before it is
/// written; see [`crate::Deck::card`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vote(String);

impl Vote {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN_CARD
    }

    /// Numeric value of the card, `None` for "?" and other non-numeric cards
    pub fn numeric(&self) -> Option<f64> {
        if self.is_unknown() {
            return None;
        }
        self.0.trim().parse::<f64>().ok().filter(|v| v.is_finite())
    }
}

impl From<&str> for Vote {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for Vote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
