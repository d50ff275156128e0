//! The deck of cards a room votes with

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{Vote, UNKNOWN_CARD};

/// Standard planning poker deck
pub const DEFAULT_DECK: [&str; 8] = ["1", "2", "3", "5", "8", "13", "21", UNKNOWN_CARD];

/// Ordered set of allowed vote values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Deck {
    cards: Vec<String>,
}

impl Deck {
    pub fn new<I, S>(cards: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let deck = Self {
            cards: cards.into_iter().map(Into::into).collect(),
        };
        deck.validate()?;
        Ok(deck)
    }

    /// Check the deck is usable: non-empty, no blank or duplicate cards
    pub fn validate(&self) -> Result<()> {
        if self.cards.is_empty() {
            return Err(Error::Config("deck must contain at least one card".into()));
        }
        for (i, card) in self.cards.iter().enumerate() {
            if card.trim().is_empty() {
                return Err(Error::Config("deck contains a blank card".into()));
            }
            if self.cards[..i].contains(card) {
                return Err(Error::Config(format!("deck contains '{}' twice", card)));
            }
        }
        Ok(())
    }

    /// Look up a card by its literal value
    pub fn card(&self, value: &str) -> Result<Vote> {
        if self.contains(value) {
            Ok(Vote::from(value))
        } else {
            Err(Error::InvalidVote(format!(
                "'{}' is not in the deck [{}]",
                value,
                self.cards.join(", ")
            )))
        }
    }

    pub fn contains(&self, value: &str) -> bool {
        self.cards.iter().any(|c| c == value)
    }

    pub fn cards(&self) -> &[String] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

impl Default for Deck {
    fn default() -> Self {
        Self {
            cards: DEFAULT_DECK.iter().map(|c| c.to_string()).collect(),
        }
    }
}
