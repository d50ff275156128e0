//! Round statistics derived from revealed votes

use serde::{Deserialize, Serialize};

use crate::models::Participant;

/// Summary of the numeric votes in a revealed round
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoundStats {
    /// Mean, rounded to one decimal place
    pub average: f64,
    pub min: f64,
    pub max: f64,
    /// Every counted vote is the same value
    pub consensus: bool,
    /// Number of votes that went into the figures
    pub counted: usize,
}

/// Aggregate a roster snapshot.
///
/// Missing votes, "?" and any other non-numeric card are skipped. Returns
/// `None` when no numeric vote remains. The result does not depend on the
/// order of `roster`.
pub fn aggregate(roster: &[Participant]) -> Option<RoundStats> {
    let mut values: Vec<f64> = roster
        .iter()
        .filter_map(|p| p.vote.as_ref())
        .filter_map(|v| v.numeric())
        .collect();

    if values.is_empty() {
        return None;
    }

    // Sum in a fixed order so float addition is reorder-proof
    values.sort_by(|a, b| a.total_cmp(b));

    let count = values.len();
    let sum: f64 = values.iter().sum();
    let min = values[0];
    let max = values[count - 1];

    Some(RoundStats {
        average: round_one_decimal(sum / count as f64),
        min,
        max,
        consensus: min == max,
        counted: count,
    })
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ParticipantId, ParticipantPatch, Vote};
    use chrono::Utc;

    fn roster(votes: &[Option<&str>]) -> Vec<Participant> {
        votes
            .iter()
            .enumerate()
            .map(|(i, vote)| {
                let mut p = ParticipantPatch::register(format!("p{}", i))
                    .create(ParticipantId::new(), Utc::now())
                    .unwrap();
                p.vote = vote.map(Vote::from);
                p
            })
            .collect()
    }

    #[test]
    fn test_unanimous_round() {
        let stats = aggregate(&roster(&[Some("5"), Some("5"), Some("5")])).unwrap();
        assert_eq!(stats.average, 5.0);
        assert_eq!(stats.min, 5.0);
        assert_eq!(stats.max, 5.0);
        assert!(stats.consensus);
        assert_eq!(stats.counted, 3);
    }

    #[test]
    fn test_unknown_card_excluded() {
        let stats = aggregate(&roster(&[Some("3"), Some("5"), Some("?")])).unwrap();
        assert_eq!(stats.average, 4.0);
        assert_eq!(stats.min, 3.0);
        assert_eq!(stats.max, 5.0);
        assert!(!stats.consensus);
        assert_eq!(stats.counted, 2);
    }

    #[test]
    fn test_average_rounds_to_one_decimal() {
        let stats = aggregate(&roster(&[Some("1"), Some("2"), Some("2")])).unwrap();
        assert_eq!(stats.average, 1.7);

        let stats = aggregate(&roster(&[Some("5"), Some("8")])).unwrap();
        assert_eq!(stats.average, 6.5);
    }

    #[test]
    fn test_no_numeric_votes() {
        assert!(aggregate(&[]).is_none());
        assert!(aggregate(&roster(&[None, None])).is_none());
        assert!(aggregate(&roster(&[Some("?"), None, Some("?")])).is_none());
    }

    #[test]
    fn test_missing_votes_ignored() {
        let stats = aggregate(&roster(&[Some("13"), None])).unwrap();
        assert_eq!(stats.counted, 1);
        assert!(stats.consensus);
    }

    #[test]
    fn test_order_independent() {
        let mut players = roster(&[Some("1"), Some("21"), Some("?"), Some("8"), None, Some("3")]);
        let forward = aggregate(&players);
        players.reverse();
        assert_eq!(aggregate(&players), forward);
        players.rotate_left(2);
        assert_eq!(aggregate(&players), forward);
    }
}
