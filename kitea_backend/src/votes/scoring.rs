//! Derived figures over vote counters. Nothing here writes.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SafetyRating {
    Safe,
    Warning,
    Neutral,
}

pub fn safety_score(red_flags: i64, green_flags: i64) -> i64 {
    green_flags - red_flags
}

pub fn safety_rating(red_flags: i64, green_flags: i64) -> SafetyRating {
    match green_flags.cmp(&red_flags) {
        Ordering::Greater => SafetyRating::Safe,
        Ordering::Less => SafetyRating::Warning,
        Ordering::Equal => SafetyRating::Neutral,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagPercentages {
    pub red_flag_percentage: i64,
    pub green_flag_percentage: i64,
}

/// Share of each flag kind in whole percent, rounding halves up. With no
/// votes the denominator is floored at one, so both shares read 0.
pub fn flag_percentages(red_flags: i64, green_flags: i64) -> FlagPercentages {
    let total = (red_flags + green_flags).max(1) as f64;
    let share = |count: i64| ((count as f64 / total) * 100.0).round() as i64;
    FlagPercentages {
        red_flag_percentage: share(red_flags),
        green_flag_percentage: share(green_flags),
    }
}

pub fn comment_score(upvotes: i64, downvotes: i64) -> i64 {
    upvotes - downvotes
}

pub fn comment_engagement(upvotes: i64, downvotes: i64) -> i64 {
    upvotes + downvotes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_follows_counter_comparison() {
        for red in 0..30 {
            for green in 0..30 {
                let expected = if green > red {
                    SafetyRating::Safe
                } else if red > green {
                    SafetyRating::Warning
                } else {
                    SafetyRating::Neutral
                };
                assert_eq!(safety_rating(red, green), expected, "red={red} green={green}");
                assert_eq!(safety_score(red, green), green - red);
            }
        }
        assert_eq!(safety_rating(0, 0), SafetyRating::Neutral);
    }

    #[test]
    fn percentages_are_zero_without_votes() {
        assert_eq!(
            flag_percentages(0, 0),
            FlagPercentages {
                red_flag_percentage: 0,
                green_flag_percentage: 0
            }
        );
    }

    #[test]
    fn percentages_stay_within_rounding_slack() {
        for red in 0..60 {
            for green in 0..60 {
                if red + green == 0 {
                    continue;
                }
                let pct = flag_percentages(red, green);
                let sum = pct.red_flag_percentage + pct.green_flag_percentage;
                assert!((99..=101).contains(&sum), "red={red} green={green} sum={sum}");
                assert!((0..=100).contains(&pct.red_flag_percentage));
                assert!((0..=100).contains(&pct.green_flag_percentage));
            }
        }
    }

    #[test]
    fn halves_round_up() {
        let pct = flag_percentages(1, 1);
        assert_eq!(pct.red_flag_percentage, 50);
        let pct = flag_percentages(1, 7);
        // 12.5 -> 13, 87.5 -> 88
        assert_eq!(pct.red_flag_percentage, 13);
        assert_eq!(pct.green_flag_percentage, 88);
    }

    #[test]
    fn comment_figures() {
        assert_eq!(comment_score(1, 1), 0);
        assert_eq!(comment_engagement(1, 1), 2);
        assert_eq!(comment_score(0, 3), -3);
    }
}
