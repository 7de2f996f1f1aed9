//! Card Selection
//!
//! Picks the next card of a study session from a pool of candidates.
//!
//! Core principles:
//! - Every candidate gets a keep weight in `[0, 1]`
//! - A candidate is drawn uniformly and kept with probability equal to its
//!   weight, otherwise the draw is repeated (rejection sampling)
//! - The resulting distribution is proportional to the keep weights
//!
//! Weighting (accuracy-weighted style):
//! - Never attempted cards get weight 1
//! - Otherwise `(1 - correct / (total + 1)) * (total / max_total)`, so cards
//!   attempted often and missed are favored and well-known cards fade out
//! - A mastered card (every attempt correct, attempt count equal to the pool
//!   maximum) gets weight 0
//!
//! The loop is bounded. When every weight is zero, or the attempt budget runs
//! out, the selector falls back to a plain uniform draw and says so in the
//! returned [`SelectionOutcome`].

use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::sanitize::{all_weights_zero, clamp_probability, sanitize_stats, sanitize_weights};
use crate::types::{
    AccuracyStats, Candidate, CardId, SelectionStyle, DEFAULT_MAX_ATTEMPTS,
    PARALLEL_WEIGHT_THRESHOLD,
};

// ==================== Data Structures ====================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectError {
    #[error("candidate pool is empty")]
    EmptyPool,
}

/// Why the selector stopped sampling and drew uniformly instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// No candidate can ever be accepted.
    AllZeroWeights,
    /// The attempt budget ran out before a draw was accepted.
    AttemptsExhausted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SelectionOutcome {
    Accepted,
    Fallback { reason: FallbackReason },
}

impl SelectionOutcome {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// Result of one selection.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    /// Position of the chosen candidate in the input slice.
    pub index: usize,
    pub card_id: CardId,
    pub stats: AccuracyStats,
    pub outcome: SelectionOutcome,
    /// Rejection-sampling draws made (0 when weights were all zero).
    pub attempts: u32,
}

/// Selector configuration options
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CardSelectorOptions {
    /// Maximum rejection-sampling draws (default: [`DEFAULT_MAX_ATTEMPTS`])
    pub max_attempts: Option<u32>,
}

// ==================== Weights ====================

/// Keep weight of a single card given the largest attempt count in its pool.
pub fn keep_weight(stats: AccuracyStats, max_total: u32) -> f64 {
    let stats = sanitize_stats(stats);

    if is_mastered(stats, max_total) {
        return 0.0;
    }

    let (accuracy_rate, attempt_freq) = if max_total == 0 || stats.total == 0 {
        (0.0, 1.0)
    } else {
        let total = f64::from(stats.total);
        (
            f64::from(stats.correct) / (total + 1.0),
            total / f64::from(max_total),
        )
    };

    clamp_probability((1.0 - accuracy_rate) * attempt_freq)
}

/// Every attempt correct and attempted as often as the most practiced card.
pub fn is_mastered(stats: AccuracyStats, max_total: u32) -> bool {
    stats.total > 0 && stats.correct == stats.total && stats.total == max_total
}

/// Keep weights for a whole pool, in candidate order.
pub fn compute_keep_weights(style: SelectionStyle, candidates: &[Candidate]) -> Vec<f64> {
    if style == SelectionStyle::Uniform {
        return vec![1.0; candidates.len()];
    }

    let max_total = candidates
        .iter()
        .map(|c| c.stats.total)
        .max()
        .unwrap_or(0);

    let mut weights: Vec<f64> = if candidates.len() >= PARALLEL_WEIGHT_THRESHOLD {
        candidates
            .par_iter()
            .map(|c| keep_weight(c.stats, max_total))
            .collect()
    } else {
        candidates
            .iter()
            .map(|c| keep_weight(c.stats, max_total))
            .collect()
    };

    sanitize_weights(&mut weights);
    weights
}

// ==================== Main Implementation ====================

#[derive(Clone, Debug)]
pub struct CardSelector {
    max_attempts: u32,
}

impl CardSelector {
    pub fn new() -> Self {
        Self::with_options(CardSelectorOptions::default())
    }

    pub fn with_options(options: CardSelectorOptions) -> Self {
        Self {
            max_attempts: options.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS).max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Pick one candidate.
    ///
    /// Always returns a member of `candidates`; a single candidate is always
    /// returned regardless of its weight.
    pub fn select<R: Rng>(
        &self,
        style: SelectionStyle,
        candidates: &[Candidate],
        rng: &mut R,
    ) -> Result<Selection, SelectError> {
        if candidates.is_empty() {
            return Err(SelectError::EmptyPool);
        }

        if candidates.len() == 1 || style == SelectionStyle::Uniform {
            let index = rng.random_range(0..candidates.len());
            return Ok(Self::selection(candidates, index, SelectionOutcome::Accepted, 1));
        }

        let weights = compute_keep_weights(style, candidates);
        if all_weights_zero(&weights) {
            let index = rng.random_range(0..candidates.len());
            return Ok(Self::selection(
                candidates,
                index,
                SelectionOutcome::Fallback {
                    reason: FallbackReason::AllZeroWeights,
                },
                0,
            ));
        }

        Ok(self.sample(candidates, &weights, rng))
    }

    fn sample<R: Rng>(&self, candidates: &[Candidate], weights: &[f64], rng: &mut R) -> Selection {
        for attempt in 1..=self.max_attempts {
            let index = rng.random_range(0..candidates.len());
            let draw: f64 = rng.random();
            if draw < weights[index] {
                return Self::selection(candidates, index, SelectionOutcome::Accepted, attempt);
            }
        }

        let index = rng.random_range(0..candidates.len());
        Self::selection(
            candidates,
            index,
            SelectionOutcome::Fallback {
                reason: FallbackReason::AttemptsExhausted,
            },
            self.max_attempts,
        )
    }

    fn selection(
        candidates: &[Candidate],
        index: usize,
        outcome: SelectionOutcome,
        attempts: u32,
    ) -> Selection {
        let candidate = candidates[index];
        Selection {
            index,
            card_id: candidate.card_id,
            stats: candidate.stats,
            outcome,
            attempts,
        }
    }
}

impl Default for CardSelector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{RngCore, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashMap;

    /// Produces all-ones bits, so every float draw lands just below 1.0.
    struct MaxRng;

    impl RngCore for MaxRng {
        fn next_u32(&mut self) -> u32 {
            u32::MAX
        }

        fn next_u64(&mut self) -> u64 {
            u64::MAX
        }

        fn fill_bytes(&mut self, dst: &mut [u8]) {
            dst.fill(0xFF);
        }
    }

    fn cand(card_id: CardId, correct: u32, total: u32) -> Candidate {
        Candidate::new(card_id, AccuracyStats::new(correct, total))
    }

    fn counts(
        selector: &CardSelector,
        style: SelectionStyle,
        candidates: &[Candidate],
        draws: usize,
        seed: u64,
    ) -> HashMap<CardId, usize> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut out = HashMap::new();
        for _ in 0..draws {
            let selection = selector.select(style, candidates, &mut rng).unwrap();
            *out.entry(selection.card_id).or_insert(0) += 1;
        }
        out
    }

    #[test]
    fn test_keep_weight_unattempted_is_one() {
        assert_eq!(keep_weight(AccuracyStats::new(0, 0), 0), 1.0);
        assert_eq!(keep_weight(AccuracyStats::new(0, 0), 10), 1.0);
    }

    #[test]
    fn test_keep_weight_mastered_card_is_zero() {
        assert_eq!(keep_weight(AccuracyStats::new(10, 10), 10), 0.0);
    }

    #[test]
    fn test_keep_weight_perfect_below_max_is_positive() {
        let w = keep_weight(AccuracyStats::new(5, 5), 10);
        let expected = (1.0 - 5.0 / 6.0) * 0.5;
        assert!((w - expected).abs() < 1e-12);
    }

    #[test]
    fn test_keep_weight_formula() {
        let w = keep_weight(AccuracyStats::new(2, 5), 10);
        let expected = (1.0 - 2.0 / 6.0) * 0.5;
        assert!((w - expected).abs() < 1e-12);
    }

    #[test]
    fn test_keep_weight_tolerates_inconsistent_counters() {
        let w = keep_weight(AccuracyStats::new(50, 10), 10);
        assert!((0.0..=1.0).contains(&w));
    }

    #[test]
    fn test_uniform_weights_are_one() {
        let candidates = vec![cand(1, 10, 10), cand(2, 0, 0)];
        assert_eq!(
            compute_keep_weights(SelectionStyle::Uniform, &candidates),
            vec![1.0, 1.0]
        );
    }

    #[test]
    fn test_parallel_weights_match_sequential() {
        let candidates: Vec<Candidate> = (0..PARALLEL_WEIGHT_THRESHOLD as i64 + 10)
            .map(|i| cand(i, (i % 7) as u32, (i % 13) as u32 + (i % 7) as u32))
            .collect();
        let max_total = candidates.iter().map(|c| c.stats.total).max().unwrap();
        let weights = compute_keep_weights(SelectionStyle::AccuracyWeighted, &candidates);
        for (c, w) in candidates.iter().zip(&weights) {
            assert!((keep_weight(c.stats, max_total) - w).abs() < 1e-12);
        }
    }

    #[test]
    fn test_empty_pool() {
        let selector = CardSelector::new();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        assert_eq!(
            selector.select(SelectionStyle::AccuracyWeighted, &[], &mut rng),
            Err(SelectError::EmptyPool)
        );
        assert_eq!(
            selector.select(SelectionStyle::Uniform, &[], &mut rng),
            Err(SelectError::EmptyPool)
        );
    }

    #[test]
    fn test_singleton_always_returned() {
        let selector = CardSelector::new();
        let mut rng = MaxRng;
        for style in [SelectionStyle::Uniform, SelectionStyle::AccuracyWeighted] {
            let selection = selector.select(style, &[cand(9, 10, 10)], &mut rng).unwrap();
            assert_eq!(selection.card_id, 9);
            assert_eq!(selection.index, 0);
        }
    }

    #[test]
    fn test_weighted_bias_never_returns_mastered_card() {
        let selector = CardSelector::new();
        let candidates = vec![cand(1, 0, 0), cand(2, 10, 10)];
        let weights = compute_keep_weights(SelectionStyle::AccuracyWeighted, &candidates);
        assert_eq!(weights, vec![1.0, 0.0]);

        let result = counts(&selector, SelectionStyle::AccuracyWeighted, &candidates, 5000, 7);
        assert_eq!(result.get(&1), Some(&5000));
        assert!(!result.contains_key(&2));
    }

    #[test]
    fn test_weighted_mode_proportional_to_weights() {
        let selector = CardSelector::new();
        let candidates = vec![cand(1, 0, 0), cand(2, 5, 10)];
        let weights = compute_keep_weights(SelectionStyle::AccuracyWeighted, &candidates);
        let expected = weights[0] / (weights[0] + weights[1]);

        let draws = 20_000;
        let result = counts(&selector, SelectionStyle::AccuracyWeighted, &candidates, draws, 42);
        let share = result[&1] as f64 / draws as f64;
        assert!((share - expected).abs() < 0.02, "share {share} expected {expected}");
    }

    #[test]
    fn test_uniform_fairness() {
        let selector = CardSelector::new();
        let candidates = vec![cand(1, 10, 10), cand(2, 0, 0), cand(3, 3, 9), cand(4, 0, 5)];
        let draws = 40_000;
        let result = counts(&selector, SelectionStyle::Uniform, &candidates, draws, 1234);
        for card in 1..=4 {
            let share = result[&card] as f64 / draws as f64;
            assert!((share - 0.25).abs() < 0.02, "card {card} share {share}");
        }
    }

    #[test]
    fn test_all_zero_weights_fall_back_without_sampling() {
        let selector = CardSelector::new();
        let candidates = vec![cand(1, 4, 4), cand(2, 4, 4), cand(3, 4, 4)];
        let weights = compute_keep_weights(SelectionStyle::AccuracyWeighted, &candidates);
        assert!(all_weights_zero(&weights));

        let result = counts(&selector, SelectionStyle::AccuracyWeighted, &candidates, 3000, 5);
        for card in 1..=3 {
            assert!(result[&card] > 800, "card {card} drawn {} times", result[&card]);
        }

        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let selection = selector
            .select(SelectionStyle::AccuracyWeighted, &candidates, &mut rng)
            .unwrap();
        assert_eq!(
            selection.outcome,
            SelectionOutcome::Fallback {
                reason: FallbackReason::AllZeroWeights
            }
        );
        assert_eq!(selection.attempts, 0);
    }

    #[test]
    fn test_exhausted_budget_falls_back_to_uniform() {
        let selector = CardSelector::with_options(CardSelectorOptions {
            max_attempts: Some(5),
        });
        let candidates = vec![cand(1, 3, 6), cand(2, 6, 6), cand(3, 1, 2)];
        let mut rng = MaxRng;
        let selection = selector
            .select(SelectionStyle::AccuracyWeighted, &candidates, &mut rng)
            .unwrap();

        assert_eq!(
            selection.outcome,
            SelectionOutcome::Fallback {
                reason: FallbackReason::AttemptsExhausted
            }
        );
        assert_eq!(selection.attempts, 5);
        assert!(candidates.iter().any(|c| c.card_id == selection.card_id));
    }

    #[test]
    fn test_max_attempts_has_floor_of_one() {
        let selector = CardSelector::with_options(CardSelectorOptions {
            max_attempts: Some(0),
        });
        assert_eq!(selector.max_attempts(), 1);
    }

    #[test]
    fn test_accepted_outcome_reports_attempts() {
        let selector = CardSelector::new();
        let candidates = vec![cand(1, 0, 0), cand(2, 0, 0)];
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        let selection = selector
            .select(SelectionStyle::AccuracyWeighted, &candidates, &mut rng)
            .unwrap();
        assert_eq!(selection.outcome, SelectionOutcome::Accepted);
        assert_eq!(selection.attempts, 1);
    }
}
