//! Data Sanitization
//!
//! Numerical guards for selection weights and counters coming from storage.

use crate::types::{AccuracyStats, EPSILON};

/// Clamp a value into a probability in `[0, 1]`. NaN becomes 0.
pub fn clamp_probability(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// Force every weight into `[0, 1]`, mapping NaN and infinities to 0.
pub fn sanitize_weights(weights: &mut [f64]) {
    for w in weights.iter_mut() {
        if w.is_infinite() {
            *w = 0.0;
        } else {
            *w = clamp_probability(*w);
        }
    }
}

/// Counters with `correct` capped at `total`.
///
/// Rows written by this engine never violate the invariant, but imported
/// data might.
pub fn sanitize_stats(stats: AccuracyStats) -> AccuracyStats {
    AccuracyStats {
        correct: stats.correct.min(stats.total),
        total: stats.total,
    }
}

/// True when no weight is large enough to ever be accepted.
pub fn all_weights_zero(weights: &[f64]) -> bool {
    weights.iter().all(|&w| w <= EPSILON)
}
