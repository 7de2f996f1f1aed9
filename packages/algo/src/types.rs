//! Common Types and Constants
//!
//! Shared data structures used by the selector and by callers that feed it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ==================== Constants ====================

/// Default number of rejection-sampling draws before falling back to a
/// uniform pick.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10_000;

/// Pools at least this large compute their weights in parallel.
pub const PARALLEL_WEIGHT_THRESHOLD: usize = 4096;

/// Weights at or below this value count as zero.
pub const EPSILON: f64 = 1e-12;

// ==================== Identifiers ====================

/// Opaque flashcard identifier.
pub type CardId = i64;

// ==================== Accuracy ====================

/// Per-user, per-card attempt counters.
///
/// `correct <= total` holds for every value produced by the store; the
/// selector still tolerates violations by clamping (see [`crate::sanitize`]).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccuracyStats {
    pub correct: u32,
    pub total: u32,
}

impl AccuracyStats {
    pub const fn new(correct: u32, total: u32) -> Self {
        Self { correct, total }
    }

    /// Share of correct answers in percent, 0 when the card was never attempted.
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        100.0 * f64::from(self.correct) / f64::from(self.total)
    }

    /// Counters after one more attempt.
    pub fn with_attempt(self, was_correct: bool) -> Self {
        Self {
            correct: self.correct.saturating_add(u32::from(was_correct)),
            total: self.total.saturating_add(1),
        }
    }
}

// ==================== Selection ====================

/// How the next card is drawn from a pool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStyle {
    /// Every candidate is equally likely, history is ignored.
    #[default]
    Uniform,
    /// Cards that were never attempted, or attempted often and missed, are
    /// favored over cards answered well.
    #[serde(alias = "accuracy-weighted", alias = "accuracy")]
    AccuracyWeighted,
}

impl SelectionStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uniform => "uniform",
            Self::AccuracyWeighted => "accuracy_weighted",
        }
    }
}

impl fmt::Display for SelectionStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown selection style: {0}")]
pub struct ParseSelectionStyleError(pub String);

impl FromStr for SelectionStyle {
    type Err = ParseSelectionStyleError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "uniform" | "random" => Ok(Self::Uniform),
            "accuracy_weighted" | "accuracy-weighted" | "accuracy" => Ok(Self::AccuracyWeighted),
            other => Err(ParseSelectionStyleError(other.to_string())),
        }
    }
}

/// A card eligible for selection together with the acting user's counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub card_id: CardId,
    pub stats: AccuracyStats,
}

impl Candidate {
    pub const fn new(card_id: CardId, stats: AccuracyStats) -> Self {
        Self { card_id, stats }
    }
}
