//! # flashcard-algo
//!
//! Pure Rust card selection for flashcard study sessions.
//!
//! - **Keep weights** - per-card acceptance probabilities derived from the
//!   acting user's correct/total counters
//! - **Rejection sampling** - draw uniformly, keep with probability equal to
//!   the weight, bounded by an attempt budget with a uniform fallback
//!
//! No I/O and no async: callers load the counters, hand them over together
//! with a random source, and get one card back.
//!
//! ## Modules
//!
//! - [`selector`] - weights and the bounded sampling loop
//! - [`sanitize`] - numeric guards for weights and counters
//! - [`types`] - shared types and constants
//!
//! ## Example
//!
//! ```rust
//! use flashcard_algo::{AccuracyStats, Candidate, CardSelector, SelectionStyle};
//!
//! let candidates = vec![
//!     Candidate::new(1, AccuracyStats::new(0, 0)),
//!     Candidate::new(2, AccuracyStats::new(10, 10)),
//! ];
//! let selection = CardSelector::new()
//!     .select(SelectionStyle::AccuracyWeighted, &candidates, &mut rand::rng())
//!     .unwrap();
//! assert_eq!(selection.card_id, 1);
//! ```

pub mod sanitize;
pub mod selector;
pub mod types;

pub use types::*;

pub use selector::{
    compute_keep_weights, is_mastered, keep_weight, CardSelector, CardSelectorOptions,
    FallbackReason, SelectError, Selection, SelectionOutcome,
};
