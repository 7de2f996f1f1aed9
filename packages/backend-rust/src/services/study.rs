//! Caller-facing study operations: start a session, pick the next card,
//! record an answer. The store is passed in on every call; nothing here keeps
//! state between calls.

use std::collections::{BTreeSet, HashSet};

use flashcard_algo::{Candidate, CardSelector, SelectionOutcome, SelectionStyle};
use rand::Rng;
use serde::Serialize;

use crate::services::accuracy::{ensure_initialized, record_attempt};
use crate::services::pool::{resolve_pool, PoolSpec};
use crate::services::EngineError;
use crate::store::{AccuracyStats, CardId, StudyStore, UserId};

/// Largest pool a session may hold. Applies to [`start_session`] and to the
/// pools callers hand back to [`next_card`].
pub const MAX_POOL_SIZE: usize = 5000;

fn check_pool_size(len: usize) -> Result<(), EngineError> {
    if len > MAX_POOL_SIZE {
        return Err(EngineError::InvalidSelection(format!(
            "pool has {len} cards, at most {MAX_POOL_SIZE} are allowed; narrow it with by_group"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextCard {
    pub card_id: CardId,
    pub accuracy: AccuracyStats,
    pub percentage: f64,
    pub outcome: SelectionOutcome,
    pub attempts: u32,
}

impl NextCard {
    pub fn is_fallback(&self) -> bool {
        self.outcome.is_fallback()
    }
}

/// Resolve the pool and initialize its records. Returns the pool sorted by id.
///
/// A pool larger than [`MAX_POOL_SIZE`] is rejected before anything is written,
/// so every pool this returns is accepted by [`next_card`].
pub async fn start_session<S>(
    store: &S,
    user_id: UserId,
    spec: &PoolSpec,
) -> Result<Vec<CardId>, EngineError>
where
    S: StudyStore + ?Sized,
{
    let pool = resolve_pool(store, spec).await?;
    if pool.is_empty() {
        return Err(EngineError::EmptyPool);
    }
    check_pool_size(pool.len())?;

    let created = ensure_initialized(store, user_id, &pool).await?;

    let mut cards: Vec<CardId> = pool.into_iter().collect();
    cards.sort_unstable();

    tracing::info!(
        user_id,
        mode = spec.mode(),
        pool_size = cards.len(),
        created,
        "study session started"
    );
    Ok(cards)
}

/// Deduplicate a caller-supplied pool and enforce [`MAX_POOL_SIZE`].
pub fn normalize_pool(pool: &[CardId]) -> Result<Vec<CardId>, EngineError> {
    let unique: BTreeSet<CardId> = pool.iter().copied().collect();
    if unique.is_empty() {
        return Err(EngineError::EmptyPool);
    }
    check_pool_size(unique.len())?;
    Ok(unique.into_iter().collect())
}

/// Pick the next card from `pool` using the user's current counters.
///
/// Cards without a record are left out of the draw. If none of the pool has
/// a record the session was never started and the call fails with
/// [`EngineError::NotInitialized`].
pub async fn next_card<S, R>(
    store: &S,
    selector: &CardSelector,
    rng: &mut R,
    user_id: UserId,
    style: SelectionStyle,
    pool: &[CardId],
) -> Result<NextCard, EngineError>
where
    S: StudyStore + ?Sized,
    R: Rng + Send,
{
    let cards = normalize_pool(pool)?;
    let ids: HashSet<CardId> = cards.iter().copied().collect();
    let records = store.get_all(user_id, &ids).await?;

    let candidates: Vec<Candidate> = cards
        .iter()
        .filter_map(|id| records.get(id).map(|stats| Candidate::new(*id, *stats)))
        .collect();

    if candidates.len() < cards.len() {
        tracing::debug!(
            user_id,
            pool_size = cards.len(),
            initialized = candidates.len(),
            "skipping cards without accuracy records"
        );
    }
    if candidates.is_empty() {
        return Err(EngineError::NotInitialized {
            user_id,
            card_id: cards[0],
        });
    }

    let selection = selector.select(style, &candidates, rng)?;
    if selection.outcome.is_fallback() {
        tracing::debug!(
            user_id,
            card_id = selection.card_id,
            outcome = ?selection.outcome,
            attempts = selection.attempts,
            "selector fell back to a uniform draw"
        );
    }

    Ok(NextCard {
        card_id: selection.card_id,
        accuracy: selection.stats,
        percentage: selection.stats.percentage(),
        outcome: selection.outcome,
        attempts: selection.attempts,
    })
}

/// Record one answer and return the updated counters.
pub async fn submit_answer<S>(
    store: &S,
    user_id: UserId,
    card_id: CardId,
    was_correct: bool,
) -> Result<AccuracyStats, EngineError>
where
    S: StudyStore + ?Sized,
{
    match record_attempt(store, user_id, card_id, was_correct).await {
        Err(EngineError::NotInitialized { user_id, card_id }) => {
            if store.card_exists(card_id).await? {
                Err(EngineError::NotInitialized { user_id, card_id })
            } else {
                Err(EngineError::UnknownCard(card_id))
            }
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{AccuracyStore, MemoryStore};
    use flashcard_algo::FallbackReason;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[tokio::test]
    async fn test_session_end_to_end() {
        let store = MemoryStore::with_cards([1, 2, 3]);
        let selector = CardSelector::new();
        let mut rng = ChaCha8Rng::seed_from_u64(11);

        let pool = start_session(&store, 1, &PoolSpec::AllCards).await.unwrap();
        assert_eq!(pool, vec![1, 2, 3]);
        for id in &pool {
            assert_eq!(store.get(1, *id).await.unwrap(), Some(AccuracyStats::new(0, 0)));
        }

        let next = next_card(&store, &selector, &mut rng, 1, SelectionStyle::Uniform, &pool)
            .await
            .unwrap();
        assert!(pool.contains(&next.card_id));

        let updated = submit_answer(&store, 1, 1, true).await.unwrap();
        assert_eq!(updated, AccuracyStats::new(1, 1));
        assert_eq!(store.get(1, 1).await.unwrap(), Some(AccuracyStats::new(1, 1)));
    }

    #[tokio::test]
    async fn test_empty_catalog_is_empty_pool() {
        let store = MemoryStore::new();
        let err = start_session(&store, 1, &PoolSpec::AllCards).await.unwrap_err();
        assert!(matches!(err, EngineError::EmptyPool));
    }

    #[tokio::test]
    async fn test_next_card_prefers_unseen_cards() {
        let store = MemoryStore::with_cards([1, 2]);
        let selector = CardSelector::new();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        start_session(&store, 1, &PoolSpec::AllCards).await.unwrap();
        for _ in 0..10 {
            submit_answer(&store, 1, 2, true).await.unwrap();
        }

        for _ in 0..200 {
            let next = next_card(
                &store,
                &selector,
                &mut rng,
                1,
                SelectionStyle::AccuracyWeighted,
                &[1, 2],
            )
            .await
            .unwrap();
            assert_eq!(next.card_id, 1);
        }
    }

    #[tokio::test]
    async fn test_next_card_falls_back_when_everything_is_mastered() {
        let store = MemoryStore::with_cards([1, 2]);
        let selector = CardSelector::new();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        start_session(&store, 1, &PoolSpec::AllCards).await.unwrap();
        for id in [1, 2] {
            for _ in 0..3 {
                submit_answer(&store, 1, id, true).await.unwrap();
            }
        }

        let next = next_card(
            &store,
            &selector,
            &mut rng,
            1,
            SelectionStyle::AccuracyWeighted,
            &[1, 2],
        )
        .await
        .unwrap();

        assert!(next.is_fallback());
        assert_eq!(
            next.outcome,
            SelectionOutcome::Fallback {
                reason: FallbackReason::AllZeroWeights
            }
        );
    }

    #[tokio::test]
    async fn test_next_card_without_session_is_not_initialized() {
        let store = MemoryStore::with_cards([1, 2]);
        let selector = CardSelector::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let err = next_card(&store, &selector, &mut rng, 1, SelectionStyle::Uniform, &[2, 1])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::NotInitialized {
                user_id: 1,
                card_id: 1
            }
        ));
    }

    #[tokio::test]
    async fn test_next_card_skips_uninitialized_members() {
        let store = MemoryStore::with_cards([1, 2, 3]);
        let selector = CardSelector::new();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        ensure_initialized(&store, 1, &HashSet::from([3])).await.unwrap();

        for _ in 0..20 {
            let next = next_card(&store, &selector, &mut rng, 1, SelectionStyle::Uniform, &[1, 2, 3])
                .await
                .unwrap();
            assert_eq!(next.card_id, 3);
        }
    }

    #[test]
    fn test_normalize_pool() {
        assert_eq!(normalize_pool(&[3, 1, 3, 2]).unwrap(), vec![1, 2, 3]);
        assert!(matches!(normalize_pool(&[]), Err(EngineError::EmptyPool)));

        let oversized: Vec<CardId> = (0..=MAX_POOL_SIZE as CardId).collect();
        assert!(matches!(
            normalize_pool(&oversized),
            Err(EngineError::InvalidSelection(_))
        ));
    }

    #[tokio::test]
    async fn test_largest_session_pool_can_be_drawn_from() {
        let store = MemoryStore::with_cards(1..=MAX_POOL_SIZE as CardId);
        let selector = CardSelector::new();
        let mut rng = ChaCha8Rng::seed_from_u64(21);

        let pool = start_session(&store, 1, &PoolSpec::AllCards).await.unwrap();
        assert_eq!(pool.len(), MAX_POOL_SIZE);

        let next = next_card(&store, &selector, &mut rng, 1, SelectionStyle::Uniform, &pool)
            .await
            .unwrap();
        assert!(pool.contains(&next.card_id));
    }

    #[tokio::test]
    async fn test_oversized_session_is_rejected_before_writing() {
        let store = MemoryStore::with_cards(1..=MAX_POOL_SIZE as CardId + 1);

        let err = start_session(&store, 1, &PoolSpec::AllCards).await.unwrap_err();

        assert!(matches!(err, EngineError::InvalidSelection(_)));
        assert_eq!(store.accuracy_len(), 0);
        assert_eq!(store.accuracy_writes(), 0);
    }

    #[tokio::test]
    async fn test_submit_answer_distinguishes_unknown_cards() {
        let store = MemoryStore::with_cards([1]);

        let err = submit_answer(&store, 1, 1, true).await.unwrap_err();
        assert!(matches!(err, EngineError::NotInitialized { .. }));

        let err = submit_answer(&store, 1, 77, true).await.unwrap_err();
        assert!(matches!(err, EngineError::UnknownCard(77)));
    }
}
