use std::collections::HashSet;

use serde::Serialize;

use crate::services::EngineError;
use crate::store::{AccuracyStats, AccuracyStore, CardId, UserId};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardAccuracy {
    pub card_id: CardId,
    pub correct: u32,
    pub total: u32,
    pub percentage: f64,
    pub initialized: bool,
}

impl CardAccuracy {
    fn new(card_id: CardId, stats: Option<AccuracyStats>) -> Self {
        let initialized = stats.is_some();
        let stats = stats.unwrap_or_default();
        Self {
            card_id,
            correct: stats.correct,
            total: stats.total,
            percentage: stats.percentage(),
            initialized,
        }
    }
}

/// Make sure every card in `card_ids` has a record for `user_id`.
///
/// Only missing records are created, in one batch, and nothing is written
/// when all of them exist. Returns the number of records this call created.
pub async fn ensure_initialized<S>(
    store: &S,
    user_id: UserId,
    card_ids: &HashSet<CardId>,
) -> Result<u64, EngineError>
where
    S: AccuracyStore + ?Sized,
{
    if card_ids.is_empty() {
        return Ok(0);
    }

    let existing = store.get_all(user_id, card_ids).await?;
    let missing: HashSet<CardId> = card_ids
        .iter()
        .filter(|id| !existing.contains_key(id))
        .copied()
        .collect();

    if missing.is_empty() {
        tracing::debug!(user_id, pool_size = card_ids.len(), "accuracy records already present");
        return Ok(0);
    }

    let created = store.create_missing(user_id, &missing).await?;
    tracing::debug!(
        user_id,
        missing = missing.len(),
        created,
        "created accuracy records"
    );
    Ok(created)
}

/// Add one attempt to an existing record.
pub async fn record_attempt<S>(
    store: &S,
    user_id: UserId,
    card_id: CardId,
    was_correct: bool,
) -> Result<AccuracyStats, EngineError>
where
    S: AccuracyStore + ?Sized,
{
    store
        .increment_attempt(user_id, card_id, was_correct)
        .await?
        .ok_or(EngineError::NotInitialized { user_id, card_id })
}

/// Per-card counters for a pool, ordered by card id. Cards without a record
/// are reported with zero counters.
pub async fn accuracy_summary<S>(
    store: &S,
    user_id: UserId,
    card_ids: &HashSet<CardId>,
) -> Result<Vec<CardAccuracy>, EngineError>
where
    S: AccuracyStore + ?Sized,
{
    let records = store.get_all(user_id, card_ids).await?;
    let mut ids: Vec<CardId> = card_ids.iter().copied().collect();
    ids.sort_unstable();

    Ok(ids
        .into_iter()
        .map(|id| CardAccuracy::new(id, records.get(&id).copied()))
        .collect())
}
