//! Record-level interfaces the study engine runs against.
//!
//! [`CardCatalog`] and [`GroupMembership`] are read-only views of data owned
//! by the card and group CRUD services. [`AccuracyStore`] holds the per-user
//! counters the engine creates and increments. Every backend implements all
//! three and so gets [`StudyStore`] for free.

pub mod memory;
pub mod postgres;

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub use flashcard_algo::{AccuracyStats, CardId};
pub use memory::MemoryStore;

pub type UserId = i64;
pub type GroupId = i64;

/// Rows per statement for batched reads and inserts.
pub const MAX_BATCH_SIZE: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: CardId,
    pub gloss: String,
    pub definition: String,
    pub video: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub owner_id: UserId,
    pub owner_name: Option<String>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("invalid counter value {value} for user {user_id}, card {card_id}")]
    CorruptCounter {
        user_id: UserId,
        card_id: CardId,
        value: i64,
    },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[async_trait]
pub trait CardCatalog: Send + Sync {
    async fn list_all_card_ids(&self) -> Result<HashSet<CardId>, StoreError>;

    async fn card_exists(&self, card_id: CardId) -> Result<bool, StoreError>;

    async fn get_card(&self, card_id: CardId) -> Result<Option<Card>, StoreError>;
}

#[async_trait]
pub trait GroupMembership: Send + Sync {
    /// Union of the members of every listed group, restricted to cards that
    /// still exist.
    async fn members_of_groups(
        &self,
        group_ids: &HashSet<GroupId>,
    ) -> Result<HashSet<CardId>, StoreError>;

    async fn list_groups(&self) -> Result<Vec<Group>, StoreError>;
}

#[async_trait]
pub trait AccuracyStore: Send + Sync {
    async fn get(
        &self,
        user_id: UserId,
        card_id: CardId,
    ) -> Result<Option<AccuracyStats>, StoreError>;

    /// Records that exist among `card_ids`; absent ids are left out.
    async fn get_all(
        &self,
        user_id: UserId,
        card_ids: &HashSet<CardId>,
    ) -> Result<HashMap<CardId, AccuracyStats>, StoreError>;

    /// Upsert-if-absent: every id without a record gets `(0, 0)`, existing
    /// records are left untouched, and a record created concurrently by
    /// another caller counts as present rather than as a failure. The batch
    /// is applied atomically. Ids with no card in the catalog (a card deleted
    /// after the pool was resolved) are skipped. Returns how many records this
    /// call created.
    async fn create_missing(
        &self,
        user_id: UserId,
        card_ids: &HashSet<CardId>,
    ) -> Result<u64, StoreError>;

    /// Atomically adds one attempt (and one correct answer when
    /// `was_correct`). Returns the new counters, or `None` when the record
    /// does not exist.
    async fn increment_attempt(
        &self,
        user_id: UserId,
        card_id: CardId,
        was_correct: bool,
    ) -> Result<Option<AccuracyStats>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

pub trait StudyStore: AccuracyStore + CardCatalog + GroupMembership {}

impl<T> StudyStore for T where T: AccuracyStore + CardCatalog + GroupMembership {}

pub(crate) fn counter_from_db(
    user_id: UserId,
    card_id: CardId,
    value: i32,
) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::CorruptCounter {
        user_id,
        card_id,
        value: i64::from(value),
    })
}
