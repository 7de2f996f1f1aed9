use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::store::{
    AccuracyStats, AccuracyStore, Card, CardCatalog, CardId, Group, GroupId, GroupMembership,
    StoreError, UserId,
};

#[derive(Debug, Default)]
struct MemoryState {
    cards: BTreeMap<CardId, Card>,
    groups: BTreeMap<GroupId, Group>,
    members: HashMap<GroupId, HashSet<CardId>>,
    accuracy: HashMap<(UserId, CardId), AccuracyStats>,
}

/// In-process store with the same contracts as the Postgres one.
///
/// Each operation takes the lock once, so a batch create or an increment is
/// atomic with respect to every other call.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    accuracy_writes: AtomicU64,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding bare cards with the given ids.
    pub fn with_cards(ids: impl IntoIterator<Item = CardId>) -> Self {
        let store = Self::new();
        for id in ids {
            store.insert_card(Card {
                id,
                gloss: format!("CARD {id}"),
                definition: String::new(),
                video: None,
            });
        }
        store
    }

    pub fn insert_card(&self, card: Card) {
        self.state.write().cards.insert(card.id, card);
    }

    pub fn insert_group(&self, group: Group, members: impl IntoIterator<Item = CardId>) {
        let mut state = self.state.write();
        state
            .members
            .entry(group.id)
            .or_default()
            .extend(members);
        state.groups.insert(group.id, group);
    }

    /// Number of accuracy records across all users.
    pub fn accuracy_len(&self) -> usize {
        self.state.read().accuracy.len()
    }

    /// Number of write operations that reached the accuracy table.
    pub fn accuracy_writes(&self) -> u64 {
        self.accuracy_writes.load(Ordering::SeqCst)
    }

    /// Make every subsequent call fail as if the backend were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CardCatalog for MemoryStore {
    async fn list_all_card_ids(&self) -> Result<HashSet<CardId>, StoreError> {
        self.check_available()?;
        Ok(self.state.read().cards.keys().copied().collect())
    }

    async fn card_exists(&self, card_id: CardId) -> Result<bool, StoreError> {
        self.check_available()?;
        Ok(self.state.read().cards.contains_key(&card_id))
    }

    async fn get_card(&self, card_id: CardId) -> Result<Option<Card>, StoreError> {
        self.check_available()?;
        Ok(self.state.read().cards.get(&card_id).cloned())
    }
}

#[async_trait]
impl GroupMembership for MemoryStore {
    async fn members_of_groups(
        &self,
        group_ids: &HashSet<GroupId>,
    ) -> Result<HashSet<CardId>, StoreError> {
        self.check_available()?;
        let state = self.state.read();
        Ok(group_ids
            .iter()
            .filter_map(|id| state.members.get(id))
            .flatten()
            .filter(|card_id| state.cards.contains_key(card_id))
            .copied()
            .collect())
    }

    async fn list_groups(&self) -> Result<Vec<Group>, StoreError> {
        self.check_available()?;
        let mut groups: Vec<Group> = self.state.read().groups.values().cloned().collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(groups)
    }
}

#[async_trait]
impl AccuracyStore for MemoryStore {
    async fn get(
        &self,
        user_id: UserId,
        card_id: CardId,
    ) -> Result<Option<AccuracyStats>, StoreError> {
        self.check_available()?;
        Ok(self.state.read().accuracy.get(&(user_id, card_id)).copied())
    }

    async fn get_all(
        &self,
        user_id: UserId,
        card_ids: &HashSet<CardId>,
    ) -> Result<HashMap<CardId, AccuracyStats>, StoreError> {
        self.check_available()?;
        let state = self.state.read();
        Ok(card_ids
            .iter()
            .filter_map(|id| {
                state
                    .accuracy
                    .get(&(user_id, *id))
                    .map(|stats| (*id, *stats))
            })
            .collect())
    }

    async fn create_missing(
        &self,
        user_id: UserId,
        card_ids: &HashSet<CardId>,
    ) -> Result<u64, StoreError> {
        self.check_available()?;
        if card_ids.is_empty() {
            return Ok(0);
        }

        let mut state = self.state.write();
        self.accuracy_writes.fetch_add(1, Ordering::SeqCst);

        let mut created = 0;
        let state = &mut *state;
        for card_id in card_ids {
            if !state.cards.contains_key(card_id) {
                continue;
            }
            if let std::collections::hash_map::Entry::Vacant(entry) =
                state.accuracy.entry((user_id, *card_id))
            {
                entry.insert(AccuracyStats::default());
                created += 1;
            }
        }
        Ok(created)
    }

    async fn increment_attempt(
        &self,
        user_id: UserId,
        card_id: CardId,
        was_correct: bool,
    ) -> Result<Option<AccuracyStats>, StoreError> {
        self.check_available()?;
        let mut state = self.state.write();
        let Some(stats) = state.accuracy.get_mut(&(user_id, card_id)) else {
            return Ok(None);
        };

        self.accuracy_writes.fetch_add(1, Ordering::SeqCst);
        *stats = stats.with_attempt(was_correct);
        Ok(Some(*stats))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_available()
    }
}
