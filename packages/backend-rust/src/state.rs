use std::sync::Arc;
use std::time::{Instant, SystemTime};

use flashcard_algo::{CardSelector, CardSelectorOptions};

use crate::config::Config;
use crate::store::StudyStore;

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    started_at_system: SystemTime,
    store: Option<Arc<dyn StudyStore>>,
    selector: Arc<CardSelector>,
}

impl AppState {
    pub fn new(store: Option<Arc<dyn StudyStore>>, config: &Config) -> Self {
        Self::with_selector(
            store,
            CardSelector::with_options(CardSelectorOptions {
                max_attempts: Some(config.selection_max_attempts),
            }),
        )
    }

    pub fn with_selector(store: Option<Arc<dyn StudyStore>>, selector: CardSelector) -> Self {
        Self {
            started_at: Instant::now(),
            started_at_system: SystemTime::now(),
            store,
            selector: Arc::new(selector),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn started_at_system(&self) -> SystemTime {
        self.started_at_system
    }

    /// `None` when the server runs without a database.
    pub fn store(&self) -> Option<Arc<dyn StudyStore>> {
        self.store.clone()
    }

    pub fn selector(&self) -> &CardSelector {
        &self.selector
    }
}
