pub mod accuracy;
pub mod pool;
pub mod study;

use flashcard_algo::SelectError;
use thiserror::Error;

use crate::store::{CardId, StoreError, UserId};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid selection: {0}")]
    InvalidSelection(String),
    #[error("the selected pool contains no cards")]
    EmptyPool,
    #[error("card {card_id} has not been initialized for user {user_id}")]
    NotInitialized { user_id: UserId, card_id: CardId },
    #[error("card {0} does not exist")]
    UnknownCard(CardId),
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

impl From<SelectError> for EngineError {
    fn from(err: SelectError) -> Self {
        match err {
            SelectError::EmptyPool => Self::EmptyPool,
        }
    }
}
