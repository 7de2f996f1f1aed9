use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::services::EngineError;
use crate::store::{CardCatalog, CardId, GroupId, GroupMembership};

pub const ALL_CARDS: &str = "all_cards";
pub const BY_GROUP: &str = "by_group";

/// Which cards a study session draws from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "groupIds", rename_all = "snake_case")]
pub enum PoolSpec {
    AllCards,
    ByGroup(Vec<GroupId>),
}

impl PoolSpec {
    /// Builds a spec from the quiz form fields.
    ///
    /// `group_ids` is ignored for `all_cards`. An empty group list for
    /// `by_group` is accepted here and rejected by [`resolve_pool`].
    pub fn from_form(which_to_study: &str, group_ids: &[GroupId]) -> Result<Self, EngineError> {
        match which_to_study.trim().to_ascii_lowercase().as_str() {
            ALL_CARDS | "all-cards" | "all" => Ok(Self::AllCards),
            BY_GROUP | "by-group" | "group" => Ok(Self::ByGroup(group_ids.to_vec())),
            other => Err(EngineError::InvalidSelection(format!(
                "unknown pool mode '{other}', expected '{ALL_CARDS}' or '{BY_GROUP}'"
            ))),
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Self::AllCards => ALL_CARDS,
            Self::ByGroup(_) => BY_GROUP,
        }
    }
}

/// Card ids for a session. Read-only.
pub async fn resolve_pool<S>(store: &S, spec: &PoolSpec) -> Result<HashSet<CardId>, EngineError>
where
    S: CardCatalog + GroupMembership + ?Sized,
{
    match spec {
        PoolSpec::AllCards => Ok(store.list_all_card_ids().await?),
        PoolSpec::ByGroup(group_ids) => {
            if group_ids.is_empty() {
                return Err(EngineError::InvalidSelection(
                    "select at least one group".to_string(),
                ));
            }
            let groups: HashSet<GroupId> = group_ids.iter().copied().collect();
            Ok(store.members_of_groups(&groups).await?)
        }
    }
}
