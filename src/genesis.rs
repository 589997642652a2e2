//! Initial provisioning of participants and merchants.

use crate::error::{LedgerError, Result};
use crate::ledger::{Entity, LedgerStore};
use crate::model::{Merchant, Participant};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct GenesisAccount {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub balance: u64,
}

/// Accounts loaded from a `genesis.toml` document:
///
/// ```toml
/// [[participants]]
/// id = "person1"
/// name = "Alice"
/// balance = 10000
///
/// [[merchants]]
/// id = "merchant1"
/// name = "Merchant"
/// balance = 1000000
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Genesis {
    #[serde(default)]
    pub participants: Vec<GenesisAccount>,
    #[serde(default)]
    pub merchants: Vec<GenesisAccount>,
}

impl Genesis {
    pub fn from_toml(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            LedgerError::Config(format!("cannot read genesis file {}: {}", path.display(), e))
        })?;
        Self::from_toml(&contents)
    }

    /// Build validated entities. Duplicate ids within a category fail here
    /// rather than at commit.
    pub fn entities(&self) -> Result<Vec<Entity>> {
        let mut entities = Vec::with_capacity(self.participants.len() + self.merchants.len());

        let mut seen = BTreeSet::new();
        for account in &self.participants {
            if !seen.insert(account.id.as_str()) {
                return Err(LedgerError::Config(format!(
                    "participant '{}' listed twice in genesis",
                    account.id
                )));
            }
            let participant = Participant::new(&account.id, &account.name, account.balance)?;
            entities.push(Entity::Participant(participant));
        }

        let mut seen = BTreeSet::new();
        for account in &self.merchants {
            if !seen.insert(account.id.as_str()) {
                return Err(LedgerError::Config(format!(
                    "merchant '{}' listed twice in genesis",
                    account.id
                )));
            }
            let merchant = Merchant::new(&account.id, &account.name, account.balance)?;
            entities.push(Entity::Merchant(merchant));
        }

        Ok(entities)
    }
}

/// Insert every genesis account in one atomic batch. Any id already present
/// in the store fails the whole batch.
pub fn provision(store: &dyn LedgerStore, genesis: &Genesis) -> Result<()> {
    let entities = genesis.entities()?;
    let count = entities.len();
    store.add_all(entities)?;
    info!(
        "provisioned {} participants and {} merchants ({} entities)",
        genesis.participants.len(),
        genesis.merchants.len(),
        count
    );
    Ok(())
}
