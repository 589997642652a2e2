//! Ledger entities: participants, merchants, art works and art tokens.
//!
//! Every entity is built through an explicit constructor that validates its
//! fields. Relationships are typed ids, resolved eagerly by the registry.

use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum length of ids and display names
pub const MAX_NAME_LENGTH: usize = 128;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

entity_id!(ParticipantId);
entity_id!(MerchantId);
entity_id!(
    /// UUID v4 assigned at listing time
    ArtWorkId
);
entity_id!(
    /// `<art-work-id>:<index>`, index zero-padded so lexical order is mint order
    ArtTokenId
);

impl ArtWorkId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl ArtTokenId {
    pub fn for_unit(art_work: &ArtWorkId, index: u64) -> Self {
        Self(format!("{}:{:08}", art_work, index))
    }
}

/// Anything that can hold tokens and currency, and submit transactions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Holder {
    Participant(ParticipantId),
    Merchant(MerchantId),
}

impl Holder {
    pub fn participant(id: impl Into<String>) -> Self {
        Holder::Participant(ParticipantId::new(id))
    }

    pub fn merchant(id: impl Into<String>) -> Self {
        Holder::Merchant(MerchantId::new(id))
    }

    pub fn id(&self) -> &str {
        match self {
            Holder::Participant(id) => id.as_str(),
            Holder::Merchant(id) => id.as_str(),
        }
    }
}

impl fmt::Display for Holder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Holder::Participant(id) => write!(f, "participant:{}", id),
            Holder::Merchant(id) => write!(f, "merchant:{}", id),
        }
    }
}

impl FromStr for Holder {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        let (kind, id) = s.split_once(':').ok_or_else(|| {
            LedgerError::InvalidEntity(format!(
                "holder '{}' must look like participant:<id> or merchant:<id>",
                s
            ))
        })?;
        validate_id(id)?;
        match kind {
            "participant" | "person" => Ok(Holder::participant(id)),
            "merchant" => Ok(Holder::merchant(id)),
            other => Err(LedgerError::InvalidEntity(format!(
                "unknown holder kind '{}'",
                other
            ))),
        }
    }
}

impl From<ParticipantId> for Holder {
    fn from(id: ParticipantId) -> Self {
        Holder::Participant(id)
    }
}

impl From<MerchantId> for Holder {
    fn from(id: MerchantId) -> Self {
        Holder::Merchant(id)
    }
}

/// Buyer-side identity holding settlement currency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    /// Settlement currency, minor units
    pub balance: u64,
}

impl Participant {
    pub fn new(id: impl Into<String>, name: impl Into<String>, balance: u64) -> Result<Self> {
        let id = id.into();
        let name = name.into();
        validate_id(&id)?;
        validate_name(&name)?;
        Ok(Self {
            id: ParticipantId(id),
            name,
            balance,
        })
    }
}

/// Seller-side identity; lists art works and initially holds all of their tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Merchant {
    pub id: MerchantId,
    pub name: String,
    pub balance: u64,
}

impl Merchant {
    pub fn new(id: impl Into<String>, name: impl Into<String>, balance: u64) -> Result<Self> {
        let id = id.into();
        let name = name.into();
        validate_id(&id)?;
        validate_name(&name)?;
        Ok(Self {
            id: MerchantId(id),
            name,
            balance,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtWork {
    pub id: ArtWorkId,
    pub owner: MerchantId,
    pub description: String,
    /// Tag of the token series minted for this work
    pub token_name: String,
    /// Fixed at listing; never changes afterwards
    pub token_count: u64,
}

impl ArtWork {
    pub fn new(
        id: ArtWorkId,
        owner: MerchantId,
        description: impl Into<String>,
        token_name: impl Into<String>,
        token_count: u64,
    ) -> Self {
        Self {
            id,
            owner,
            description: description.into(),
            token_name: token_name.into(),
            token_count,
        }
    }

    /// Mint the full token supply, every unit owned by the listing merchant.
    pub fn mint_tokens(&self, face_value: u64) -> Vec<ArtToken> {
        (0..self.token_count)
            .map(|index| ArtToken {
                id: ArtTokenId::for_unit(&self.id, index),
                art_work: self.id.clone(),
                owner: Holder::Merchant(self.owner.clone()),
                token_name: self.token_name.clone(),
                face_value,
            })
            .collect()
    }
}

/// One discrete, exclusively-owned unit of an art work's supply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtToken {
    pub id: ArtTokenId,
    pub art_work: ArtWorkId,
    pub owner: Holder,
    pub token_name: String,
    /// Per-unit face value metadata, minor units
    pub face_value: u64,
}

impl ArtToken {
    pub fn transfer_to(mut self, owner: Holder) -> Self {
        self.owner = owner;
        self
    }
}

/// A balance-carrying entity loaded for settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Account {
    Participant(Participant),
    Merchant(Merchant),
}

impl Account {
    pub fn holder(&self) -> Holder {
        match self {
            Account::Participant(p) => Holder::Participant(p.id.clone()),
            Account::Merchant(m) => Holder::Merchant(m.id.clone()),
        }
    }

    pub fn balance(&self) -> u64 {
        match self {
            Account::Participant(p) => p.balance,
            Account::Merchant(m) => m.balance,
        }
    }

    pub fn with_balance(self, balance: u64) -> Self {
        match self {
            Account::Participant(mut p) => {
                p.balance = balance;
                Account::Participant(p)
            }
            Account::Merchant(mut m) => {
                m.balance = balance;
                Account::Merchant(m)
            }
        }
    }
}

fn validate_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(LedgerError::InvalidEntity("entity id cannot be empty".to_string()));
    }
    if id.len() > MAX_NAME_LENGTH {
        return Err(LedgerError::InvalidEntity(format!(
            "entity id exceeds {} characters",
            MAX_NAME_LENGTH
        )));
    }
    if id.chars().any(char::is_whitespace) {
        return Err(LedgerError::InvalidEntity(format!(
            "entity id '{}' contains whitespace",
            id
        )));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(LedgerError::InvalidEntity("display name cannot be empty".to_string()));
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(LedgerError::InvalidEntity(format!(
            "display name exceeds {} characters",
            MAX_NAME_LENGTH
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_ids_sort_in_mint_order() {
        let work = ArtWork::new(
            ArtWorkId::new("w"),
            MerchantId::new("merchant1"),
            "Mona Lisa",
            "ART",
            12,
        );
        let tokens = work.mint_tokens(0);
        let mut ids: Vec<_> = tokens.iter().map(|t| t.id.clone()).collect();
        let minted = ids.clone();
        ids.sort();
        assert_eq!(ids, minted);
        assert_eq!(tokens[11].id.as_str(), "w:00000011");
    }

    #[test]
    fn test_minted_tokens_owned_by_merchant() {
        let work = ArtWork::new(
            ArtWorkId::generate(),
            MerchantId::new("merchant1"),
            "Mona Lisa",
            "ART",
            50,
        );
        let tokens = work.mint_tokens(3);
        assert_eq!(tokens.len(), 50);
        assert!(tokens
            .iter()
            .all(|t| t.owner == Holder::merchant("merchant1") && t.art_work == work.id));
    }

    #[test]
    fn test_holder_parse_and_display() {
        let holder: Holder = "merchant:merchant1".parse().unwrap();
        assert_eq!(holder, Holder::merchant("merchant1"));
        assert_eq!(holder.to_string(), "merchant:merchant1");
        assert!("merchant1".parse::<Holder>().is_err());
        assert!(matches!(
            "admin:root".parse::<Holder>(),
            Err(LedgerError::InvalidEntity(_))
        ));
    }

    #[test]
    fn test_constructor_validation() {
        assert!(Participant::new("person1", "Alice", 10_000).is_ok());
        assert!(matches!(
            Participant::new("", "Alice", 10_000),
            Err(LedgerError::InvalidEntity(_))
        ));
        assert!(matches!(
            Merchant::new("merchant 1", "Merchant", 0),
            Err(LedgerError::InvalidEntity(_))
        ));
        assert!(matches!(
            Merchant::new("merchant1", "  ", 0),
            Err(LedgerError::InvalidEntity(_))
        ));
    }

    #[test]
    fn test_account_balance_update_keeps_identity() {
        let account = Account::Merchant(Merchant::new("merchant1", "Merchant", 100).unwrap());
        let updated = account.with_balance(120);
        assert_eq!(updated.balance(), 120);
        assert_eq!(updated.holder(), Holder::merchant("merchant1"));
    }
}
