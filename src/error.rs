//! Error types for ArtChain

use crate::ledger::{Category, EntityKey};
use thiserror::Error;

/// A referenced entity id is absent from its registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{category} '{id}' not found")]
pub struct EntityNotFound {
    pub category: Category,
    pub id: String,
}

impl EntityNotFound {
    pub fn new(category: Category, id: impl Into<String>) -> Self {
        Self {
            category,
            id: id.into(),
        }
    }
}

/// Precondition failures. Each one rejects a single transaction and leaves
/// the ledger untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// Owner not registered, or the caller is not the owner
    #[error("InvalidOwner: {0}")]
    InvalidOwner(String),

    #[error("InvalidSupply: {0}")]
    InvalidSupply(String),

    #[error("InvalidListing: {0}")]
    InvalidListing(String),

    #[error("DuplicateListing: token name '{0}' is already in use")]
    DuplicateListing(String),

    #[error("InvalidAmount: {0}")]
    InvalidAmount(String),

    #[error("InsufficientTokenHolding: {holder} owns {owned} tokens of art work {art_work}, {requested} requested")]
    InsufficientTokenHolding {
        art_work: String,
        holder: String,
        owned: u64,
        requested: u64,
    },

    #[error("InsufficientBalance: participant '{participant}' has {balance}, {required} required")]
    InsufficientBalance {
        participant: String,
        balance: u64,
        required: RequiredAmount,
    },

    #[error("BalanceOverflow: crediting {credit} to {holder} would overflow its balance of {balance}")]
    BalanceOverflow {
        holder: String,
        balance: u64,
        credit: u64,
    },

    #[error("ParticipantNotFound: participant '{0}' is not registered")]
    ParticipantNotFound(String),

    #[error("ArtWorkNotFound: art work '{0}' does not exist")]
    ArtWorkNotFound(String),

    #[error("TransactionTooLarge: {size} bytes (max: {max})")]
    TransactionTooLarge { size: usize, max: usize },

    #[error("AuthorizationMismatch: submitter {submitter} cannot act as {acting_as}")]
    AuthorizationMismatch { submitter: String, acting_as: String },
}

/// Total price required by a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredAmount {
    Exact(u64),
    Overflow,
}

impl std::fmt::Display for RequiredAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequiredAmount::Exact(v) => write!(f, "{}", v),
            RequiredAmount::Overflow => write!(f, "more than {}", u64::MAX),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("Not found: {0}")]
    NotFound(#[from] EntityNotFound),

    #[error("Transaction rejected: {0}")]
    Rejected(#[from] Rejection),

    /// An invariant would have been broken by a computed state change.
    /// Never a normal rejection; the touched entities are quarantined.
    #[error("Consistency violation: {0}")]
    Consistency(String),

    #[error("Entity {0} is quarantined after a consistency violation")]
    Quarantined(EntityKey),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// An entity field failed validation on construction
    #[error("Invalid entity: {0}")]
    InvalidEntity(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// True for outcomes that reject a single transaction as part of normal
    /// operation (missing references and failed preconditions).
    pub fn is_rejection(&self) -> bool {
        matches!(self, LedgerError::NotFound(_) | LedgerError::Rejected(_))
    }

    /// Rejection reason surfaced to the submitter.
    pub fn reason(&self) -> String {
        match self {
            LedgerError::NotFound(e) => format!("NotFound: {}", e),
            LedgerError::Rejected(r) => r.to_string(),
            other => other.to_string(),
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            LedgerError::Rejected(r) => Some(r),
            _ => None,
        }
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Io(err.to_string())
    }
}

impl From<rusqlite::Error> for LedgerError {
    fn from(err: rusqlite::Error) -> Self {
        LedgerError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

impl From<Box<bincode::ErrorKind>> for LedgerError {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for LedgerError {
    fn from(err: toml::de::Error) -> Self {
        LedgerError::Config(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_reason_names_kind() {
        let err = LedgerError::from(Rejection::InsufficientTokenHolding {
            art_work: "w1".to_string(),
            holder: "merchant:merchant1".to_string(),
            owned: 5,
            requested: 10,
        });
        assert!(err.is_rejection());
        assert!(err.reason().starts_with("InsufficientTokenHolding"));
    }

    #[test]
    fn test_consistency_is_not_rejection() {
        let err = LedgerError::Consistency("supply changed".to_string());
        assert!(!err.is_rejection());
        assert!(err.rejection().is_none());
    }

    #[test]
    fn test_not_found_display() {
        let err = LedgerError::from(EntityNotFound::new(Category::Merchant, "m9"));
        assert_eq!(err.reason(), "NotFound: Merchant 'm9' not found");
    }
}
