/// Transaction types for ArtChain
use crate::error::{LedgerError, Result};
use crate::model::{ArtWorkId, Holder, MerchantId, ParticipantId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Maximum transaction size in bytes (64KB) to prevent DoS
pub const MAX_TRANSACTION_SIZE: usize = 64 * 1024;

pub const MAX_TOKEN_NAME_LENGTH: usize = 64;
pub const MAX_DESCRIPTION_LENGTH: usize = 4096;

/// Hex SHA-256 identifying one submitted transaction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A state-transition request delivered by the surrounding platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Transaction {
    ListArtWork(ListArtWorkTx),
    SendTokens(SendTokensTx),
}

impl Transaction {
    pub fn kind(&self) -> &'static str {
        match self {
            Transaction::ListArtWork(_) => "ListArtWork",
            Transaction::SendTokens(_) => "SendTokens",
        }
    }

    /// Encoded size, checked against [`MAX_TRANSACTION_SIZE`] during validation
    pub fn serialized_size(&self) -> Result<usize> {
        let size = bincode::serialized_size(self).map_err(|e| {
            LedgerError::Serialization(format!("Serialization failed: {}", e))
        })?;
        Ok(size as usize)
    }

    /// Hash of the request fields and the submission sequence number
    pub fn hash(&self, submitter: &Holder, sequence: u64) -> [u8; 32] {
        let mut hasher = Sha256::new();
        match self {
            Transaction::ListArtWork(tx) => {
                hasher.update("list_art_work".as_bytes());
                hasher.update(tx.owner.as_str().as_bytes());
                hasher.update(tx.token_name.as_bytes());
                hasher.update(tx.token_initial_balance.to_le_bytes());
                hasher.update(tx.art_work_description.as_bytes());
                hasher.update(tx.face_value.to_le_bytes());
            }
            Transaction::SendTokens(tx) => {
                hasher.update("send_tokens".as_bytes());
                hasher.update(tx.art_work.as_str().as_bytes());
                hasher.update(tx.from.to_string().as_bytes());
                hasher.update(tx.to.as_str().as_bytes());
                hasher.update(tx.amount.to_le_bytes());
                hasher.update(tx.price_per_token.to_le_bytes());
            }
        }
        hasher.update(submitter.to_string().as_bytes());
        hasher.update(sequence.to_le_bytes());
        hasher.finalize().into()
    }

    pub fn id(&self, submitter: &Holder, sequence: u64) -> TransactionId {
        TransactionId(hex::encode(self.hash(submitter, sequence)))
    }
}

/// Tokenize an art work into a fixed supply of units owned by `owner`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListArtWorkTx {
    pub token_name: String,
    #[serde(alias = "tokenInitalBalance")]
    pub token_initial_balance: u64,
    pub art_work_description: String,
    pub owner: MerchantId,
    /// Per-unit face value recorded on every minted token
    #[serde(default)]
    pub face_value: u64,
}

impl ListArtWorkTx {
    pub fn new(
        owner: impl Into<MerchantId>,
        token_name: impl Into<String>,
        token_initial_balance: u64,
        art_work_description: impl Into<String>,
    ) -> Self {
        ListArtWorkTx {
            token_name: token_name.into(),
            token_initial_balance,
            art_work_description: art_work_description.into(),
            owner: owner.into(),
            face_value: 0,
        }
    }

    pub fn with_face_value(mut self, face_value: u64) -> Self {
        self.face_value = face_value;
        self
    }
}

/// Move `amount` tokens of `art_work` from `from` to `to`, settled at
/// `price_per_token` minor units each
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendTokensTx {
    pub art_work: ArtWorkId,
    pub from: Holder,
    pub to: ParticipantId,
    pub amount: u64,
    pub price_per_token: u64,
}

impl SendTokensTx {
    pub fn new(
        art_work: ArtWorkId,
        from: impl Into<Holder>,
        to: impl Into<ParticipantId>,
        amount: u64,
        price_per_token: u64,
    ) -> Self {
        SendTokensTx {
            art_work,
            from: from.into(),
            to: to.into(),
            amount,
            price_per_token,
        }
    }

    /// `amount × price_per_token`, or `None` if it does not fit in a u64
    pub fn total_price(&self) -> Option<u64> {
        self.amount.checked_mul(self.price_per_token)
    }

    pub fn buyer(&self) -> Holder {
        Holder::Participant(self.to.clone())
    }
}

impl From<ListArtWorkTx> for Transaction {
    fn from(tx: ListArtWorkTx) -> Self {
        Transaction::ListArtWork(tx)
    }
}

impl From<SendTokensTx> for Transaction {
    fn from(tx: SendTokensTx) -> Self {
        Transaction::SendTokens(tx)
    }
}
