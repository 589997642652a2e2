//! Transaction processor: resolves the entities a request references,
//! validates it, stages the resulting writes, checks the staged state
//! against the ledger invariants and commits it as one atomic batch.
//!
//! Each submission holds the lock stripes of every entity it touches for the
//! whole validate-stage-commit window, so preconditions are re-checked on
//! exactly the state the mutation is applied to.

use crate::config::{ProcessorConfig, TokenNamePolicy};
use crate::error::{LedgerError, Result};
use crate::events::{DomainEvent, EventSink};
use crate::ledger::{Category, Entity, EntityKey, LedgerStore, Registry, WriteBatch};
use crate::locks::{LockKey, LockManager};
use crate::model::{ArtWork, ArtWorkId, Holder};
use crate::transaction::{
    check_size, check_submitter, ListArtWorkTx, SendTokensTx, Transaction, TransactionId,
};
use chrono::Utc;
use parking_lot::RwLock;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Listed {
        art_work_id: ArtWorkId,
        token_count: u64,
    },
    Transferred {
        total_price: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionResult {
    pub transaction_id: TransactionId,
    pub outcome: Outcome,
    pub events: Vec<DomainEvent>,
}

impl TransactionResult {
    /// Id of the art work created by a ListArtWork transaction
    pub fn art_work_id(&self) -> Option<&ArtWorkId> {
        match &self.outcome {
            Outcome::Listed { art_work_id, .. } => Some(art_work_id),
            Outcome::Transferred { .. } => None,
        }
    }
}

/// Writes and events computed for one transaction, not yet committed
struct Staged {
    batch: WriteBatch,
    outcome: Outcome,
    event: DomainEvent,
}

pub struct TransactionProcessor {
    registry: Registry,
    sink: Arc<dyn EventSink>,
    locks: LockManager,
    config: ProcessorConfig,
    sequence: AtomicU64,
    quarantine: RwLock<BTreeSet<EntityKey>>,
}

impl TransactionProcessor {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        sink: Arc<dyn EventSink>,
        config: ProcessorConfig,
    ) -> Self {
        let locks = LockManager::new(config.lock_stripes);
        debug!("transaction processor ready with {} lock stripes", locks.stripe_count());
        Self {
            registry: Registry::new(store),
            sink,
            locks,
            config,
            sequence: AtomicU64::new(0),
            quarantine: RwLock::new(BTreeSet::new()),
        }
    }

    /// Read-only query access to the registries
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Validate and apply one transaction. Either every mutation commits and
    /// the resulting events are emitted, or the ledger is left untouched.
    pub fn submit(&self, submitter: &Holder, tx: Transaction) -> Result<TransactionResult> {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let transaction_id = tx.id(submitter, sequence);
        let kind = tx.kind();

        match self.process(submitter, &tx, &transaction_id) {
            Ok(result) => {
                info!(
                    "{} {} committed for {}: {:?}",
                    kind, transaction_id, submitter, result.outcome
                );
                Ok(result)
            }
            Err(e) if e.is_rejection() => {
                warn!("{} {} rejected for {}: {}", kind, transaction_id, submitter, e.reason());
                Err(e)
            }
            Err(e) => {
                error!("{} {} failed for {}: {}", kind, transaction_id, submitter, e);
                Err(e)
            }
        }
    }

    /// [`submit`](Self::submit) on tokio's blocking pool.
    pub async fn submit_async(
        self: Arc<Self>,
        submitter: Holder,
        tx: Transaction,
    ) -> Result<TransactionResult> {
        tokio::task::spawn_blocking(move || self.submit(&submitter, tx))
            .await
            .map_err(|e| LedgerError::Internal(format!("processing task failed: {}", e)))?
    }

    /// Submit many transactions in parallel. Transactions touching disjoint
    /// entities proceed independently; overlapping ones serialise on their
    /// lock stripes. Results are returned in request order.
    pub fn submit_batch(
        &self,
        requests: Vec<(Holder, Transaction)>,
    ) -> Vec<Result<TransactionResult>> {
        requests
            .into_par_iter()
            .map(|(submitter, tx)| self.submit(&submitter, tx))
            .collect()
    }

    /// Entities barred from further writes after a consistency violation
    pub fn quarantined(&self) -> Vec<EntityKey> {
        self.quarantine.read().iter().cloned().collect()
    }

    /// Lift the write barrier on an entity once it has been repaired.
    pub fn release(&self, key: &EntityKey) -> bool {
        let released = self.quarantine.write().remove(key);
        if released {
            info!("released {} from quarantine", key);
        }
        released
    }

    fn process(
        &self,
        submitter: &Holder,
        tx: &Transaction,
        transaction_id: &TransactionId,
    ) -> Result<TransactionResult> {
        // Stateless checks need no locks
        check_size(tx.serialized_size()?)?;
        match tx {
            Transaction::ListArtWork(list) => list.validate(self.config.max_tokens_per_listing)?,
            Transaction::SendTokens(send) => send.validate()?,
        }

        let keys = self.lock_keys(tx);
        let _held = self.locks.acquire(&keys);
        self.check_quarantine(&keys)?;

        let staged = match tx {
            Transaction::ListArtWork(list) => self.stage_listing(submitter, list, transaction_id),
            Transaction::SendTokens(send) => self.stage_transfer(submitter, send, transaction_id),
        }
        .map_err(|e| self.escalate(e, &keys))?;

        let writes = staged.batch.len();
        self.registry
            .store()
            .commit(staged.batch)
            .map_err(|e| match e {
                // Anything the store refuses after validation passed is an
                // invariant break, not a rejection
                LedgerError::Consistency(_) | LedgerError::NotFound(_) => {
                    self.escalate(LedgerError::Consistency(e.to_string()), &keys)
                }
                other => other,
            })?;
        debug!("{} committed {} writes", transaction_id, writes);

        // Emitted while the stripes are still held, so events of conflicting
        // transactions leave in commit order
        self.sink.emit(&staged.event);

        Ok(TransactionResult {
            transaction_id: transaction_id.clone(),
            outcome: staged.outcome,
            events: vec![staged.event],
        })
    }

    fn lock_keys(&self, tx: &Transaction) -> Vec<LockKey> {
        match tx {
            Transaction::ListArtWork(list) => {
                let mut keys: Vec<LockKey> =
                    vec![EntityKey::new(Category::Merchant, list.owner.as_str()).into()];
                if self.config.token_name_policy == TokenNamePolicy::UniqueGlobal {
                    keys.push(LockKey::TokenNamespace);
                }
                keys
            }
            Transaction::SendTokens(send) => vec![
                EntityKey::new(Category::ArtWork, send.art_work.as_str()).into(),
                holder_key(&send.from).into(),
                EntityKey::new(Category::Participant, send.to.as_str()).into(),
            ],
        }
    }

    fn check_quarantine(&self, keys: &[LockKey]) -> Result<()> {
        let quarantine = self.quarantine.read();
        if quarantine.is_empty() {
            return Ok(());
        }
        for key in keys {
            if let LockKey::Entity(key) = key {
                if quarantine.contains(key) {
                    return Err(LedgerError::Quarantined(key.clone()));
                }
            }
        }
        Ok(())
    }

    /// Consistency violations quarantine every entity the transaction locked.
    fn escalate(&self, err: LedgerError, keys: &[LockKey]) -> LedgerError {
        if let LedgerError::Consistency(msg) = &err {
            let mut quarantine = self.quarantine.write();
            for key in keys {
                if let LockKey::Entity(key) = key {
                    error!("quarantining {} after consistency violation: {}", key, msg);
                    quarantine.insert(key.clone());
                }
            }
        }
        err
    }

    fn stage_listing(
        &self,
        submitter: &Holder,
        tx: &ListArtWorkTx,
        transaction_id: &TransactionId,
    ) -> Result<Staged> {
        let owner = tx.check_owner(self.registry.merchants().find(tx.owner.as_str())?)?;
        tx.check_lister(submitter)?;

        if self.config.token_name_policy != TokenNamePolicy::Tag {
            let listed = self.registry.art_works().get_all()?;
            tx.check_token_name(self.config.token_name_policy, &listed)?;
        }

        let art_work = ArtWork::new(
            ArtWorkId::generate(),
            owner.id.clone(),
            tx.art_work_description.trim(),
            tx.token_name.trim(),
            tx.token_initial_balance,
        );
        let tokens = art_work.mint_tokens(tx.face_value);

        let owner_holder = Holder::Merchant(owner.id.clone());
        if tokens.len() as u64 != tx.token_initial_balance
            || tokens
                .iter()
                .any(|t| t.owner != owner_holder || t.art_work != art_work.id)
        {
            return Err(LedgerError::Consistency(format!(
                "minted supply for {} does not match the requested {} tokens",
                art_work.id, tx.token_initial_balance
            )));
        }

        let mut batch = WriteBatch::new();
        batch.insert(Entity::ArtWork(art_work.clone()));
        for token in tokens {
            batch.insert(Entity::ArtToken(token));
        }

        let event = DomainEvent::ArtWorkListed {
            transaction_id: transaction_id.clone(),
            art_work_id: art_work.id.clone(),
            owner: owner.id,
            token_name: art_work.token_name.clone(),
            token_count: art_work.token_count,
            timestamp: Utc::now(),
        };

        Ok(Staged {
            batch,
            outcome: Outcome::Listed {
                art_work_id: art_work.id,
                token_count: art_work.token_count,
            },
            event,
        })
    }

    fn stage_transfer(
        &self,
        submitter: &Holder,
        tx: &SendTokensTx,
        transaction_id: &TransactionId,
    ) -> Result<Staged> {
        if self.config.require_sender_identity {
            check_submitter(submitter, &tx.from)?;
        }

        // 1. art work exists
        let art_work = tx.check_art_work(self.registry.art_works().find(tx.art_work.as_str())?)?;

        // 2. seller exists and owns at least `amount` tokens of it
        let seller = self.registry.account(&tx.from)?;
        let supply = self.registry.tokens_of(&art_work.id)?;
        if supply.len() as u64 != art_work.token_count {
            return Err(LedgerError::Consistency(format!(
                "art work {} has {} tokens, {} were minted",
                art_work.id,
                supply.len(),
                art_work.token_count
            )));
        }
        let mut held: Vec<_> = supply.into_iter().filter(|t| t.owner == tx.from).collect();
        held.sort_by(|a, b| a.id.cmp(&b.id));
        let selected = tx.select_tokens(held)?;

        // 3. buyer exists
        let buyer = tx.check_buyer(self.registry.participants().find(tx.to.as_str())?)?;

        // 4. buyer can pay
        let total_price = tx.check_affordable(&buyer)?;

        let buyer_holder = tx.buyer();
        let mut batch = WriteBatch::new();

        if buyer_holder != tx.from {
            // 5. seller can be credited
            let seller_balance = tx.check_seller_credit(&seller, total_price)?;

            let before = buyer.balance as u128 + seller.balance() as u128;
            let buyer_balance = buyer.balance - total_price;
            if buyer_balance as u128 + seller_balance as u128 != before {
                return Err(LedgerError::Consistency(format!(
                    "settlement of {} would not conserve currency",
                    transaction_id
                )));
            }

            let moved: Vec<_> = selected
                .into_iter()
                .map(|t| t.transfer_to(buyer_holder.clone()))
                .collect();
            if moved.len() as u64 != tx.amount
                || moved
                    .iter()
                    .any(|t| t.art_work != art_work.id || t.owner != buyer_holder)
            {
                return Err(LedgerError::Consistency(format!(
                    "staged ownership change for {} does not move exactly {} tokens",
                    transaction_id, tx.amount
                )));
            }

            let mut buyer = buyer;
            buyer.balance = buyer_balance;
            batch.update(Entity::Participant(buyer));
            batch.update(Entity::from(seller.with_balance(seller_balance)));
            for token in moved {
                batch.update(Entity::ArtToken(token));
            }
        }

        let event = DomainEvent::TokensTransferred {
            transaction_id: transaction_id.clone(),
            art_work_id: art_work.id,
            from: tx.from.clone(),
            to: tx.to.clone(),
            amount: tx.amount,
            price_per_token: tx.price_per_token,
            total_price,
            timestamp: Utc::now(),
        };

        Ok(Staged {
            batch,
            outcome: Outcome::Transferred { total_price },
            event,
        })
    }
}

fn holder_key(holder: &Holder) -> EntityKey {
    match holder {
        Holder::Participant(id) => EntityKey::new(Category::Participant, id.as_str()),
        Holder::Merchant(id) => EntityKey::new(Category::Merchant, id.as_str()),
    }
}
