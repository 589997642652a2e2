use super::store::{Category, Entity, EntityKey, LedgerStore};
use crate::error::{EntityNotFound, Result};
use crate::model::{
    Account, ArtToken, ArtWork, ArtWorkId, Holder, Merchant, Participant,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

/// A record type stored under one [`Category`].
pub trait Record: Sized + Clone {
    const CATEGORY: Category;

    fn record_id(&self) -> &str;

    fn into_entity(self) -> Entity;

    fn from_entity(entity: Entity) -> Option<Self>;
}

macro_rules! impl_record {
    ($ty:ident) => {
        impl Record for $ty {
            const CATEGORY: Category = Category::$ty;

            fn record_id(&self) -> &str {
                self.id.as_str()
            }

            fn into_entity(self) -> Entity {
                Entity::$ty(self)
            }

            fn from_entity(entity: Entity) -> Option<Self> {
                match entity {
                    Entity::$ty(record) => Some(record),
                    _ => None,
                }
            }
        }
    };
}

impl_record!(Participant);
impl_record!(Merchant);
impl_record!(ArtWork);
impl_record!(ArtToken);

/// Typed view over one category of the ledger store.
pub struct TypedRegistry<'a, T> {
    store: &'a dyn LedgerStore,
    _record: PhantomData<T>,
}

impl<'a, T: Record> TypedRegistry<'a, T> {
    fn new(store: &'a dyn LedgerStore) -> Self {
        Self {
            store,
            _record: PhantomData,
        }
    }

    /// Fetch a record, failing with `EntityNotFound(category, id)` when absent.
    pub fn get(&self, id: &str) -> Result<T> {
        self.find(id)?
            .ok_or_else(|| EntityNotFound::new(T::CATEGORY, id).into())
    }

    pub fn find(&self, id: &str) -> Result<Option<T>> {
        let key = EntityKey::new(T::CATEGORY, id);
        Ok(self.store.get(&key)?.and_then(T::from_entity))
    }

    pub fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.find(id)?.is_some())
    }

    pub fn get_all(&self) -> Result<Vec<T>> {
        Ok(self
            .store
            .get_all(T::CATEGORY)?
            .into_iter()
            .filter_map(T::from_entity)
            .collect())
    }

    pub fn count(&self) -> Result<usize> {
        self.store.count(T::CATEGORY)
    }

    pub fn add_all(&self, records: Vec<T>) -> Result<()> {
        self.store
            .add_all(records.into_iter().map(Record::into_entity).collect())
    }

    pub fn put(&self, record: T) -> Result<()> {
        self.store.put(record.into_entity())
    }
}

/// Registry accessor: typed, existence-checked access to every category.
#[derive(Clone)]
pub struct Registry {
    store: Arc<dyn LedgerStore>,
}

impl Registry {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub fn participants(&self) -> TypedRegistry<'_, Participant> {
        TypedRegistry::new(self.store.as_ref())
    }

    pub fn merchants(&self) -> TypedRegistry<'_, Merchant> {
        TypedRegistry::new(self.store.as_ref())
    }

    pub fn art_works(&self) -> TypedRegistry<'_, ArtWork> {
        TypedRegistry::new(self.store.as_ref())
    }

    pub fn art_tokens(&self) -> TypedRegistry<'_, ArtToken> {
        TypedRegistry::new(self.store.as_ref())
    }

    /// Resolve a holder to its balance-carrying record.
    pub fn account(&self, holder: &Holder) -> Result<Account> {
        match holder {
            Holder::Participant(id) => self.participants().get(id.as_str()).map(Account::Participant),
            Holder::Merchant(id) => self.merchants().get(id.as_str()).map(Account::Merchant),
        }
    }

    pub fn tokens_of(&self, art_work: &ArtWorkId) -> Result<Vec<ArtToken>> {
        self.store.tokens_of(art_work)
    }

    /// Tokens of `art_work` currently owned by `holder`, lowest id first.
    pub fn holdings(&self, art_work: &ArtWorkId, holder: &Holder) -> Result<Vec<ArtToken>> {
        let mut owned: Vec<ArtToken> = self
            .store
            .tokens_of(art_work)?
            .into_iter()
            .filter(|t| &t.owner == holder)
            .collect();
        owned.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(owned)
    }

    /// Token count per owner for one art work.
    pub fn distribution(&self, art_work: &ArtWorkId) -> Result<BTreeMap<Holder, u64>> {
        let mut counts = BTreeMap::new();
        for token in self.store.tokens_of(art_work)? {
            *counts.entry(token.owner).or_insert(0u64) += 1;
        }
        Ok(counts)
    }

    /// Sum of every participant and merchant balance.
    pub fn total_currency(&self) -> Result<u128> {
        let participants: u128 = self
            .participants()
            .get_all()?
            .iter()
            .map(|p| p.balance as u128)
            .sum();
        let merchants: u128 = self
            .merchants()
            .get_all()?
            .iter()
            .map(|m| m.balance as u128)
            .sum();
        Ok(participants + merchants)
    }

    /// Deterministic copy of the whole ledger.
    pub fn snapshot(&self) -> Result<LedgerSnapshot> {
        Ok(LedgerSnapshot {
            participants: self.participants().get_all()?,
            merchants: self.merchants().get_all()?,
            art_works: self.art_works().get_all()?,
            art_tokens: self.art_tokens().get_all()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub participants: Vec<Participant>,
    pub merchants: Vec<Merchant>,
    pub art_works: Vec<ArtWork>,
    pub art_tokens: Vec<ArtToken>,
}

impl LedgerSnapshot {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}
