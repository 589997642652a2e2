use crate::error::{EntityNotFound, LedgerError, Result};
use crate::model::{Account, ArtToken, ArtWork, ArtWorkId, Merchant, Participant};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    Participant,
    Merchant,
    ArtWork,
    ArtToken,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Participant,
        Category::Merchant,
        Category::ArtWork,
        Category::ArtToken,
    ];

    /// Stable storage name
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Participant => "participant",
            Category::Merchant => "merchant",
            Category::ArtWork => "art_work",
            Category::ArtToken => "art_token",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Participant => "Participant",
            Category::Merchant => "Merchant",
            Category::ArtWork => "ArtWork",
            Category::ArtToken => "ArtToken",
        };
        f.write_str(name)
    }
}

impl FromStr for Category {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "participant" | "participants" => Ok(Category::Participant),
            "merchant" | "merchants" => Ok(Category::Merchant),
            "art_work" | "art-work" | "art-works" | "art_works" => Ok(Category::ArtWork),
            "art_token" | "art-token" | "art-tokens" | "art_tokens" => Ok(Category::ArtToken),
            other => Err(LedgerError::Config(format!("unknown category '{}'", other))),
        }
    }
}

/// Identity of an entity: unique within its category.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    pub category: Category,
    pub id: String,
}

impl EntityKey {
    pub fn new(category: Category, id: impl Into<String>) -> Self {
        Self {
            category,
            id: id.into(),
        }
    }

    pub fn not_found(&self) -> EntityNotFound {
        EntityNotFound::new(self.category, self.id.clone())
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.category, self.id)
    }
}

/// Closed set of ledger records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category", content = "record")]
pub enum Entity {
    Participant(Participant),
    Merchant(Merchant),
    ArtWork(ArtWork),
    ArtToken(ArtToken),
}

impl Entity {
    pub fn category(&self) -> Category {
        match self {
            Entity::Participant(_) => Category::Participant,
            Entity::Merchant(_) => Category::Merchant,
            Entity::ArtWork(_) => Category::ArtWork,
            Entity::ArtToken(_) => Category::ArtToken,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Entity::Participant(p) => p.id.as_str(),
            Entity::Merchant(m) => m.id.as_str(),
            Entity::ArtWork(w) => w.id.as_str(),
            Entity::ArtToken(t) => t.id.as_str(),
        }
    }

    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.category(), self.id())
    }

    /// Art work an art token belongs to
    pub fn art_work(&self) -> Option<&ArtWorkId> {
        match self {
            Entity::ArtToken(t) => Some(&t.art_work),
            _ => None,
        }
    }
}

impl From<Account> for Entity {
    fn from(account: Account) -> Self {
        match account {
            Account::Participant(p) => Entity::Participant(p),
            Account::Merchant(m) => Entity::Merchant(m),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Create; the key must not exist yet
    Insert(Entity),
    /// Replace; the key must exist
    Update(Entity),
    /// Create or replace
    Put(Entity),
}

impl WriteOp {
    pub fn entity(&self) -> &Entity {
        match self {
            WriteOp::Insert(e) | WriteOp::Update(e) | WriteOp::Put(e) => e,
        }
    }
}

/// A set of mutations applied all-or-nothing by [`LedgerStore::commit`].
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entity: Entity) -> &mut Self {
        self.ops.push(WriteOp::Insert(entity));
        self
    }

    pub fn update(&mut self, entity: Entity) -> &mut Self {
        self.ops.push(WriteOp::Update(entity));
        self
    }

    pub fn put(&mut self, entity: Entity) -> &mut Self {
        self.ops.push(WriteOp::Put(entity));
        self
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Shape checks every backend runs before touching state: a key may be
    /// written at most once per batch.
    pub fn check_distinct_keys(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.ops.len());
        for op in &self.ops {
            let key = op.entity().key();
            if !seen.insert(key.clone()) {
                return Err(LedgerError::Consistency(format!(
                    "{} written twice in one batch",
                    key
                )));
            }
        }
        Ok(())
    }
}

/// Storage contract for ledger state. Implementations must apply a
/// [`WriteBatch`] atomically: either every operation becomes visible or none.
pub trait LedgerStore: Send + Sync {
    fn get(&self, key: &EntityKey) -> Result<Option<Entity>>;

    /// All entities of a category, ordered by id
    fn get_all(&self, category: Category) -> Result<Vec<Entity>>;

    fn commit(&self, batch: WriteBatch) -> Result<()>;

    /// Tokens referencing an art work, ordered by token id
    fn tokens_of(&self, art_work: &ArtWorkId) -> Result<Vec<ArtToken>> {
        Ok(self
            .get_all(Category::ArtToken)?
            .into_iter()
            .filter_map(|e| match e {
                Entity::ArtToken(t) if &t.art_work == art_work => Some(t),
                _ => None,
            })
            .collect())
    }

    fn count(&self, category: Category) -> Result<usize> {
        Ok(self.get_all(category)?.len())
    }

    fn put(&self, entity: Entity) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.put(entity);
        self.commit(batch)
    }

    /// Initial provisioning; every id must be new
    fn add_all(&self, entities: Vec<Entity>) -> Result<()> {
        let mut batch = WriteBatch::new();
        for entity in entities {
            batch.insert(entity);
        }
        self.commit(batch)
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    entities: BTreeMap<Category, BTreeMap<String, Entity>>,
    tokens_by_work: BTreeMap<ArtWorkId, BTreeSet<String>>,
}

impl MemoryInner {
    fn contains(&self, key: &EntityKey) -> bool {
        self.entities
            .get(&key.category)
            .map(|m| m.contains_key(&key.id))
            .unwrap_or(false)
    }

    fn write(&mut self, entity: Entity) {
        if let Entity::ArtToken(token) = &entity {
            self.tokens_by_work
                .entry(token.art_work.clone())
                .or_default()
                .insert(token.id.as_str().to_string());
        }
        self.entities
            .entry(entity.category())
            .or_default()
            .insert(entity.id().to_string(), entity);
    }
}

/// In-memory ledger, useful for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryStore {
    fn get(&self, key: &EntityKey) -> Result<Option<Entity>> {
        let inner = self.inner.read();
        Ok(inner
            .entities
            .get(&key.category)
            .and_then(|m| m.get(&key.id))
            .cloned())
    }

    fn get_all(&self, category: Category) -> Result<Vec<Entity>> {
        let inner = self.inner.read();
        Ok(inner
            .entities
            .get(&category)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default())
    }

    fn tokens_of(&self, art_work: &ArtWorkId) -> Result<Vec<ArtToken>> {
        let inner = self.inner.read();
        let Some(ids) = inner.tokens_by_work.get(art_work) else {
            return Ok(Vec::new());
        };
        let tokens = inner.entities.get(&Category::ArtToken);
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(Entity::ArtToken(t)) = tokens.and_then(|m| m.get(id)) {
                out.push(t.clone());
            }
        }
        Ok(out)
    }

    fn count(&self, category: Category) -> Result<usize> {
        let inner = self.inner.read();
        Ok(inner.entities.get(&category).map(|m| m.len()).unwrap_or(0))
    }

    fn commit(&self, batch: WriteBatch) -> Result<()> {
        batch.check_distinct_keys()?;
        let mut inner = self.inner.write();

        // Validate the whole batch before applying any of it
        for op in batch.ops() {
            let key = op.entity().key();
            match op {
                WriteOp::Insert(_) if inner.contains(&key) => {
                    return Err(LedgerError::Consistency(format!("{} already exists", key)));
                }
                WriteOp::Update(_) if !inner.contains(&key) => {
                    return Err(LedgerError::NotFound(key.not_found()));
                }
                _ => {}
            }
        }

        let len = batch.len();
        for op in batch.into_ops() {
            match op {
                WriteOp::Insert(e) | WriteOp::Update(e) | WriteOp::Put(e) => inner.write(e),
            }
        }
        debug!("memory store committed {} writes", len);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Holder, MerchantId};

    fn listed_work(tokens: u64) -> (ArtWork, Vec<ArtToken>) {
        let work = ArtWork::new(
            ArtWorkId::new("w1"),
            MerchantId::new("merchant1"),
            "Mona Lisa",
            "ART",
            tokens,
        );
        let minted = work.mint_tokens(0);
        (work, minted)
    }

    #[test]
    fn test_add_all_and_get() {
        let store = MemoryStore::new();
        let alice = Participant::new("person1", "Alice", 10_000).unwrap();
        store
            .add_all(vec![Entity::Participant(alice.clone())])
            .unwrap();

        let got = store
            .get(&EntityKey::new(Category::Participant, "person1"))
            .unwrap();
        assert_eq!(got, Some(Entity::Participant(alice)));
        assert!(store
            .get(&EntityKey::new(Category::Merchant, "person1"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_duplicate_insert_rejects_whole_batch() {
        let store = MemoryStore::new();
        let alice = Participant::new("person1", "Alice", 1).unwrap();
        store.add_all(vec![Entity::Participant(alice)]).unwrap();

        let bob = Participant::new("person2", "Bob", 2).unwrap();
        let alice_again = Participant::new("person1", "Alice", 99).unwrap();
        let result = store.add_all(vec![
            Entity::Participant(bob),
            Entity::Participant(alice_again),
        ]);
        assert!(matches!(result, Err(LedgerError::Consistency(_))));
        assert_eq!(store.count(Category::Participant).unwrap(), 1);
    }

    #[test]
    fn test_update_missing_entity_fails() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch.update(Entity::Merchant(Merchant::new("m1", "M", 0).unwrap()));
        assert!(matches!(store.commit(batch), Err(LedgerError::NotFound(_))));
    }

    #[test]
    fn test_key_written_twice_is_inconsistent() {
        let store = MemoryStore::new();
        let m = Merchant::new("m1", "M", 0).unwrap();
        let mut batch = WriteBatch::new();
        batch.put(Entity::Merchant(m.clone())).put(Entity::Merchant(m));
        assert!(matches!(store.commit(batch), Err(LedgerError::Consistency(_))));
    }

    #[test]
    fn test_tokens_of_indexes_by_work() {
        let store = MemoryStore::new();
        let (work, tokens) = listed_work(5);
        let mut entities = vec![Entity::ArtWork(work.clone())];
        entities.extend(tokens.into_iter().map(Entity::ArtToken));
        store.add_all(entities).unwrap();

        let found = store.tokens_of(&work.id).unwrap();
        assert_eq!(found.len(), 5);
        assert!(found.windows(2).all(|w| w[0].id < w[1].id));
        assert!(store.tokens_of(&ArtWorkId::new("other")).unwrap().is_empty());

        let moved = found[0].clone().transfer_to(Holder::participant("person1"));
        store.put(Entity::ArtToken(moved)).unwrap();
        let found = store.tokens_of(&work.id).unwrap();
        assert_eq!(found.len(), 5);
        assert_eq!(found[0].owner, Holder::participant("person1"));
    }

    #[test]
    fn test_category_parse() {
        assert_eq!("art-works".parse::<Category>().unwrap(), Category::ArtWork);
        assert_eq!(Category::ArtToken.to_string(), "ArtToken");
        assert!("triangles".parse::<Category>().is_err());
    }
}
