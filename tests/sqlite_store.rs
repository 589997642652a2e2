//! Integration tests for the SQLite-backed ledger

use artchain::config::{load_config_from, ProcessorConfig, TokenNamePolicy};
use artchain::error::{LedgerError, Rejection};
use artchain::events::{ChannelSink, DomainEvent, NullSink};
use artchain::genesis::{provision, Genesis};
use artchain::ledger::LedgerStore;
use artchain::model::{Holder, MerchantId};
use artchain::persistence::SqliteStore;
use artchain::transaction::{ListArtWorkTx, SendTokensTx};
use artchain::TransactionProcessor;
use std::sync::Arc;
use tempfile::TempDir;

const GENESIS: &str = r#"
[[participants]]
id = "person1"
name = "Alice"
balance = 10000

[[merchants]]
id = "merchant1"
name = "Merchant"
balance = 1000000
"#;

/// Helper to get test directory
fn get_test_dir() -> Result<TempDir, Box<dyn std::error::Error>> {
    Ok(TempDir::new()?)
}

#[test]
fn test_ledger_survives_reopen() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = get_test_dir()?;
    let db_path = temp_dir.path().join("ledger").join("artchain.db");

    let art_work = {
        let store: Arc<dyn LedgerStore> = Arc::new(SqliteStore::open(&db_path)?);
        provision(store.as_ref(), &Genesis::from_toml(GENESIS)?)?;
        let processor =
            TransactionProcessor::new(store, Arc::new(NullSink), ProcessorConfig::default());
        let listed = processor.submit(
            &Holder::merchant("merchant1"),
            ListArtWorkTx::new("merchant1", "ART", 50, "Mona Lisa by Leonardo d. V.").into(),
        )?;
        let art_work = listed.art_work_id().cloned().ok_or("no art work id")?;
        processor.submit(
            &Holder::merchant("merchant1"),
            SendTokensTx::new(art_work.clone(), MerchantId::new("merchant1"), "person1", 10, 2)
                .into(),
        )?;
        art_work
    };

    // Reopen from disk
    let store: Arc<dyn LedgerStore> = Arc::new(SqliteStore::open(&db_path)?);
    let processor =
        TransactionProcessor::new(store, Arc::new(NullSink), ProcessorConfig::default());
    let registry = processor.registry();

    assert_eq!(registry.participants().get("person1")?.balance, 9_980);
    assert_eq!(registry.merchants().get("merchant1")?.balance, 1_000_020);
    assert_eq!(registry.tokens_of(&art_work)?.len(), 50);
    assert_eq!(
        registry.holdings(&art_work, &Holder::participant("person1"))?.len(),
        10
    );

    // Rejections against the reopened ledger still leave it untouched
    let before = registry.snapshot()?;
    let err = processor
        .submit(
            &Holder::merchant("merchant1"),
            SendTokensTx::new(art_work.clone(), MerchantId::new("merchant1"), "person1", 41, 1)
                .into(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Rejected(Rejection::InsufficientTokenHolding { owned: 40, .. })
    ));
    assert_eq!(registry.snapshot()?, before);
    Ok(())
}

#[test]
fn test_reprovisioning_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = get_test_dir()?;
    let store = SqliteStore::open(temp_dir.path().join("artchain.db"))?;
    let genesis = Genesis::from_toml(GENESIS)?;
    provision(&store, &genesis)?;
    assert!(provision(&store, &genesis).is_err());
    Ok(())
}

#[test]
fn test_processor_from_config_file() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = get_test_dir()?;
    let config_path = temp_dir.path().join("config.toml");
    let db_path = temp_dir.path().join("artchain.db");
    std::fs::write(
        &config_path,
        format!(
            r#"
[ledger]
database_path = "{}"

[processor]
lock_stripes = 4
token_name_policy = "unique_global"

[events]
channel_capacity = 8
"#,
            db_path.display()
        ),
    )?;

    let config = load_config_from(&config_path)?;
    assert_eq!(config.processor.token_name_policy, TokenNamePolicy::UniqueGlobal);

    let store: Arc<dyn LedgerStore> = Arc::new(SqliteStore::open(&config.ledger.database_path)?);
    provision(store.as_ref(), &Genesis::from_toml(GENESIS)?)?;
    let (sink, events) = ChannelSink::bounded(config.events.channel_capacity);
    let processor = TransactionProcessor::new(store, Arc::new(sink), config.processor.clone());

    processor.submit(
        &Holder::merchant("merchant1"),
        ListArtWorkTx::new("merchant1", "ART", 3, "Mona Lisa").into(),
    )?;
    let err = processor
        .submit(
            &Holder::merchant("merchant1"),
            ListArtWorkTx::new("merchant1", "ART", 3, "Second edition").into(),
        )
        .unwrap_err();
    assert!(matches!(err, LedgerError::Rejected(Rejection::DuplicateListing(_))));

    let received: Vec<DomainEvent> = events.try_iter().collect();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].name(), "ArtWorkListed");
    Ok(())
}
