#![forbid(unsafe_code)]
//! ArtChain operator CLI over a SQLite ledger

use artchain::config::{load_config_from, Config, DEFAULT_CONFIG_PATH};
use artchain::events::ChannelSink;
use artchain::genesis::{provision, Genesis};
use artchain::ledger::{LedgerStore, Registry};
use artchain::model::{ArtWorkId, Holder};
use artchain::persistence::SqliteStore;
use artchain::transaction::{ListArtWorkTx, SendTokensTx, Transaction};
use artchain::{Outcome, TransactionProcessor};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Color as TableColor;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision participants and merchants from a genesis file
    Provision {
        /// Genesis file; defaults to `ledger.genesis_path`
        genesis: Option<String>,
    },
    /// List an art work and mint its tokens to the owner
    ListArtwork {
        /// Submitting holder, e.g. merchant:merchant1
        #[arg(long = "as")]
        submitter: Holder,
        #[arg(long)]
        owner: String,
        #[arg(long)]
        token_name: String,
        #[arg(long)]
        supply: u64,
        #[arg(long)]
        description: String,
        #[arg(long, default_value_t = 0)]
        face_value: u64,
    },
    /// Sell tokens of an art work to a participant
    SendTokens {
        #[arg(long = "as")]
        submitter: Holder,
        #[arg(long)]
        art_work: String,
        /// Current holder, e.g. merchant:merchant1 or participant:person1
        #[arg(long)]
        from: Holder,
        /// Buying participant id
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: u64,
        /// Price per token in minor units
        #[arg(long)]
        price: u64,
    },
    /// Print every entity of one category
    Show {
        #[arg(value_enum)]
        category: ShowCategory,
    },
    /// Token distribution of one art work
    Holdings { art_work: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum ShowCategory {
    Participants,
    Merchants,
    ArtWorks,
    ArtTokens,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config_from(&cli.config)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let store: Arc<dyn LedgerStore> = if config.ledger.database_path == ":memory:" {
        Arc::new(SqliteStore::open_in_memory()?)
    } else {
        Arc::new(SqliteStore::open(&config.ledger.database_path)?)
    };

    match cli.command {
        Commands::Provision { genesis } => {
            let path = genesis
                .or_else(|| config.ledger.genesis_path.clone())
                .ok_or("no genesis file given and ledger.genesis_path is not set")?;
            let genesis = Genesis::load(&path)?;
            provision(store.as_ref(), &genesis)?;
            println!(
                "{}",
                format!(
                    "✅ Provisioned {} participants and {} merchants from {}",
                    genesis.participants.len(),
                    genesis.merchants.len(),
                    path
                )
                .green()
            );
        }
        Commands::ListArtwork {
            submitter,
            owner,
            token_name,
            supply,
            description,
            face_value,
        } => {
            let tx = ListArtWorkTx::new(owner.as_str(), token_name, supply, description)
                .with_face_value(face_value);
            submit(&config, store, &submitter, tx.into())?;
        }
        Commands::SendTokens {
            submitter,
            art_work,
            from,
            to,
            amount,
            price,
        } => {
            let tx = SendTokensTx::new(ArtWorkId::new(art_work), from, to.as_str(), amount, price);
            submit(&config, store, &submitter, tx.into())?;
        }
        Commands::Show { category } => {
            show(&Registry::new(store), category)?;
        }
        Commands::Holdings { art_work } => {
            holdings(&Registry::new(store), &ArtWorkId::new(art_work))?;
        }
    }

    Ok(())
}

fn submit(
    config: &Config,
    store: Arc<dyn LedgerStore>,
    submitter: &Holder,
    tx: Transaction,
) -> Result<(), Box<dyn std::error::Error>> {
    let (sink, events) = if config.events.block_when_full {
        ChannelSink::blocking(config.events.channel_capacity)
    } else {
        ChannelSink::bounded(config.events.channel_capacity)
    };
    let processor = TransactionProcessor::new(store, Arc::new(sink), config.processor.clone());

    match processor.submit(submitter, tx) {
        Ok(result) => {
            match &result.outcome {
                Outcome::Listed {
                    art_work_id,
                    token_count,
                } => println!(
                    "{}",
                    format!("✅ Listed art work {} with {} tokens", art_work_id, token_count)
                        .green()
                        .bold()
                ),
                Outcome::Transferred { total_price } => println!(
                    "{}",
                    format!("✅ Transfer settled for {} minor units", total_price)
                        .green()
                        .bold()
                ),
            }
            println!("{}", format!("   Transaction: {}", result.transaction_id).bright_black());
            for event in events.try_iter() {
                println!("{}", serde_json::to_string(&event)?);
            }
            Ok(())
        }
        Err(e) if e.is_rejection() => {
            eprintln!("{}", format!("❌ Rejected: {}", e.reason()).red().bold());
            Err(e.into())
        }
        Err(e) => {
            eprintln!("{}", format!("💥 Failed: {}", e).red().bold());
            Err(e.into())
        }
    }
}

fn header(titles: &[&str]) -> Vec<Cell> {
    titles
        .iter()
        .map(|t| {
            Cell::new(t)
                .fg(TableColor::Cyan)
                .add_attribute(Attribute::Bold)
        })
        .collect()
}

fn new_table(titles: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header(titles));
    table
}

fn show(registry: &Registry, category: ShowCategory) -> Result<(), Box<dyn std::error::Error>> {
    let table = match category {
        ShowCategory::Participants => {
            let mut table = new_table(&["Id", "Name", "Balance"]);
            for p in registry.participants().get_all()? {
                table.add_row(vec![
                    Cell::new(p.id.as_str()),
                    Cell::new(&p.name),
                    Cell::new(p.balance).fg(TableColor::Green),
                ]);
            }
            table
        }
        ShowCategory::Merchants => {
            let mut table = new_table(&["Id", "Name", "Balance"]);
            for m in registry.merchants().get_all()? {
                table.add_row(vec![
                    Cell::new(m.id.as_str()),
                    Cell::new(&m.name),
                    Cell::new(m.balance).fg(TableColor::Green),
                ]);
            }
            table
        }
        ShowCategory::ArtWorks => {
            let mut table = new_table(&["Id", "Owner", "Token", "Supply", "Description"]);
            for w in registry.art_works().get_all()? {
                table.add_row(vec![
                    Cell::new(w.id.as_str()),
                    Cell::new(w.owner.as_str()),
                    Cell::new(&w.token_name).fg(TableColor::Yellow),
                    Cell::new(w.token_count),
                    Cell::new(&w.description),
                ]);
            }
            table
        }
        ShowCategory::ArtTokens => {
            let mut table = new_table(&["Id", "Art Work", "Owner", "Face Value"]);
            for t in registry.art_tokens().get_all()? {
                table.add_row(vec![
                    Cell::new(t.id.as_str()),
                    Cell::new(t.art_work.as_str()),
                    Cell::new(t.owner.to_string()),
                    Cell::new(t.face_value),
                ]);
            }
            table
        }
    };
    println!("{}", table);
    Ok(())
}

fn holdings(registry: &Registry, art_work: &ArtWorkId) -> Result<(), Box<dyn std::error::Error>> {
    let work = registry.art_works().get(art_work.as_str())?;
    println!(
        "{}",
        format!("🖼  {} ({}), {} tokens", work.description, work.token_name, work.token_count)
            .bright_cyan()
            .bold()
    );

    let owner = Holder::Merchant(work.owner.clone());
    let mut table = new_table(&["Holder", "Tokens"]);
    for (holder, count) in registry.distribution(art_work)? {
        let color = if holder == owner {
            TableColor::Yellow
        } else {
            TableColor::Green
        };
        table.add_row(vec![
            Cell::new(holder.to_string()).fg(color),
            Cell::new(count),
        ]);
    }
    println!("{}", table);
    Ok(())
}
