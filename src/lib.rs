//! ArtChain - transaction-processing core for a tokenized artwork marketplace
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Entities & Ledger
//! - [`model`] - Participants, merchants, art works and art tokens
//! - [`ledger`] - Ledger store contract, in-memory store and typed registries
//! - [`persistence`] - Database layer (SQLite)
//! - [`genesis`] - Initial account provisioning
//!
//! ## Transactions
//! - [`transaction`] - Transaction types and validation rules
//! - [`processor`] - Validate, stage and atomically commit transactions
//! - [`locks`] - Striped entity locks
//!
//! ## Integration
//! - [`events`] - Domain events and event sinks
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Entities & Ledger
// ============================================================================
pub mod genesis;
pub mod ledger;
pub mod model;
pub mod persistence;

// ============================================================================
// Transactions
// ============================================================================
pub mod locks;
pub mod processor;
pub mod transaction;

// ============================================================================
// Integration
// ============================================================================
pub mod events;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;

pub use error::{LedgerError, Rejection, Result};
pub use processor::{Outcome, TransactionProcessor, TransactionResult};
