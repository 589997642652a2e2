// Thin re-export module: the store contract lives in `ledger/store.rs` and the
// typed registry views in `ledger/registry.rs`.

pub mod registry;
pub mod store;

pub use registry::*;
pub use store::*;
