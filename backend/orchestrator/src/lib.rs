//! Sealed-bid tender client.
//!
//! Derives tender phases, caller roles and milestone states from the
//! tender ledger, pairs on-chain records with their off-chain documents,
//! and drives every write through simulate → sign → send → confirm.

pub mod api;
pub mod bid;
pub mod config;
pub mod errors;
pub mod format;
pub mod forms;
pub mod ledger;
pub mod metadata;
pub mod milestone;
pub mod phase;
pub mod refresh;
pub mod role;
pub mod service;
pub mod session;
pub mod types;

#[cfg(test)]
mod testing;
