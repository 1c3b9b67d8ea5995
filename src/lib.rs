//! # UTXO Ledger
//!
//! Single-node unspent-output ledger secured by a leading-zero proof of work.
//!
//! Value lives in discrete outputs identified by `(txid, index)`. A transaction
//! consumes outputs it names and creates new ones; the ledger keeps the
//! committed output set, a queue of pending transactions and an append-only
//! chain of mined blocks, and can replay the whole chain from nothing to
//! check that every stored hash, link and spend still holds.
//!
//! ## Layout
//!
//! - [`hash`]: canonical JSON form and SHA-256 digests
//! - [`types`], [`transaction`]: records, identity and validate-and-apply
//! - [`block`], [`pow`]: blocks, per-block replay and the nonce search
//! - [`mempool`], [`mining`]: pending transactions and block assembly
//! - [`chain`]: the [`Blockchain`] that ties them together
//! - [`storage`], [`config`]: JSON snapshots and settings
//!
//! ## Usage
//!
//! ```
//! use utxo_ledger::{Blockchain, LedgerConfig};
//!
//! let mut ledger = Blockchain::new(LedgerConfig::default().with_difficulty(1)).unwrap();
//! assert_eq!(ledger.balance("alice"), Some(50));
//!
//! let payment = ledger.create_payment("alice", "bob", 20).unwrap();
//! assert!(ledger.submit_transaction(payment).unwrap().is_accepted());
//!
//! ledger.mine("miner").unwrap();
//! assert_eq!(ledger.balance("bob"), Some(20));
//! assert_eq!(ledger.balance("alice"), Some(30));
//! assert!(ledger.is_chain_valid());
//! ```

pub mod types;
pub mod constants;
pub mod error;
pub mod hash;
pub mod transaction;
pub mod block;
pub mod pow;
pub mod mempool;
pub mod mining;
pub mod economic;
pub mod chain;
pub mod storage;
pub mod config;

// Re-export commonly used types
pub use types::*;
pub use constants::*;
pub use error::{ChainViolation, LedgerError, RejectReason, Result};
pub use block::{Block, UnsealedBlock};
pub use chain::Blockchain;
pub use config::LedgerConfig;
pub use mempool::{Mempool, MempoolResult};
