//! Ledger constants

/// Source txid carried by the single input of a coinbase transaction
pub const COINBASE_SENTINEL: &str = "COINBASE";

/// Claimed address carried by the single input of a coinbase transaction
pub const COINBASE_ADDRESS: &str = "COINBASE";

/// `previous_hash` of the genesis block
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Default proof-of-work difficulty: required leading hex zeros
pub const DEFAULT_DIFFICULTY: u64 = 3;

/// Default reward paid by every coinbase
pub const DEFAULT_BLOCK_REWARD: i64 = 50;

/// Address credited by the genesis coinbase unless configured otherwise
pub const DEFAULT_GENESIS_ADDRESS: &str = "alice";

/// Hex characters in a SHA-256 digest; no difficulty above this can be met
pub const MAX_DIFFICULTY: u64 = 64;

/// Maximum number of inputs per transaction
pub const MAX_INPUTS: usize = 1000;

/// Maximum number of outputs per transaction
pub const MAX_OUTPUTS: usize = 1000;

/// Snapshot file holding the chain
pub const CHAIN_FILE: &str = "chain.json";

/// Snapshot file holding the flattened UTXO set
pub const UTXO_FILE: &str = "utxos.json";

/// Snapshot file holding pending transactions
pub const MEMPOOL_FILE: &str = "mempool.json";
