//! Error types for ledger validation and persistence

use thiserror::Error;

use crate::types::Natural;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Transaction rejected: {0}")]
    TransactionRejected(RejectReason),

    #[error("Block validation failed: {0}")]
    BlockValidation(String),

    #[error("Invalid proof of work: {0}")]
    InvalidProofOfWork(String),

    #[error("Insufficient funds: {address} holds {available}, needs {requested}")]
    InsufficientFunds {
        address: String,
        available: i64,
        requested: i64,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Why a transaction failed validate-and-apply. Every variant is recoverable:
/// the caller drops the transaction and carries on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    #[error("coinbase-in-mempool")]
    CoinbaseInMempool,

    #[error("coinbase-misplaced")]
    CoinbaseMisplaced,

    #[error("duplicate-input")]
    DuplicateInput,

    #[error("missing-or-spent-utxo")]
    MissingOrSpentUtxo,

    #[error("ownership-mismatch")]
    OwnershipMismatch,

    #[error("non-positive-amount")]
    NonPositiveAmount,

    #[error("outputs-exceed-inputs")]
    OutputsExceedInputs,

    #[error("txid-mismatch")]
    TxidMismatch,

    #[error("empty-inputs")]
    EmptyInputs,

    #[error("too-many-inputs")]
    TooManyInputs,

    #[error("too-many-outputs")]
    TooManyOutputs,

    #[error("value-overflow")]
    ValueOverflow,
}

/// First rule broken during a chain replay
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainViolation {
    #[error("chain is empty")]
    EmptyChain,

    #[error("block {index} sits at position {position}")]
    IndexGap { position: usize, index: Natural },

    #[error("genesis previous_hash is {0:?}")]
    GenesisLink(String),

    #[error("block {0} does not link to its predecessor")]
    BrokenLink(Natural),

    #[error("block {0} stored hash differs from its content hash")]
    HashMismatch(Natural),

    #[error("block {0} hash does not meet its difficulty")]
    InsufficientWork(Natural),

    #[error("block {index} records difficulty {recorded}, ledger requires {required}")]
    DifficultyTooLow {
        index: Natural,
        recorded: Natural,
        required: Natural,
    },

    #[error("block {0} timestamp precedes its predecessor")]
    TimestampRegression(Natural),

    #[error("block {index} coinbase tagged with height {tagged}")]
    CoinbaseHeight { index: Natural, tagged: Natural },

    #[error("block {0} coinbase pays more than the block reward")]
    CoinbaseReward(Natural),

    #[error("block {index} transaction {position} rejected: {reason}")]
    InvalidTransaction {
        index: Natural,
        position: usize,
        reason: RejectReason,
    },
}
