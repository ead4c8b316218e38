use spl_practice_sdk::{ProgramError, SdkError};
use thiserror::Error;

/// Configuration problems. Fatal for any code path that needs the value.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("malformed IDL: {0}")]
    MalformedIdl(String),
}

/// Failures talking to the RPC node.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The transaction was rejected by the program (preflight or execution).
    #[error("program error: {0}")]
    Program(ProgramError),

    #[error("transaction failed: {0}")]
    TransactionFailed(String),

    #[error("transaction {0} was not confirmed")]
    NotConfirmed(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Errors surfaced by the client services.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("wallet not connected")]
    WalletNotConnected,

    #[error("incompatible wallet: {0}")]
    IncompatibleWallet(String),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("network error: {0}")]
    Rpc(RpcError),

    #[error("program rejected the transaction: {0}")]
    Program(ProgramError),

    #[error(transparent)]
    Sdk(#[from] SdkError),

    #[error("daily tokens already minted today (day {day})")]
    AlreadyMintedToday { day: u32 },

    #[error("balance {balance} + {amount} overflows u64")]
    Overflow { balance: u64, amount: u64 },

    #[error("account {0} not found")]
    AccountNotFound(String),

    #[error("missing signer: {0}")]
    MissingSigner(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl From<RpcError> for ClientError {
    fn from(e: RpcError) -> Self {
        match e {
            RpcError::Program(p) => ClientError::Program(p),
            other => ClientError::Rpc(other),
        }
    }
}

impl ClientError {
    /// Whether the on-chain program (rather than the network or the
    /// client) rejected the request.
    pub fn is_program_rejection(&self) -> bool {
        matches!(self, ClientError::Program(_))
    }
}
