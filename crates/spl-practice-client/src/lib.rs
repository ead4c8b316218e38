//! Stateful client for the `spl_practice` program.
//!
//! Layers configuration, an RPC boundary, a wallet boundary and the
//! profile / token / history services on top of `spl-practice-sdk`. A
//! [`Session`] ties them to one connected wallet and a [`Dashboard`]
//! turns the session into a renderable view.
//!
//! The libraries log through `tracing` and never install a subscriber.

pub mod config;
pub mod dashboard;
pub mod error;
pub mod history;
pub mod profile;
pub mod program;
pub mod rpc;
pub mod session;
pub mod task;
pub mod token;
pub mod types;
pub mod wallet;

pub use config::Config;
pub use dashboard::{Dashboard, DashboardView, Notice};
pub use error::{ClientError, ConfigError, RpcError};
pub use history::{
    HistoryPager, HistoryService, TransactionFilter, TransactionKind, TransactionRecord,
    TransactionStatus,
};
pub use profile::ProfileService;
pub use program::ProgramClient;
pub use rpc::{JsonRpcClient, JsonRpcTransport, RpcClient};
pub use session::{Session, SessionState};
pub use task::{CancelToken, Clock, FixedClock, SystemClock};
pub use token::TokenService;
pub use types::{Cluster, Commitment, CurveType, TokenBalance};
pub use wallet::{LocalWallet, WalletSigner};

use spl_practice_sdk::{Idl, SdkError};

/// Parse and validate an IDL document.
pub fn load_idl(json: &str) -> Result<Idl, ConfigError> {
    Idl::from_json(json).and_then(checked).map_err(idl_error)
}

/// The IDL compiled into the SDK.
pub fn bundled_idl() -> Result<Idl, ConfigError> {
    Idl::bundled().and_then(checked).map_err(idl_error)
}

fn checked(idl: Idl) -> Result<Idl, SdkError> {
    idl.check_compatible()?;
    Ok(idl)
}

fn idl_error(e: SdkError) -> ConfigError {
    match e {
        SdkError::MalformedIdl(msg) => ConfigError::MalformedIdl(msg),
        other => ConfigError::MalformedIdl(other.to_string()),
    }
}
