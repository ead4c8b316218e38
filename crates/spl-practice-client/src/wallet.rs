//! The wallet boundary.
//!
//! The client never holds a user's secret key unless the embedder hands it
//! a [`LocalWallet`]. Anything that can report a public key and sign a
//! message (a browser extension bridge, a hardware wallet, a remote
//! signer) implements [`WalletSigner`].

use spl_practice_sdk::address::bytes_to_address;
use spl_practice_sdk::{Keypair, SdkError, Signer};

use crate::error::ClientError;
use crate::types::CurveType;

/// Wallets known to only speak EVM. They may expose a 32-byte key through
/// a compatibility shim, but cannot sign Solana messages.
const EVM_WALLET_NAMES: &[&str] = &["metamask", "rabby", "coinbase wallet (evm)"];

pub trait WalletSigner: Send + Sync {
    fn public_key(&self) -> [u8; 32];
    fn sign_message(&self, message: &[u8]) -> Result<[u8; 64], SdkError>;
    /// Human readable wallet name ("Phantom", "Solflare", ...)
    fn name(&self) -> &str;
    fn curve(&self) -> CurveType {
        CurveType::Ed25519
    }
}

/// Reject wallets that cannot sign Solana transactions.
pub fn check_compatible(wallet: &dyn WalletSigner) -> Result<(), ClientError> {
    if wallet.curve() != CurveType::Ed25519 {
        return Err(ClientError::IncompatibleWallet(format!(
            "{} uses {:?} keys, Solana needs Ed25519",
            wallet.name(),
            wallet.curve()
        )));
    }
    let name = wallet.name().to_ascii_lowercase();
    if EVM_WALLET_NAMES.iter().any(|evm| name == *evm) {
        return Err(ClientError::IncompatibleWallet(format!(
            "{} is an Ethereum wallet",
            wallet.name()
        )));
    }
    Ok(())
}

/// Adapts a [`WalletSigner`] to the SDK's transaction [`Signer`].
pub(crate) struct WalletAsSigner<'a>(pub &'a dyn WalletSigner);

impl Signer for WalletAsSigner<'_> {
    fn pubkey(&self) -> [u8; 32] {
        self.0.public_key()
    }

    fn sign_message(&self, message: &[u8]) -> Result<[u8; 64], SdkError> {
        self.0.sign_message(message)
    }
}

/// A wallet backed by an in-process keypair.
#[derive(Debug)]
pub struct LocalWallet {
    keypair: Keypair,
    name: String,
}

impl LocalWallet {
    pub fn new(keypair: Keypair) -> Self {
        Self {
            keypair,
            name: "Local".into(),
        }
    }

    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self::new(Keypair::from_seed(seed))
    }

    /// Load a Solana CLI keypair file's contents: a JSON array of 64 bytes.
    pub fn from_json_keypair(json: &str) -> Result<Self, ClientError> {
        let bytes: Vec<u8> = serde_json::from_str(json)
            .map_err(|e| SdkError::InvalidPublicKey(format!("keypair file: {e}")))?;
        Ok(Self::new(Keypair::from_keypair_bytes(&bytes)?))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn address(&self) -> String {
        bytes_to_address(&self.keypair.pubkey())
    }
}

impl WalletSigner for LocalWallet {
    fn public_key(&self) -> [u8; 32] {
        self.keypair.pubkey()
    }

    fn sign_message(&self, message: &[u8]) -> Result<[u8; 64], SdkError> {
        self.keypair.sign_message(message)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
