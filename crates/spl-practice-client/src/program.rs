//! Binding between a connected wallet, an RPC node and the deployed
//! program.

use std::sync::Arc;

use spl_practice_sdk::address::bytes_to_address;
use spl_practice_sdk::{
    compile_message, sign_transaction, Idl, Instruction, ProgramAccount, SdkError, Signer,
};

use crate::config::Config;
use crate::error::{ClientError, ConfigError};
use crate::rpc::{AccountInfo, RpcClient};
use crate::wallet::{check_compatible, WalletAsSigner, WalletSigner};

/// Everything needed to read program accounts and submit transactions on
/// behalf of one wallet. Cheap to share behind an `Arc`.
pub struct ProgramClient {
    wallet: Arc<dyn WalletSigner>,
    rpc: Arc<dyn RpcClient>,
    idl: Arc<Idl>,
    config: Arc<Config>,
}

impl std::fmt::Debug for ProgramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgramClient")
            .field("wallet", &self.wallet.name())
            .field("owner", &bytes_to_address(&self.owner()))
            .field("program_id", &bytes_to_address(&self.config.program_id))
            .finish_non_exhaustive()
    }
}

impl ProgramClient {
    /// Bind the program for `wallet`. Makes no network calls.
    ///
    /// # Errors
    ///
    /// * `WalletNotConnected` when `wallet` is `None`
    /// * `IncompatibleWallet` for non-Solana wallets
    /// * `Config(MalformedIdl)` when the IDL does not describe this program
    pub fn bind(
        wallet: Option<Arc<dyn WalletSigner>>,
        rpc: Arc<dyn RpcClient>,
        idl: Arc<Idl>,
        config: Arc<Config>,
    ) -> Result<Self, ClientError> {
        let wallet = wallet.ok_or(ClientError::WalletNotConnected)?;
        check_compatible(wallet.as_ref())?;

        idl.check_compatible().map_err(|e| match e {
            SdkError::MalformedIdl(msg) => ConfigError::MalformedIdl(msg),
            other => ConfigError::MalformedIdl(other.to_string()),
        })?;

        let program_id = bytes_to_address(&config.program_id);
        if let Some(declared) = idl.address.as_deref() {
            if declared != program_id {
                tracing::warn!(
                    declared,
                    configured = %program_id,
                    "IDL address differs from configured program id, using configured"
                );
            }
        }

        let summary = idl.summary();
        tracing::info!(
            wallet = wallet.name(),
            owner = %bytes_to_address(&wallet.public_key()),
            program = %program_id,
            idl = %summary.name,
            version = %summary.version,
            "program bound"
        );

        Ok(Self {
            wallet,
            rpc,
            idl,
            config,
        })
    }

    /// Public key of the connected wallet.
    pub fn owner(&self) -> [u8; 32] {
        self.wallet.public_key()
    }

    pub fn program_id(&self) -> [u8; 32] {
        self.config.program_id
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn idl(&self) -> &Idl {
        &self.idl
    }

    pub fn rpc(&self) -> &dyn RpcClient {
        self.rpc.as_ref()
    }

    pub fn wallet(&self) -> &dyn WalletSigner {
        self.wallet.as_ref()
    }

    pub fn get_account(&self, address: &[u8; 32]) -> Result<Option<AccountInfo>, ClientError> {
        Ok(self.rpc.get_account(address)?)
    }

    /// Read and decode a program-owned account. `Ok(None)` when it does
    /// not exist.
    pub fn fetch_account<T: ProgramAccount>(
        &self,
        address: &[u8; 32],
    ) -> Result<Option<T>, ClientError> {
        let Some(info) = self.rpc.get_account(address)? else {
            return Ok(None);
        };
        if info.owner != self.config.program_id {
            return Err(SdkError::AccountDecodeError(format!(
                "{} at {} is owned by {}",
                T::NAME,
                bytes_to_address(address),
                bytes_to_address(&info.owner)
            ))
            .into());
        }
        Ok(Some(T::decode(&info.data)?))
    }

    /// Sign with the wallet as fee payer, send and wait for confirmation.
    pub fn submit(&self, instructions: &[Instruction]) -> Result<String, ClientError> {
        self.submit_with(instructions, &[])
    }

    /// Like [`submit`](Self::submit), with extra co-signers.
    pub fn submit_with(
        &self,
        instructions: &[Instruction],
        co_signers: &[&dyn Signer],
    ) -> Result<String, ClientError> {
        let blockhash = self.rpc.get_latest_blockhash()?;
        let message = compile_message(instructions, &self.owner(), &blockhash)?;

        let wallet = WalletAsSigner(self.wallet.as_ref());
        let mut signers: Vec<&dyn Signer> = Vec::with_capacity(1 + co_signers.len());
        signers.push(&wallet);
        signers.extend_from_slice(co_signers);

        let wire = match sign_transaction(&message, &signers) {
            Ok(wire) => wire,
            Err(SdkError::SigningError(msg)) if msg.starts_with("missing signer") => {
                return Err(ClientError::MissingSigner(msg));
            }
            Err(e) => return Err(e.into()),
        };

        let signature = self.rpc.send_transaction(&wire)?;
        tracing::info!(%signature, instructions = instructions.len(), "transaction sent");

        self.rpc.confirm_transaction(&signature)?;
        tracing::debug!(%signature, "transaction confirmed");
        Ok(signature)
    }
}
