//! Connection lifecycle.
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──bind ok──▶ ConnectedNoProfile ⇄ ConnectedWithProfile
//!      ▲                        │ bind failed                │
//!      └────────────────────────┴──────── disconnect ────────┘
//! ```
//!
//! A [`Session`] owns the services of the connected wallet. Disconnecting
//! cancels the session's [`CancelToken`] so work still in flight on another
//! thread returns `Cancelled` instead of writing into dropped state.

use std::sync::Arc;

use serde::Serialize;
use spl_practice_sdk::address::bytes_to_address;
use spl_practice_sdk::{Idl, Signer};

use crate::config::Config;
use crate::error::ClientError;
use crate::history::HistoryService;
use crate::profile::ProfileService;
use crate::program::ProgramClient;
use crate::rpc::RpcClient;
use crate::task::{CancelToken, Clock, SystemClock};
use crate::token::TokenService;
use crate::wallet::WalletSigner;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Disconnected,
    Connecting,
    ConnectedNoProfile,
    ConnectedWithProfile,
}

impl SessionState {
    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            SessionState::ConnectedNoProfile | SessionState::ConnectedWithProfile
        )
    }
}

/// Services bound to one connected wallet.
pub struct Connected {
    program: Arc<ProgramClient>,
    pub profile: ProfileService,
    pub token: TokenService,
    pub history: HistoryService,
}

impl Connected {
    pub fn program(&self) -> &Arc<ProgramClient> {
        &self.program
    }
}

pub struct Session {
    rpc: Arc<dyn RpcClient>,
    idl: Arc<Idl>,
    config: Arc<Config>,
    clock: Arc<dyn Clock>,
    mint_authority: Option<Arc<dyn Signer + Send + Sync>>,
    state: SessionState,
    cancel: CancelToken,
    connected: Option<Connected>,
    error: Option<String>,
}

impl Session {
    pub fn new(rpc: Arc<dyn RpcClient>, idl: Arc<Idl>, config: Arc<Config>) -> Self {
        Self {
            rpc,
            idl,
            config,
            clock: Arc::new(SystemClock),
            mint_authority: None,
            state: SessionState::Disconnected,
            cancel: CancelToken::new(),
            connected: None,
            error: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Co-signer for daily mints when the configured mint authority is a
    /// separate key.
    pub fn with_mint_authority(mut self, authority: Arc<dyn Signer + Send + Sync>) -> Self {
        self.mint_authority = Some(authority);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Why the last `connect` failed.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// A handle that cancels the current session's in-flight work.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn connected(&self) -> Option<&Connected> {
        self.connected.as_ref()
    }

    pub fn connected_mut(&mut self) -> Result<&mut Connected, ClientError> {
        self.connected.as_mut().ok_or(ClientError::WalletNotConnected)
    }

    pub fn program(&self) -> Result<&Arc<ProgramClient>, ClientError> {
        self.connected
            .as_ref()
            .map(|c| &c.program)
            .ok_or(ClientError::WalletNotConnected)
    }

    pub fn profile_mut(&mut self) -> Result<&mut ProfileService, ClientError> {
        Ok(&mut self.connected_mut()?.profile)
    }

    pub fn token_mut(&mut self) -> Result<&mut TokenService, ClientError> {
        Ok(&mut self.connected_mut()?.token)
    }

    pub fn history_mut(&mut self) -> Result<&mut HistoryService, ClientError> {
        Ok(&mut self.connected_mut()?.history)
    }

    /// Bind `wallet` and load its profile.
    ///
    /// A failed profile read still leaves the session connected (without a
    /// profile); the profile service keeps the error.
    pub fn connect(
        &mut self,
        wallet: Option<Arc<dyn WalletSigner>>,
    ) -> Result<SessionState, ClientError> {
        if self.connected.is_some() {
            self.disconnect();
        }
        self.state = SessionState::Connecting;
        self.error = None;
        self.cancel = CancelToken::new();

        let connected = match self.bind(wallet) {
            Ok(connected) => connected,
            Err(e) => {
                tracing::warn!(error = %e, "wallet connection failed");
                self.state = SessionState::Disconnected;
                self.error = Some(e.to_string());
                return Err(e);
            }
        };
        tracing::info!(
            owner = %bytes_to_address(&connected.program.owner()),
            "wallet connected"
        );
        self.connected = Some(connected);
        self.state = SessionState::ConnectedNoProfile;

        self.refresh_profile()
    }

    /// Re-read the profile and move between the two connected states.
    pub fn refresh_profile(&mut self) -> Result<SessionState, ClientError> {
        match self.profile_mut()?.fetch() {
            Ok(_) => {}
            Err(ClientError::Cancelled) => return Err(ClientError::Cancelled),
            Err(e) => tracing::debug!(error = %e, "profile unavailable"),
        }
        self.sync_state();
        Ok(self.state)
    }

    /// Create the wallet's profile and enter `ConnectedWithProfile`.
    pub fn create_profile(&mut self, name: &str, age: u8) -> Result<String, ClientError> {
        let result = self.profile_mut()?.create(name, age);
        self.sync_state();
        result
    }

    /// Drop the services and cancel anything still running.
    pub fn disconnect(&mut self) {
        self.cancel.cancel();
        if self.connected.take().is_some() {
            tracing::info!("wallet disconnected");
        }
        self.state = SessionState::Disconnected;
    }

    fn bind(&self, wallet: Option<Arc<dyn WalletSigner>>) -> Result<Connected, ClientError> {
        let program = Arc::new(ProgramClient::bind(
            wallet,
            Arc::clone(&self.rpc),
            Arc::clone(&self.idl),
            Arc::clone(&self.config),
        )?);

        let mut token = TokenService::new(
            Arc::clone(&program),
            self.cancel.clone(),
            Arc::clone(&self.clock),
        );
        if let Some(authority) = &self.mint_authority {
            token = token.with_mint_authority(Arc::clone(authority));
        }

        Ok(Connected {
            profile: ProfileService::new(Arc::clone(&program), self.cancel.clone()),
            history: HistoryService::new(Arc::clone(&program), self.cancel.clone())?,
            token,
            program,
        })
    }

    fn sync_state(&mut self) {
        if let Some(connected) = &self.connected {
            let next = if connected.profile.profile().is_some() {
                SessionState::ConnectedWithProfile
            } else {
                SessionState::ConnectedNoProfile
            };
            if next != self.state {
                tracing::debug!(from = ?self.state, to = ?next, "session state");
                self.state = next;
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
