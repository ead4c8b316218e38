//! View model of the account dashboard.
//!
//! Gathers everything the dashboard page shows (profile, token and SOL
//! balances, cluster check, mint eligibility, filtered history) into one
//! serializable [`DashboardView`], and dispatches the page's actions.

use serde::Serialize;
use spl_practice_sdk::address::bytes_to_address;
use spl_practice_sdk::UserProfile;

use crate::error::ClientError;
use crate::history::{TransactionFilter, TransactionRecord};
use crate::session::{Session, SessionState};
use crate::types::{lamports_to_sol, Cluster, TokenBalance, LAMPORTS_PER_SOL};

/// Below this the wallet may not afford transaction fees and rent.
pub const LOW_SOL_THRESHOLD_LAMPORTS: u64 = LAMPORTS_PER_SOL / 100;
pub const DEFAULT_PROFILE_NAME: &str = "User";
pub const DEFAULT_PROFILE_AGE: u8 = 25;
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkInfo {
    pub genesis_hash: String,
    pub cluster: Option<Cluster>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// The RPC node is not on the configured cluster.
    WrongCluster {
        expected: Cluster,
        detected: Option<Cluster>,
    },
    LowSolBalance { sol: f64 },
    AlreadyMintedToday,
}

impl Notice {
    pub fn message(&self) -> String {
        match self {
            Notice::WrongCluster { expected, detected } => match detected {
                Some(cluster) => format!(
                    "connected to {}, switch your wallet to {}",
                    cluster.display_name(),
                    expected.display_name()
                ),
                None => format!(
                    "connected to an unknown cluster, switch your wallet to {}",
                    expected.display_name()
                ),
            },
            Notice::LowSolBalance { sol } => format!(
                "SOL balance is low ({sol:.4} SOL), request an airdrop before sending transactions"
            ),
            Notice::AlreadyMintedToday => "today's tokens have already been minted".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileView {
    pub owner: String,
    pub name: String,
    pub age: u8,
    pub balance: u64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<&UserProfile> for ProfileView {
    fn from(p: &UserProfile) -> Self {
        Self {
            owner: bytes_to_address(&p.owner),
            name: p.name.clone(),
            age: p.age,
            balance: p.balance,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub state: SessionState,
    pub wallet: Option<String>,
    pub profile: Option<ProfileView>,
    pub token_balance: TokenBalance,
    pub ui_token_balance: f64,
    pub sol_balance: Option<f64>,
    pub can_mint_today: bool,
    pub network: Option<NetworkInfo>,
    pub notices: Vec<Notice>,
    pub filter: &'static str,
    pub transactions: Vec<TransactionRecord>,
    /// Messages of services whose last operation failed
    pub errors: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Dashboard {
    filter: TransactionFilter,
    history_limit: usize,
    sol_lamports: Option<u64>,
    network: Option<NetworkInfo>,
    auto_create_attempted: bool,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Dashboard {
    pub fn new() -> Self {
        Self {
            filter: TransactionFilter::All,
            history_limit: DEFAULT_HISTORY_LIMIT,
            sol_lamports: None,
            network: None,
            auto_create_attempted: false,
        }
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn filter(&self) -> TransactionFilter {
        self.filter
    }

    pub fn set_filter(&mut self, filter: TransactionFilter) {
        self.filter = filter;
    }

    /// Select a filter by label. Unknown labels leave the filter as is.
    pub fn set_filter_label(&mut self, label: &str) -> bool {
        match TransactionFilter::from_label(label) {
            Some(filter) => {
                self.filter = filter;
                true
            }
            None => {
                tracing::debug!(label, "unknown transaction filter");
                false
            }
        }
    }

    /// Load everything the page shows.
    ///
    /// Only a missing wallet or a cancelled session is fatal: each
    /// individual read that fails is reported through its service's error
    /// and the rest of the page still loads.
    pub fn load(&mut self, session: &mut Session) -> Result<DashboardView, ClientError> {
        let program = session.program()?.clone();

        match program.rpc().get_genesis_hash() {
            Ok(genesis_hash) => {
                let cluster = Cluster::from_genesis_hash(&genesis_hash);
                tracing::debug!(%genesis_hash, ?cluster, "network check");
                self.network = Some(NetworkInfo {
                    genesis_hash,
                    cluster,
                });
            }
            Err(e) => tracing::warn!(error = %e, "network check failed"),
        }

        match program.rpc().get_balance(&program.owner()) {
            Ok(lamports) => self.sol_lamports = Some(lamports),
            Err(e) => tracing::warn!(error = %e, "SOL balance unavailable"),
        }

        if session.state() == SessionState::ConnectedNoProfile && !self.auto_create_attempted {
            self.auto_create_attempted = true;
            match session.create_profile(DEFAULT_PROFILE_NAME, DEFAULT_PROFILE_AGE) {
                Ok(signature) => tracing::info!(%signature, "created default profile"),
                Err(ClientError::Cancelled) => return Err(ClientError::Cancelled),
                Err(e) => {
                    tracing::debug!(error = %e, "automatic profile creation failed");
                    session.profile_mut()?.clear_error();
                }
            }
        }

        let connected = session.connected_mut()?;
        tolerate(connected.token.fetch_balance())?;
        tolerate(connected.token.fetch_daily_record())?;
        tolerate(connected.history.fetch(self.history_limit))?;

        Ok(self.view(session))
    }

    /// Claim the daily mint and refresh the history.
    pub fn mint_daily(&mut self, session: &mut Session) -> Result<String, ClientError> {
        let connected = session.connected_mut()?;
        let signature = connected.token.mint_daily()?;
        tolerate(connected.history.fetch(self.history_limit))?;
        Ok(signature)
    }

    /// Snapshot of the current state without any network calls.
    pub fn view(&self, session: &Session) -> DashboardView {
        let connected = session.connected();
        let program = connected.map(|c| c.program());

        let token_balance = connected.map(|c| c.token.balance()).unwrap_or_default();
        let can_mint_today = connected.is_some_and(|c| c.token.can_mint_today());

        let mut notices = Vec::new();
        if let Some(network) = &self.network {
            let expected = session.config().cluster;
            if expected
                .genesis_hash()
                .is_some_and(|hash| hash != network.genesis_hash)
            {
                notices.push(Notice::WrongCluster {
                    expected,
                    detected: network.cluster,
                });
            }
        }
        if let Some(lamports) = self.sol_lamports {
            if lamports < LOW_SOL_THRESHOLD_LAMPORTS {
                notices.push(Notice::LowSolBalance {
                    sol: lamports_to_sol(lamports),
                });
            }
        }
        if connected.is_some() && !can_mint_today {
            notices.push(Notice::AlreadyMintedToday);
        }

        let errors = connected
            .map(|c| {
                [c.profile.error(), c.token.error(), c.history.error()]
                    .into_iter()
                    .flatten()
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        DashboardView {
            state: session.state(),
            wallet: program.map(|p| bytes_to_address(&p.owner())),
            profile: connected
                .and_then(|c| c.profile.profile())
                .map(ProfileView::from),
            token_balance,
            ui_token_balance: token_balance.ui_amount(),
            sol_balance: self.sol_lamports.map(lamports_to_sol),
            can_mint_today,
            network: self.network.clone(),
            notices,
            filter: self.filter.label(),
            transactions: connected
                .map(|c| c.history.filtered(self.filter).into_iter().cloned().collect())
                .unwrap_or_default(),
            errors,
        }
    }
}

/// Swallow a failed read (its service already recorded the message) but
/// keep cancellation fatal.
fn tolerate<T>(result: Result<T, ClientError>) -> Result<(), ClientError> {
    match result {
        Ok(_) => Ok(()),
        Err(ClientError::Cancelled) => Err(ClientError::Cancelled),
        Err(_) => Ok(()),
    }
}
