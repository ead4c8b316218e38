//! Token balance, daily mint eligibility and the daily mint itself.

use std::sync::Arc;

use spl_practice_sdk::address::bytes_to_address;
use spl_practice_sdk::spl_token::create_associated_token_account_idempotent;
use spl_practice_sdk::{
    daily_mint_record_address, day_index, derive_associated_token_address, instruction,
    token_metadata_address, DailyMintRecord, MintDailyAccounts, MintInfo, Signer, TokenAccount,
    TokenMetadata, TokenMetadataArgs, DAILY_MINT_AMOUNT, TOKEN_DECIMALS, TOKEN_PROGRAM_ID,
};

use crate::error::ClientError;
use crate::program::ProgramClient;
use crate::task::{CancelToken, Clock, ServiceStatus};
use crate::types::TokenBalance;

pub struct TokenService {
    program: Arc<ProgramClient>,
    cancel: CancelToken,
    clock: Arc<dyn Clock>,
    /// Signs `mint_daily_tokens` when the configured mint authority is not
    /// the wallet itself.
    mint_authority: Option<Arc<dyn Signer + Send + Sync>>,
    balance: TokenBalance,
    daily_record: Option<DailyMintRecord>,
    status: ServiceStatus,
}

impl TokenService {
    pub fn new(program: Arc<ProgramClient>, cancel: CancelToken, clock: Arc<dyn Clock>) -> Self {
        Self {
            program,
            cancel,
            clock,
            mint_authority: None,
            balance: TokenBalance::new(0, TOKEN_DECIMALS),
            daily_record: None,
            status: ServiceStatus::default(),
        }
    }

    pub fn with_mint_authority(mut self, authority: Arc<dyn Signer + Send + Sync>) -> Self {
        self.mint_authority = Some(authority);
        self
    }

    pub fn balance(&self) -> TokenBalance {
        self.balance
    }

    pub fn daily_record(&self) -> Option<&DailyMintRecord> {
        self.daily_record.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.status.is_loading()
    }

    pub fn error(&self) -> Option<&str> {
        self.status.error()
    }

    /// The wallet's associated token account for the configured mint.
    pub fn token_account_address(&self) -> Result<[u8; 32], ClientError> {
        Ok(derive_associated_token_address(
            &self.program.owner(),
            &self.program.config().mint,
        )?)
    }

    // ─── Reads ──────────────────────────────────────────────────────

    /// Refresh the token balance. A missing token account, or one not
    /// owned by the Token program, reads as zero.
    pub fn fetch_balance(&mut self) -> Result<TokenBalance, ClientError> {
        self.status.begin();
        let result = self.load_balance();
        let balance = self.status.settle("failed to fetch token balance", result)?;
        self.balance = balance;
        Ok(balance)
    }

    pub fn fetch_daily_record(&mut self) -> Result<Option<&DailyMintRecord>, ClientError> {
        self.status.begin();
        let result = self.load_daily_record();
        let record = self.status.settle("failed to fetch daily mint record", result)?;
        self.daily_record = record;
        Ok(self.daily_record.as_ref())
    }

    /// Whether the cached record allows a mint on the clock's current day.
    pub fn can_mint_today(&self) -> bool {
        self.can_mint_at(self.clock.unix_timestamp())
    }

    pub fn can_mint_at(&self, unix_timestamp: i64) -> bool {
        let today = day_index(unix_timestamp);
        self.daily_record
            .as_ref()
            .map_or(true, |record| record.allows_mint_on(today))
    }

    pub fn fetch_metadata(
        &mut self,
        mint: &[u8; 32],
    ) -> Result<Option<TokenMetadata>, ClientError> {
        self.status.begin();
        let result = self.load_metadata(mint);
        self.status.settle("failed to fetch token metadata", result)
    }

    /// Decode `mint`. A missing account is `AccountNotFound`.
    pub fn fetch_mint(&mut self, mint: &[u8; 32]) -> Result<MintInfo, ClientError> {
        self.status.begin();
        let result = self.load_mint(mint);
        self.status.settle("failed to fetch mint", result)
    }

    // ─── Writes ─────────────────────────────────────────────────────

    /// Claim today's mint.
    ///
    /// Refuses locally when the cached record already shows today. The
    /// program has the final word: when it rejects, the record is
    /// re-read so the next check sees what the chain sees.
    pub fn mint_daily(&mut self) -> Result<String, ClientError> {
        let now = self.clock.unix_timestamp();
        self.status.begin();
        if !self.can_mint_at(now) {
            let day = day_index(now);
            tracing::info!(day, "daily mint already claimed");
            return self.status.settle(
                "failed to mint tokens",
                Err(ClientError::AlreadyMintedToday { day }),
            );
        }

        let result = self.submit_mint().and_then(|signature| {
            self.cancel.check()?;
            Ok(signature)
        });

        if matches!(result, Err(ClientError::Program(_))) {
            match self.load_daily_record() {
                Ok(record) => self.daily_record = record,
                Err(e) => tracing::debug!(error = %e, "could not reconcile daily mint record"),
            }
        }
        let signature = self.status.settle("failed to mint tokens", result)?;
        self.refresh_after_mint(day_index(now))?;
        Ok(signature)
    }

    /// Create the `TokenMetadata` account for `mint`, paid by the wallet.
    pub fn create_metadata(
        &mut self,
        mint: &[u8; 32],
        name: &str,
        symbol: &str,
        description: &str,
    ) -> Result<String, ClientError> {
        self.status.begin();
        let args = TokenMetadataArgs {
            name: name.to_string(),
            symbol: symbol.to_string(),
            description: description.to_string(),
        };
        let result = instruction::create_token_metadata(
            &self.program.program_id(),
            mint,
            &self.program.owner(),
            &args,
        )
        .map_err(ClientError::from)
        .and_then(|ix| {
            self.cancel.check()?;
            let signature = self.program.submit(&[ix])?;
            self.cancel.check()?;
            Ok(signature)
        });
        self.status.settle("failed to create token metadata", result)
    }

    // ─── Internals ──────────────────────────────────────────────────

    fn load_balance(&self) -> Result<TokenBalance, ClientError> {
        let ata = self.token_account_address()?;
        let info = self.program.get_account(&ata)?;
        self.cancel.check()?;

        let Some(info) = info else {
            tracing::debug!(account = %bytes_to_address(&ata), "token account not found");
            return Ok(TokenBalance::new(0, TOKEN_DECIMALS));
        };
        if info.owner != TOKEN_PROGRAM_ID {
            tracing::debug!(
                account = %bytes_to_address(&ata),
                owner = %bytes_to_address(&info.owner),
                "token account has an unexpected owner"
            );
            return Ok(TokenBalance::new(0, TOKEN_DECIMALS));
        }

        let account = TokenAccount::unpack(&info.data)?;
        if account.mint != self.program.config().mint {
            return Err(ClientError::Sdk(spl_practice_sdk::SdkError::AccountDecodeError(
                format!(
                    "token account {} holds mint {}",
                    bytes_to_address(&ata),
                    bytes_to_address(&account.mint)
                ),
            )));
        }
        Ok(TokenBalance::new(account.amount, TOKEN_DECIMALS))
    }

    /// Re-read balance and record after a confirmed mint. Failed reads are
    /// recorded in the status, and a record that could not be read is
    /// assumed to show `day` so the guard stays closed.
    fn refresh_after_mint(&mut self, day: u32) -> Result<(), ClientError> {
        match self.load_balance() {
            Ok(balance) => self.balance = balance,
            Err(ClientError::Cancelled) => return Err(ClientError::Cancelled),
            Err(e) => self.status.record("failed to refresh token balance", &e),
        }
        match self.load_daily_record() {
            Ok(record) => self.daily_record = record,
            Err(ClientError::Cancelled) => return Err(ClientError::Cancelled),
            Err(e) => {
                self.status.record("failed to refresh daily mint record", &e);
                let total_minted = self.daily_record.as_ref().map_or(0, |r| r.total_minted);
                self.daily_record = Some(DailyMintRecord {
                    user: self.program.owner(),
                    last_mint_day: day,
                    total_minted: total_minted.saturating_add(DAILY_MINT_AMOUNT),
                });
            }
        }
        Ok(())
    }

    fn load_metadata(&self, mint: &[u8; 32]) -> Result<Option<TokenMetadata>, ClientError> {
        let (pda, _) = token_metadata_address(mint, &self.program.program_id())?;
        let metadata = self.program.fetch_account::<TokenMetadata>(&pda)?;
        self.cancel.check()?;
        Ok(metadata)
    }

    fn load_mint(&self, mint: &[u8; 32]) -> Result<MintInfo, ClientError> {
        let info = self
            .program
            .get_account(mint)?
            .ok_or_else(|| ClientError::AccountNotFound(bytes_to_address(mint)))?;
        self.cancel.check()?;
        Ok(MintInfo::unpack(&info.data)?)
    }

    fn load_daily_record(&self) -> Result<Option<DailyMintRecord>, ClientError> {
        let (pda, _) =
            daily_mint_record_address(&self.program.owner(), &self.program.program_id())?;
        let record = self.program.fetch_account::<DailyMintRecord>(&pda)?;
        self.cancel.check()?;
        Ok(record)
    }

    fn submit_mint(&self) -> Result<String, ClientError> {
        let owner = self.program.owner();
        let config = self.program.config();
        let user_token_account = self.token_account_address()?;
        let mint_authority = config.mint_authority.unwrap_or(owner);

        let mut instructions = Vec::with_capacity(2);
        if self.program.get_account(&user_token_account)?.is_none() {
            tracing::debug!(
                account = %bytes_to_address(&user_token_account),
                "creating associated token account"
            );
            instructions.push(create_associated_token_account_idempotent(
                &owner,
                &owner,
                &config.mint,
            )?);
        }
        instructions.push(instruction::mint_daily_tokens(
            &self.program.program_id(),
            &MintDailyAccounts {
                user: owner,
                mint: config.mint,
                user_token_account,
                mint_authority,
            },
        )?);
        self.cancel.check()?;

        if mint_authority == owner {
            return self.program.submit(&instructions);
        }
        match &self.mint_authority {
            Some(signer) if signer.pubkey() == mint_authority => {
                let signer: &dyn Signer = signer.as_ref();
                self.program.submit_with(&instructions, &[signer])
            }
            _ => Err(ClientError::MissingSigner(format!(
                "mint authority {} is not available",
                bytes_to_address(&mint_authority)
            ))),
        }
    }
}
