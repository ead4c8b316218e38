//! In-memory ledger for driving the services end to end.
//!
//! Implements `RpcClient` by parsing and verifying the submitted wire
//! transactions and executing them against a map of accounts. The
//! `spl_practice` program, the Token program (transfer, mint-to, burn) and
//! the associated token account program are emulated with the same account
//! checks and error codes the deployed programs use. A transaction either
//! applies completely or not at all, like a failed preflight.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use spl_practice_client::rpc::{
    AccountInfo, RpcClient, SignatureInfo, TokenBalanceEntry, TransactionDetail,
};
use spl_practice_client::{
    CancelToken, Clock, Commitment, Config, FixedClock, LocalWallet, RpcError, Session,
};
use spl_practice_sdk::pda::{daily_mint_record_address, token_metadata_address, user_profile_address};
use spl_practice_sdk::program::{
    DAILY_MINT_RECORD_SPACE, TOKEN_METADATA_SPACE, USER_PROFILE_SPACE,
};
use spl_practice_sdk::spl_token::{MINT_LEN, TOKEN_ACCOUNT_LEN};
use spl_practice_sdk::{
    compile_message, day_index, derive_associated_token_address, parse_transaction,
    sign_transaction, AccountMeta, DailyMintRecord, Idl, Instruction, Keypair, Message,
    MintInfo, PracticeInstruction, ProgramAccount, ProgramError, Signer, TokenAccount,
    TokenMetadata, UserProfile, ASSOCIATED_TOKEN_PROGRAM_ID, DAILY_MINT_AMOUNT,
    TOKEN_PROGRAM_ID,
};

pub const START: i64 = 1_700_000_000;
pub const DAY: i64 = 86_400;
pub const PROGRAM_ID: [u8; 32] = [0x42; 32];
pub const DEVNET_GENESIS: &str = "EtWTRABZaYq6iMfeYKouRu166VU2xqa1wcaWoxPkrZBG";
pub const MAINNET_GENESIS: &str = "5eykt4UsFv8P8NJdTREpY1vzqKqZKvdpKuc147dw2N9d";

// Token program error codes
const TOKEN_INSUFFICIENT_FUNDS: u32 = 1;
const TOKEN_MINT_MISMATCH: u32 = 3;
const TOKEN_OWNER_MISMATCH: u32 = 4;

// ─── Ledger ─────────────────────────────────────────────────────────

enum ExecError {
    Custom(u32),
    Other(String),
}

impl From<ProgramError> for ExecError {
    fn from(e: ProgramError) -> Self {
        ExecError::Custom(e.code())
    }
}

struct StoredTx {
    detail: TransactionDetail,
}

struct State {
    accounts: HashMap<[u8; 32], AccountInfo>,
    transactions: Vec<StoredTx>,
    blockhashes: u64,
    slot: u64,
    genesis_hash: String,
    sends: usize,
    offline: bool,
    reject_sends: bool,
    reads_offline: bool,
    fail_reads_after_send: bool,
    cancel_on_read: Option<CancelToken>,
}

pub struct Ledger {
    state: Mutex<State>,
    clock: Arc<FixedClock>,
    program_id: [u8; 32],
}

impl Ledger {
    pub fn new(program_id: [u8; 32], clock: Arc<FixedClock>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                accounts: HashMap::new(),
                transactions: Vec::new(),
                blockhashes: 0,
                slot: 1,
                genesis_hash: DEVNET_GENESIS.into(),
                sends: 0,
                offline: false,
                reject_sends: false,
                reads_offline: false,
                fail_reads_after_send: false,
                cancel_on_read: None,
            }),
            clock,
            program_id,
        })
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    // -- setup -----------------------------------------------------------

    pub fn set_account(&self, address: [u8; 32], info: AccountInfo) {
        self.state().accounts.insert(address, info);
    }

    pub fn create_mint(&self, mint: [u8; 32], authority: [u8; 32], decimals: u8) {
        self.set_account(
            mint,
            AccountInfo {
                lamports: 1_461_600,
                owner: TOKEN_PROGRAM_ID,
                data: pack_mint(Some(authority), 0, decimals),
                executable: false,
            },
        );
    }

    pub fn create_token_account(&self, address: [u8; 32], mint: [u8; 32], owner: [u8; 32], amount: u64) {
        self.set_account(
            address,
            AccountInfo {
                lamports: 2_039_280,
                owner: TOKEN_PROGRAM_ID,
                data: pack_token_account(&mint, &owner, amount),
                executable: false,
            },
        );
    }

    pub fn fund(&self, address: [u8; 32], lamports: u64) {
        let mut state = self.state();
        let entry = state.accounts.entry(address).or_insert_with(|| AccountInfo {
            lamports: 0,
            owner: [0u8; 32],
            data: Vec::new(),
            executable: false,
        });
        entry.lamports += lamports;
    }

    pub fn set_genesis_hash(&self, hash: &str) {
        self.state().genesis_hash = hash.into();
    }

    /// Every call fails with a transport error while set.
    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    /// `send_transaction` fails with a JSON-RPC error while set.
    pub fn set_reject_sends(&self, reject: bool) {
        self.state().reject_sends = reject;
    }

    /// Account and history reads time out while set.
    pub fn set_reads_offline(&self, offline: bool) {
        self.state().reads_offline = offline;
    }

    /// Take reads offline as soon as the next transaction lands, so the
    /// write succeeds and the refresh that follows it fails.
    pub fn fail_reads_after_next_send(&self) {
        self.state().fail_reads_after_send = true;
    }

    /// Cancel `token` when the next account read is served, as if the
    /// session were torn down while the request was in flight.
    pub fn cancel_on_next_read(&self, token: CancelToken) {
        self.state().cancel_on_read = Some(token);
    }

    // -- inspection --------------------------------------------------------

    pub fn account(&self, address: &[u8; 32]) -> Option<AccountInfo> {
        self.state().accounts.get(address).cloned()
    }

    pub fn token_amount(&self, address: &[u8; 32]) -> Option<u64> {
        self.account(address)
            .and_then(|info| TokenAccount::unpack(&info.data).ok())
            .map(|a| a.amount)
    }

    pub fn send_count(&self) -> usize {
        self.state().sends
    }

    pub fn transaction_count(&self) -> usize {
        self.state().transactions.len()
    }

    /// Sign and submit `instructions` outside of any service, fee payer
    /// first.
    pub fn execute(&self, instructions: &[Instruction], signers: &[&Keypair]) -> Result<String, RpcError> {
        let blockhash = self.get_latest_blockhash()?;
        let message = compile_message(instructions, &signers[0].pubkey(), &blockhash)
            .map_err(|e| RpcError::InvalidResponse(e.to_string()))?;
        let dyn_signers: Vec<&dyn Signer> = signers.iter().map(|k| *k as &dyn Signer).collect();
        let wire = sign_transaction(&message, &dyn_signers)
            .map_err(|e| RpcError::InvalidResponse(e.to_string()))?;
        self.send_transaction(&wire)
    }

    fn guard(&self) -> Result<(), RpcError> {
        if self.state().offline {
            return Err(RpcError::Transport("connection refused".into()));
        }
        Ok(())
    }

    fn guard_read(&self) -> Result<(), RpcError> {
        self.guard()?;
        if self.state().reads_offline {
            return Err(RpcError::Transport("timeout".into()));
        }
        Ok(())
    }

    // -- execution ---------------------------------------------------------

    fn run(&self, accounts: &mut HashMap<[u8; 32], AccountInfo>, ix: &Instruction) -> Result<(), ExecError> {
        if ix.program_id == self.program_id {
            self.run_program(accounts, ix)
        } else if ix.program_id == TOKEN_PROGRAM_ID {
            run_token(accounts, ix)
        } else if ix.program_id == ASSOCIATED_TOKEN_PROGRAM_ID {
            run_ata(accounts, ix)
        } else {
            Err(ExecError::Other("UnsupportedProgramId".into()))
        }
    }

    fn run_program(&self, accounts: &mut HashMap<[u8; 32], AccountInfo>, ix: &Instruction) -> Result<(), ExecError> {
        let decoded = PracticeInstruction::decode(&ix.data)
            .map_err(|_| ExecError::Custom(101))?; // InstructionFallbackNotFound
        let now = self.clock.unix_timestamp();
        let key = |i: usize| ix.accounts.get(i).ok_or(ExecError::Other("NotEnoughAccountKeys".into()));
        let signer = |i: usize| -> Result<[u8; 32], ExecError> {
            let meta = key(i)?;
            if !meta.is_signer {
                return Err(ExecError::Other("MissingRequiredSignature".into()));
            }
            Ok(meta.pubkey)
        };

        match decoded {
            PracticeInstruction::CreateUserProfile(args) => {
                let profile = key(0)?.pubkey;
                let user = signer(1)?;
                self.expect_pda(profile, user_profile_address(&user, &self.program_id))?;
                if accounts.contains_key(&profile) {
                    return Err(ProgramError::AccountAlreadyInUse.into());
                }
                let account = UserProfile {
                    owner: user,
                    name: args.name,
                    age: args.age,
                    balance: 0,
                    created_at: now,
                    updated_at: now,
                };
                self.store(accounts, profile, &account, USER_PROFILE_SPACE)
            }
            PracticeInstruction::UpdateUserProfile(args) => {
                let profile = key(0)?.pubkey;
                let user = signer(1)?;
                self.expect_pda(profile, user_profile_address(&user, &self.program_id))?;
                let mut account: UserProfile = self.load(accounts, &profile)?;
                if account.owner != user {
                    return Err(ProgramError::Unauthorized.into());
                }
                account.name = args.name;
                account.age = args.age;
                account.updated_at = now;
                self.store(accounts, profile, &account, USER_PROFILE_SPACE)
            }
            PracticeInstruction::AddBalance(args) => {
                let profile = key(0)?.pubkey;
                let user = signer(1)?;
                self.expect_pda(profile, user_profile_address(&user, &self.program_id))?;
                let mut account: UserProfile = self.load(accounts, &profile)?;
                if account.owner != user {
                    return Err(ProgramError::Unauthorized.into());
                }
                account.balance = account
                    .balance
                    .checked_add(args.amount)
                    .ok_or(ProgramError::Overflow)?;
                account.updated_at = now;
                self.store(accounts, profile, &account, USER_PROFILE_SPACE)
            }
            PracticeInstruction::CreateTokenMetadata(args) => {
                let metadata = key(0)?.pubkey;
                let mint = key(1)?.pubkey;
                signer(2)?;
                self.expect_pda(metadata, token_metadata_address(&mint, &self.program_id))?;
                if accounts.contains_key(&metadata) {
                    return Err(ProgramError::AccountAlreadyInUse.into());
                }
                let account = TokenMetadata {
                    mint,
                    name: args.name,
                    symbol: args.symbol,
                    description: args.description,
                    total_supply: 0,
                };
                self.store(accounts, metadata, &account, TOKEN_METADATA_SPACE)
            }
            PracticeInstruction::MintDailyTokens => {
                let record_key = key(0)?.pubkey;
                let mint = key(1)?.pubkey;
                let token_account = key(2)?.pubkey;
                let authority = signer(3)?;
                let user = signer(4)?;
                self.expect_pda(record_key, daily_mint_record_address(&user, &self.program_id))?;

                let mut record = if accounts.contains_key(&record_key) {
                    self.load::<DailyMintRecord>(accounts, &record_key)?
                } else {
                    DailyMintRecord {
                        user,
                        last_mint_day: 0,
                        total_minted: 0,
                    }
                };

                let ata = accounts
                    .get(&token_account)
                    .filter(|info| info.owner == TOKEN_PROGRAM_ID)
                    .and_then(|info| TokenAccount::unpack(&info.data).ok())
                    .ok_or(ProgramError::AccountNotInitialized)?;
                if ata.owner != user {
                    return Err(ProgramError::Unauthorized.into());
                }

                let today = day_index(now);
                if record.last_mint_day == today {
                    return Err(ProgramError::Unauthorized.into());
                }

                mint_to(accounts, &mint, &token_account, &authority, DAILY_MINT_AMOUNT)?;

                record.last_mint_day = today;
                record.total_minted = record
                    .total_minted
                    .checked_add(DAILY_MINT_AMOUNT)
                    .ok_or(ProgramError::Overflow)?;
                self.store(accounts, record_key, &record, DAILY_MINT_RECORD_SPACE)
            }
        }
    }

    fn expect_pda(
        &self,
        actual: [u8; 32],
        derived: Result<([u8; 32], u8), spl_practice_sdk::SdkError>,
    ) -> Result<(), ExecError> {
        match derived {
            Ok((expected, _)) if expected == actual => Ok(()),
            _ => Err(ProgramError::ConstraintSeeds.into()),
        }
    }

    fn load<T: ProgramAccount>(
        &self,
        accounts: &HashMap<[u8; 32], AccountInfo>,
        address: &[u8; 32],
    ) -> Result<T, ExecError> {
        let info = accounts
            .get(address)
            .ok_or(ProgramError::AccountNotInitialized)?;
        if info.owner != self.program_id {
            return Err(ExecError::Custom(3007)); // AccountOwnedByWrongProgram
        }
        T::decode(&info.data).map_err(|_| ExecError::Custom(3002)) // AccountDiscriminatorMismatch
    }

    fn store<T: ProgramAccount>(
        &self,
        accounts: &mut HashMap<[u8; 32], AccountInfo>,
        address: [u8; 32],
        account: &T,
        space: usize,
    ) -> Result<(), ExecError> {
        let mut data = account
            .encode()
            .map_err(|e| ExecError::Other(e.to_string()))?;
        if data.len() > space {
            return Err(ExecError::Other("AccountDidNotSerialize".into()));
        }
        data.resize(space, 0);
        let lamports = accounts.get(&address).map_or(1_000_000, |a| a.lamports);
        accounts.insert(
            address,
            AccountInfo {
                lamports,
                owner: self.program_id,
                data,
                executable: false,
            },
        );
        Ok(())
    }
}

// ─── Token and ATA programs ─────────────────────────────────────────

fn run_token(accounts: &mut HashMap<[u8; 32], AccountInfo>, ix: &Instruction) -> Result<(), ExecError> {
    let tag = *ix.data.first().ok_or(ExecError::Other("InvalidInstructionData".into()))?;
    let amount = ix
        .data
        .get(1..9)
        .and_then(|b| b.try_into().ok())
        .map(u64::from_le_bytes)
        .ok_or(ExecError::Other("InvalidInstructionData".into()))?;
    let meta = |i: usize| ix.accounts.get(i).ok_or(ExecError::Other("NotEnoughAccountKeys".into()));
    let authority = meta(2)?;
    if !authority.is_signer {
        return Err(ExecError::Other("MissingRequiredSignature".into()));
    }

    match tag {
        // Transfer: [source, destination, owner]
        3 => {
            let (source, dest) = (meta(0)?.pubkey, meta(1)?.pubkey);
            let mut from = token_account(accounts, &source)?;
            let mut to = token_account(accounts, &dest)?;
            if from.owner != authority.pubkey {
                return Err(ExecError::Custom(TOKEN_OWNER_MISMATCH));
            }
            if from.mint != to.mint {
                return Err(ExecError::Custom(TOKEN_MINT_MISMATCH));
            }
            from.amount = from
                .amount
                .checked_sub(amount)
                .ok_or(ExecError::Custom(TOKEN_INSUFFICIENT_FUNDS))?;
            write_token_account(accounts, &source, &from);
            if source == dest {
                to = from;
            }
            to.amount += amount;
            write_token_account(accounts, &dest, &to);
            Ok(())
        }
        // MintTo: [mint, destination, authority]
        7 => mint_to(accounts, &meta(0)?.pubkey, &meta(1)?.pubkey, &authority.pubkey, amount),
        // Burn: [account, mint, owner]
        8 => {
            let (account_key, mint_key) = (meta(0)?.pubkey, meta(1)?.pubkey);
            let mut account = token_account(accounts, &account_key)?;
            let mut mint = mint_info(accounts, &mint_key)?;
            if account.owner != authority.pubkey {
                return Err(ExecError::Custom(TOKEN_OWNER_MISMATCH));
            }
            if account.mint != mint_key {
                return Err(ExecError::Custom(TOKEN_MINT_MISMATCH));
            }
            account.amount = account
                .amount
                .checked_sub(amount)
                .ok_or(ExecError::Custom(TOKEN_INSUFFICIENT_FUNDS))?;
            mint.supply -= amount;
            write_token_account(accounts, &account_key, &account);
            write_mint(accounts, &mint_key, &mint);
            Ok(())
        }
        _ => Err(ExecError::Other("InvalidInstruction".into())),
    }
}

fn mint_to(
    accounts: &mut HashMap<[u8; 32], AccountInfo>,
    mint_key: &[u8; 32],
    dest: &[u8; 32],
    authority: &[u8; 32],
    amount: u64,
) -> Result<(), ExecError> {
    let mut mint = mint_info(accounts, mint_key)?;
    let mut account = token_account(accounts, dest)?;
    if mint.mint_authority != Some(*authority) {
        return Err(ExecError::Custom(TOKEN_OWNER_MISMATCH));
    }
    if account.mint != *mint_key {
        return Err(ExecError::Custom(TOKEN_MINT_MISMATCH));
    }
    mint.supply += amount;
    account.amount += amount;
    write_mint(accounts, mint_key, &mint);
    write_token_account(accounts, dest, &account);
    Ok(())
}

// CreateIdempotent: [payer, ata, wallet, mint, system, token]
fn run_ata(accounts: &mut HashMap<[u8; 32], AccountInfo>, ix: &Instruction) -> Result<(), ExecError> {
    if ix.data != [1] {
        return Err(ExecError::Other("InvalidInstructionData".into()));
    }
    let key = |i: usize| {
        ix.accounts
            .get(i)
            .map(|m| m.pubkey)
            .ok_or(ExecError::Other("NotEnoughAccountKeys".into()))
    };
    let (ata, wallet, mint) = (key(1)?, key(2)?, key(3)?);
    let expected = derive_associated_token_address(&wallet, &mint)
        .map_err(|e| ExecError::Other(e.to_string()))?;
    if expected != ata {
        return Err(ExecError::Other("InvalidSeeds".into()));
    }
    mint_info(accounts, &mint)?;
    if !accounts.contains_key(&ata) {
        accounts.insert(
            ata,
            AccountInfo {
                lamports: 2_039_280,
                owner: TOKEN_PROGRAM_ID,
                data: pack_token_account(&mint, &wallet, 0),
                executable: false,
            },
        );
    }
    Ok(())
}

fn token_account(accounts: &HashMap<[u8; 32], AccountInfo>, key: &[u8; 32]) -> Result<TokenAccount, ExecError> {
    accounts
        .get(key)
        .filter(|info| info.owner == TOKEN_PROGRAM_ID)
        .and_then(|info| TokenAccount::unpack(&info.data).ok())
        .ok_or(ExecError::Other("InvalidAccountData".into()))
}

fn mint_info(accounts: &HashMap<[u8; 32], AccountInfo>, key: &[u8; 32]) -> Result<MintInfo, ExecError> {
    accounts
        .get(key)
        .filter(|info| info.owner == TOKEN_PROGRAM_ID)
        .and_then(|info| MintInfo::unpack(&info.data).ok())
        .ok_or(ExecError::Other("InvalidAccountData".into()))
}

fn write_token_account(accounts: &mut HashMap<[u8; 32], AccountInfo>, key: &[u8; 32], account: &TokenAccount) {
    if let Some(info) = accounts.get_mut(key) {
        info.data = pack_token_account(&account.mint, &account.owner, account.amount);
    }
}

fn write_mint(accounts: &mut HashMap<[u8; 32], AccountInfo>, key: &[u8; 32], mint: &MintInfo) {
    if let Some(info) = accounts.get_mut(key) {
        info.data = pack_mint(mint.mint_authority, mint.supply, mint.decimals);
    }
}

pub fn pack_token_account(mint: &[u8; 32], owner: &[u8; 32], amount: u64) -> Vec<u8> {
    let mut data = vec![0u8; TOKEN_ACCOUNT_LEN];
    data[0..32].copy_from_slice(mint);
    data[32..64].copy_from_slice(owner);
    data[64..72].copy_from_slice(&amount.to_le_bytes());
    data[108] = 1; // initialized
    data
}

pub fn pack_mint(authority: Option<[u8; 32]>, supply: u64, decimals: u8) -> Vec<u8> {
    let mut data = vec![0u8; MINT_LEN];
    if let Some(authority) = authority {
        data[0..4].copy_from_slice(&1u32.to_le_bytes());
        data[4..36].copy_from_slice(&authority);
    }
    data[36..44].copy_from_slice(&supply.to_le_bytes());
    data[44] = decimals;
    data[45] = 1;
    data
}

// ─── Token instruction builders ─────────────────────────────────────

pub fn token_transfer(source: [u8; 32], dest: [u8; 32], owner: [u8; 32], amount: u64) -> Instruction {
    token_ix(3, amount, vec![
        AccountMeta::writable(source, false),
        AccountMeta::writable(dest, false),
        AccountMeta::readonly(owner, true),
    ])
}

pub fn token_mint_to(mint: [u8; 32], dest: [u8; 32], authority: [u8; 32], amount: u64) -> Instruction {
    token_ix(7, amount, vec![
        AccountMeta::writable(mint, false),
        AccountMeta::writable(dest, false),
        AccountMeta::readonly(authority, true),
    ])
}

pub fn token_burn(account: [u8; 32], mint: [u8; 32], owner: [u8; 32], amount: u64) -> Instruction {
    token_ix(8, amount, vec![
        AccountMeta::writable(account, false),
        AccountMeta::writable(mint, false),
        AccountMeta::readonly(owner, true),
    ])
}

fn token_ix(tag: u8, amount: u64, accounts: Vec<AccountMeta>) -> Instruction {
    let mut data = vec![tag];
    data.extend_from_slice(&amount.to_le_bytes());
    Instruction {
        program_id: TOKEN_PROGRAM_ID,
        accounts,
        data,
    }
}

// ─── RpcClient ──────────────────────────────────────────────────────

fn token_balances(accounts: &HashMap<[u8; 32], AccountInfo>, message: &Message) -> Vec<TokenBalanceEntry> {
    message
        .account_keys
        .iter()
        .enumerate()
        .filter_map(|(index, key)| {
            let info = accounts.get(key)?;
            if info.owner != TOKEN_PROGRAM_ID || info.data.len() != TOKEN_ACCOUNT_LEN {
                return None;
            }
            let account = TokenAccount::unpack(&info.data).ok()?;
            Some(TokenBalanceEntry {
                account_index: index as u8,
                mint: account.mint,
                owner: Some(account.owner),
                amount: account.amount,
            })
        })
        .collect()
}

impl RpcClient for Ledger {
    fn get_account(&self, address: &[u8; 32]) -> Result<Option<AccountInfo>, RpcError> {
        self.guard_read()?;
        let mut state = self.state();
        if let Some(token) = state.cancel_on_read.take() {
            token.cancel();
        }
        Ok(state.accounts.get(address).cloned())
    }

    fn get_balance(&self, address: &[u8; 32]) -> Result<u64, RpcError> {
        self.guard_read()?;
        Ok(self.state().accounts.get(address).map_or(0, |a| a.lamports))
    }

    fn get_genesis_hash(&self) -> Result<String, RpcError> {
        self.guard()?;
        Ok(self.state().genesis_hash.clone())
    }

    fn get_latest_blockhash(&self) -> Result<[u8; 32], RpcError> {
        self.guard()?;
        let mut state = self.state();
        state.blockhashes += 1;
        let mut hash = [0xBB; 32];
        hash[..8].copy_from_slice(&state.blockhashes.to_le_bytes());
        Ok(hash)
    }

    fn send_transaction(&self, wire: &[u8]) -> Result<String, RpcError> {
        self.guard()?;
        let mut state = self.state();
        state.sends += 1;
        if state.reject_sends {
            return Err(RpcError::Rpc {
                code: -32005,
                message: "Node is unhealthy".into(),
            });
        }

        let parsed = parse_transaction(wire).map_err(|e| RpcError::Rpc {
            code: -32602,
            message: e.to_string(),
        })?;
        parsed.verify_signatures().map_err(|e| RpcError::Rpc {
            code: -32003,
            message: format!("Transaction signature verification failure: {e}"),
        })?;
        let signature = parsed
            .id()
            .ok_or_else(|| RpcError::InvalidResponse("unsigned transaction".into()))?;

        let message = parsed.message;
        let mut working = state.accounts.clone();
        let pre = token_balances(&working, &message);
        for compiled in &message.instructions {
            let ix = message
                .decompile(compiled)
                .map_err(|e| RpcError::TransactionFailed(e.to_string()))?;
            self.run(&mut working, &ix).map_err(|e| match e {
                ExecError::Custom(code) => RpcError::Program(ProgramError::from_code(code)),
                ExecError::Other(msg) => RpcError::TransactionFailed(msg),
            })?;
        }
        let post = token_balances(&working, &message);

        state.accounts = working;
        if state.fail_reads_after_send {
            state.fail_reads_after_send = false;
            state.reads_offline = true;
        }
        state.slot += 1;
        let slot = state.slot;
        state.transactions.push(StoredTx {
            detail: TransactionDetail {
                signature: signature.clone(),
                slot,
                block_time: Some(self.clock.unix_timestamp()),
                failed: false,
                message: Some(message),
                pre_token_balances: pre,
                post_token_balances: post,
            },
        });
        Ok(signature)
    }

    fn confirm_transaction(&self, signature: &str) -> Result<(), RpcError> {
        self.guard()?;
        if self
            .state()
            .transactions
            .iter()
            .any(|tx| tx.detail.signature == signature)
        {
            Ok(())
        } else {
            Err(RpcError::NotConfirmed(signature.into()))
        }
    }

    fn get_signatures_for_address(
        &self,
        address: &[u8; 32],
        before: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>, RpcError> {
        self.guard_read()?;
        let state = self.state();
        let mut newest_first = state.transactions.iter().rev().filter(|tx| {
            tx.detail
                .message
                .as_ref()
                .is_some_and(|m| m.account_keys.contains(address))
        });

        if let Some(before) = before {
            for tx in newest_first.by_ref() {
                if tx.detail.signature == before {
                    break;
                }
            }
        }

        Ok(newest_first
            .take(limit)
            .map(|tx| SignatureInfo {
                signature: tx.detail.signature.clone(),
                slot: tx.detail.slot,
                block_time: tx.detail.block_time,
                failed: tx.detail.failed,
                confirmation: Some(Commitment::Finalized),
            })
            .collect())
    }

    fn get_transaction(&self, signature: &str) -> Result<Option<TransactionDetail>, RpcError> {
        self.guard_read()?;
        Ok(self
            .state()
            .transactions
            .iter()
            .find(|tx| tx.detail.signature == signature)
            .map(|tx| tx.detail.clone()))
    }
}

// ─── Harness ────────────────────────────────────────────────────────

pub struct Harness {
    pub ledger: Arc<Ledger>,
    pub clock: Arc<FixedClock>,
    pub config: Arc<Config>,
    pub idl: Arc<Idl>,
    pub user_seed: [u8; 32],
    pub mint: [u8; 32],
}

impl Harness {
    /// A funded user whose wallet is also the mint authority.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let clock = Arc::new(FixedClock::new(START));
        let ledger = Ledger::new(PROGRAM_ID, Arc::clone(&clock));
        let user_seed: [u8; 32] = rand::random();
        let mint = Keypair::from_seed(&rand::random()).pubkey();

        let mut config = Config::new(PROGRAM_ID);
        config.mint = mint;
        adjust(&mut config);

        let user = Keypair::from_seed(&user_seed).pubkey();
        ledger.create_mint(mint, config.mint_authority.unwrap_or(user), 9);
        ledger.fund(user, 2_000_000_000);

        Self {
            ledger,
            clock,
            config: Arc::new(config),
            idl: Arc::new(Idl::bundled().unwrap()),
            user_seed,
            mint,
        }
    }

    pub fn user_keypair(&self) -> Keypair {
        Keypair::from_seed(&self.user_seed)
    }

    pub fn user(&self) -> [u8; 32] {
        self.user_keypair().pubkey()
    }

    pub fn wallet(&self) -> Arc<LocalWallet> {
        Arc::new(LocalWallet::from_seed(&self.user_seed).with_name("Phantom"))
    }

    pub fn user_ata(&self) -> [u8; 32] {
        derive_associated_token_address(&self.user(), &self.mint).unwrap()
    }

    pub fn session(&self) -> Session {
        Session::new(
            Arc::clone(&self.ledger) as Arc<dyn RpcClient>,
            Arc::clone(&self.idl),
            Arc::clone(&self.config),
        )
        .with_clock(Arc::clone(&self.clock) as Arc<dyn Clock>)
    }

    pub fn connected_session(&self) -> Session {
        let mut session = self.session();
        session.connect(Some(self.wallet())).unwrap();
        session
    }
}
