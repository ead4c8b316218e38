//! Transaction history of the wallet's token account.
//!
//! Records are built from real ledger queries: signatures touching the
//! associated token account are listed newest first with
//! `getSignaturesForAddress`, each transaction is fetched and classified
//! by the instructions it carries and by how much the wallet's token
//! balance moved.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use spl_practice_sdk::instruction::MINT_DAILY_TOKENS;
use spl_practice_sdk::spl_token::TokenInstruction;
use spl_practice_sdk::{derive_associated_token_address, Message, TOKEN_PROGRAM_ID};

use crate::error::ClientError;
use crate::program::ProgramClient;
use crate::rpc::{SignatureInfo, TokenBalanceEntry, TransactionDetail};
use crate::task::{CancelToken, ServiceStatus};
use crate::types::Commitment;

// ─── Records ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// The program's daily mint
    Mint,
    /// Tokens sent away
    Transfer,
    /// Tokens burned
    Withdraw,
    /// Tokens received
    Tip,
    /// Tokens minted to the wallet by someone else
    Airdrop,
}

impl TransactionKind {
    pub const ALL: [TransactionKind; 5] = [
        TransactionKind::Mint,
        TransactionKind::Transfer,
        TransactionKind::Withdraw,
        TransactionKind::Tip,
        TransactionKind::Airdrop,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TransactionKind::Mint => "mint",
            TransactionKind::Transfer => "transfer",
            TransactionKind::Withdraw => "withdraw",
            TransactionKind::Tip => "tip",
            TransactionKind::Airdrop => "airdrop",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.label() == label)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            TransactionKind::Mint => "Daily Mint",
            TransactionKind::Transfer => "Transfer",
            TransactionKind::Withdraw => "Withdraw",
            TransactionKind::Tip => "Tip",
            TransactionKind::Airdrop => "Airdrop",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Confirmed,
    Pending,
    Failed,
}

impl TransactionStatus {
    pub fn from_signature_info(info: &SignatureInfo) -> Self {
        if info.failed {
            return TransactionStatus::Failed;
        }
        match info.confirmation {
            Some(Commitment::Confirmed | Commitment::Finalized) => TransactionStatus::Confirmed,
            _ => TransactionStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionRecord {
    pub signature: String,
    pub kind: TransactionKind,
    /// Absolute change of the wallet's token balance, in base units
    pub amount: u64,
    /// Block time, when the node reports one
    pub timestamp: Option<i64>,
    pub status: TransactionStatus,
}

// ─── Filtering ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionFilter {
    #[default]
    All,
    Kind(TransactionKind),
}

impl TransactionFilter {
    /// Parse a filter label: `all` or one of the kind labels.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "all" => Some(TransactionFilter::All),
            other => TransactionKind::from_label(other).map(TransactionFilter::Kind),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TransactionFilter::All => "all",
            TransactionFilter::Kind(kind) => kind.label(),
        }
    }

    pub fn matches(&self, record: &TransactionRecord) -> bool {
        match self {
            TransactionFilter::All => true,
            TransactionFilter::Kind(kind) => record.kind == *kind,
        }
    }

    /// Matching records, in their original order.
    pub fn apply<'a>(&self, records: &'a [TransactionRecord]) -> Vec<&'a TransactionRecord> {
        records.iter().filter(|r| self.matches(r)).collect()
    }
}

// ─── Classification ─────────────────────────────────────────────────

/// Whose history is being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryScope {
    pub program_id: [u8; 32],
    pub owner: [u8; 32],
    pub mint: [u8; 32],
    pub token_account: [u8; 32],
}

impl HistoryScope {
    pub fn new(program_id: [u8; 32], owner: [u8; 32], mint: [u8; 32]) -> Result<Self, ClientError> {
        Ok(Self {
            program_id,
            owner,
            mint,
            token_account: derive_associated_token_address(&owner, &mint)?,
        })
    }
}

/// Work out what a transaction did to the wallet's tokens.
///
/// A daily mint of the program wins over anything else in the same
/// transaction. Otherwise the first Token program mint, burn or transfer
/// decides. Transactions touching none of these return `None`.
pub fn classify(
    detail: &TransactionDetail,
    scope: &HistoryScope,
) -> Option<(TransactionKind, u64)> {
    let message = detail.message.as_ref()?;
    let delta = token_delta(detail, message, scope);
    let amount = u64::try_from(delta.unsigned_abs()).unwrap_or(u64::MAX);

    let mut kind = None;
    for ix in &message.instructions {
        let Some(program) = message.account_keys.get(usize::from(ix.program_id_index)) else {
            continue;
        };
        if *program == scope.program_id && ix.data.starts_with(&MINT_DAILY_TOKENS) {
            return Some((TransactionKind::Mint, amount));
        }
        if kind.is_some() || *program != TOKEN_PROGRAM_ID {
            continue;
        }
        kind = TokenInstruction::from_data(&ix.data).map(|t| {
            if t.is_mint() {
                TransactionKind::Airdrop
            } else if t.is_burn() {
                TransactionKind::Withdraw
            } else if delta > 0 {
                TransactionKind::Tip
            } else {
                TransactionKind::Transfer
            }
        });
    }
    kind.map(|k| (k, amount))
}

fn token_delta(detail: &TransactionDetail, message: &Message, scope: &HistoryScope) -> i128 {
    let total = |entries: &[TokenBalanceEntry]| -> i128 {
        entries
            .iter()
            .filter(|e| e.mint == scope.mint && is_wallet_entry(e, message, scope))
            .map(|e| i128::from(e.amount))
            .sum()
    };
    total(&detail.post_token_balances) - total(&detail.pre_token_balances)
}

fn is_wallet_entry(entry: &TokenBalanceEntry, message: &Message, scope: &HistoryScope) -> bool {
    match entry.owner {
        Some(owner) => owner == scope.owner,
        None => message
            .account_keys
            .get(usize::from(entry.account_index))
            .is_some_and(|key| *key == scope.token_account),
    }
}

// ─── Pager ──────────────────────────────────────────────────────────

/// Lazily walks the history, newest first, one signature page at a time.
///
/// Iteration ends when the node runs out of signatures or after the first
/// error. [`refresh`](Self::refresh) starts again from the newest entry.
pub struct HistoryPager {
    program: Arc<ProgramClient>,
    cancel: CancelToken,
    scope: HistoryScope,
    page_size: usize,
    before: Option<String>,
    buffer: VecDeque<TransactionRecord>,
    exhausted: bool,
}

impl HistoryPager {
    pub fn new(program: Arc<ProgramClient>, cancel: CancelToken) -> Result<Self, ClientError> {
        let config = program.config();
        let scope = HistoryScope::new(config.program_id, program.owner(), config.mint)?;
        let page_size = config.history_page_size;
        Ok(Self {
            program,
            cancel,
            scope,
            page_size,
            before: None,
            buffer: VecDeque::new(),
            exhausted: false,
        })
    }

    pub fn scope(&self) -> &HistoryScope {
        &self.scope
    }

    pub fn refresh(&mut self) {
        self.before = None;
        self.buffer.clear();
        self.exhausted = false;
    }

    /// No more records will be produced until the next refresh.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted && self.buffer.is_empty()
    }

    fn fill(&mut self) -> Result<(), ClientError> {
        while self.buffer.is_empty() && !self.exhausted {
            let rpc = self.program.rpc();
            let page = rpc.get_signatures_for_address(
                &self.scope.token_account,
                self.before.as_deref(),
                self.page_size,
            )?;
            self.cancel.check()?;

            if page.len() < self.page_size {
                self.exhausted = true;
            }
            let Some(last) = page.last() else {
                break;
            };
            self.before = Some(last.signature.clone());

            for info in &page {
                let Some(detail) = rpc.get_transaction(&info.signature)? else {
                    tracing::debug!(signature = %info.signature, "transaction not found");
                    continue;
                };
                self.cancel.check()?;
                if let Some((kind, amount)) = classify(&detail, &self.scope) {
                    self.buffer.push_back(TransactionRecord {
                        signature: info.signature.clone(),
                        kind,
                        amount,
                        timestamp: detail.block_time.or(info.block_time),
                        status: TransactionStatus::from_signature_info(info),
                    });
                }
            }
        }
        Ok(())
    }
}

impl Iterator for HistoryPager {
    type Item = Result<TransactionRecord, ClientError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Err(e) = self.fill() {
            self.exhausted = true;
            self.buffer.clear();
            return Some(Err(e));
        }
        self.buffer.pop_front().map(Ok)
    }
}

// ─── Service ────────────────────────────────────────────────────────

pub struct HistoryService {
    pager: HistoryPager,
    records: Vec<TransactionRecord>,
    status: ServiceStatus,
}

impl HistoryService {
    pub fn new(program: Arc<ProgramClient>, cancel: CancelToken) -> Result<Self, ClientError> {
        Ok(Self {
            pager: HistoryPager::new(program, cancel)?,
            records: Vec::new(),
            status: ServiceStatus::default(),
        })
    }

    pub fn records(&self) -> &[TransactionRecord] {
        &self.records
    }

    pub fn filtered(&self, filter: TransactionFilter) -> Vec<&TransactionRecord> {
        filter.apply(&self.records)
    }

    pub fn has_more(&self) -> bool {
        !self.pager.is_exhausted()
    }

    pub fn is_loading(&self) -> bool {
        self.status.is_loading()
    }

    pub fn error(&self) -> Option<&str> {
        self.status.error()
    }

    /// Reload the newest `limit` records.
    pub fn fetch(&mut self, limit: usize) -> Result<&[TransactionRecord], ClientError> {
        self.status.begin();
        self.pager.refresh();
        let result = self.pager.by_ref().take(limit).collect::<Result<Vec<_>, _>>();
        self.records = self.status.settle("failed to fetch transactions", result)?;
        Ok(&self.records)
    }

    /// Append up to `limit` older records.
    pub fn load_more(&mut self, limit: usize) -> Result<&[TransactionRecord], ClientError> {
        self.status.begin();
        let result = self.pager.by_ref().take(limit).collect::<Result<Vec<_>, _>>();
        let more = self.status.settle("failed to fetch transactions", result)?;
        self.records.extend(more);
        Ok(&self.records)
    }
}
