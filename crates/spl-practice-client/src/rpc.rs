//! The RPC boundary.
//!
//! [`RpcClient`] is the small slice of the Solana JSON-RPC API the services
//! need. [`JsonRpcClient`] implements it over any [`JsonRpcTransport`], so
//! the embedding application chooses the HTTP stack. Requests and
//! responses use base64 for account data and transactions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use spl_practice_sdk::address::{address_to_bytes, bytes_to_address};
use spl_practice_sdk::{parse_transaction, Message, ProgramError};

use crate::config::Config;
use crate::error::RpcError;
use crate::types::Commitment;

// ─── Data returned by the node ──────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub lamports: u64,
    pub owner: [u8; 32],
    pub data: Vec<u8>,
    pub executable: bool,
}

/// One entry of `getSignaturesForAddress`, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureInfo {
    pub signature: String,
    pub slot: u64,
    pub block_time: Option<i64>,
    pub failed: bool,
    pub confirmation: Option<Commitment>,
}

/// Token balance of one account before or after a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBalanceEntry {
    pub account_index: u8,
    pub mint: [u8; 32],
    pub owner: Option<[u8; 32]>,
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDetail {
    pub signature: String,
    pub slot: u64,
    pub block_time: Option<i64>,
    pub failed: bool,
    /// `None` for versioned transactions, which the SDK does not parse.
    pub message: Option<Message>,
    pub pre_token_balances: Vec<TokenBalanceEntry>,
    pub post_token_balances: Vec<TokenBalanceEntry>,
}

// ─── Client trait ───────────────────────────────────────────────────

pub trait RpcClient: Send + Sync {
    /// `Ok(None)` when the account does not exist.
    fn get_account(&self, address: &[u8; 32]) -> Result<Option<AccountInfo>, RpcError>;
    fn get_balance(&self, address: &[u8; 32]) -> Result<u64, RpcError>;
    fn get_genesis_hash(&self) -> Result<String, RpcError>;
    fn get_latest_blockhash(&self) -> Result<[u8; 32], RpcError>;
    /// Submit a signed wire transaction, returning its signature.
    fn send_transaction(&self, wire: &[u8]) -> Result<String, RpcError>;
    /// Block until `signature` reaches the client's commitment level.
    fn confirm_transaction(&self, signature: &str) -> Result<(), RpcError>;
    fn get_signatures_for_address(
        &self,
        address: &[u8; 32],
        before: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>, RpcError>;
    /// `Ok(None)` when the node does not know the signature.
    fn get_transaction(&self, signature: &str) -> Result<Option<TransactionDetail>, RpcError>;
}

/// Decode the custom program error code out of a transaction error such
/// as `{"InstructionError":[0,{"Custom":6000}]}`.
pub fn program_error_from_err(err: &Value) -> Option<ProgramError> {
    let ix = err.get("InstructionError")?.as_array()?;
    let code = ix.get(1)?.get("Custom")?.as_u64()?;
    u32::try_from(code).ok().map(ProgramError::from_code)
}

fn transaction_error(err: &Value) -> RpcError {
    match program_error_from_err(err) {
        Some(p) => RpcError::Program(p),
        None => RpcError::TransactionFailed(err.to_string()),
    }
}

// ─── JSON-RPC implementation ────────────────────────────────────────

/// Sends one JSON-RPC request body and returns the parsed response body.
pub trait JsonRpcTransport: Send + Sync {
    fn post(&self, url: &str, body: &Value) -> Result<Value, RpcError>;
}

/// How `confirm_transaction` polls `getSignatureStatuses`.
#[derive(Debug, Clone, Copy)]
pub struct ConfirmPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for ConfirmPolicy {
    fn default() -> Self {
        Self {
            attempts: 60,
            interval: Duration::from_millis(500),
        }
    }
}

pub struct JsonRpcClient<T> {
    transport: T,
    url: String,
    commitment: Commitment,
    confirm: ConfirmPolicy,
    next_id: AtomicU64,
}

impl<T: JsonRpcTransport> JsonRpcClient<T> {
    pub fn new(transport: T, url: impl Into<String>, commitment: Commitment) -> Self {
        Self {
            transport,
            url: url.into(),
            commitment,
            confirm: ConfirmPolicy::default(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn from_config(transport: T, config: &Config) -> Self {
        Self::new(transport, config.rpc_url.clone(), config.commitment)
    }

    pub fn with_confirm_policy(mut self, policy: ConfirmPolicy) -> Self {
        self.confirm = policy;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        tracing::trace!(method, id, "rpc request");

        let mut response = self.transport.post(&self.url, &body)?;

        if let Some(error) = response.get("error") {
            return Err(rpc_error(error));
        }
        match response.get_mut("result") {
            Some(result) => Ok(result.take()),
            None => Err(RpcError::InvalidResponse(format!(
                "{method}: response has neither result nor error"
            ))),
        }
    }

    fn signature_status(&self, signature: &str) -> Result<Option<(Option<Commitment>, Value)>, RpcError> {
        let result = self.call(
            "getSignatureStatuses",
            json!([[signature], { "searchTransactionHistory": true }]),
        )?;
        let status = field(&result, "value")?
            .as_array()
            .and_then(|statuses| statuses.first())
            .cloned()
            .unwrap_or(Value::Null);
        if status.is_null() {
            return Ok(None);
        }
        let confirmation = status
            .get("confirmationStatus")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok());
        let err = status.get("err").cloned().unwrap_or(Value::Null);
        Ok(Some((confirmation, err)))
    }
}

impl<T: JsonRpcTransport> RpcClient for JsonRpcClient<T> {
    fn get_account(&self, address: &[u8; 32]) -> Result<Option<AccountInfo>, RpcError> {
        let result = self.call(
            "getAccountInfo",
            json!([
                bytes_to_address(address),
                { "encoding": "base64", "commitment": self.commitment.as_str() }
            ]),
        )?;
        let value = field(&result, "value")?;
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(AccountInfo {
            lamports: u64_field(value, "lamports")?,
            owner: address_field(value, "owner")?,
            data: base64_pair(field(value, "data")?)?,
            executable: value
                .get("executable")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }))
    }

    fn get_balance(&self, address: &[u8; 32]) -> Result<u64, RpcError> {
        let result = self.call(
            "getBalance",
            json!([bytes_to_address(address), { "commitment": self.commitment.as_str() }]),
        )?;
        u64_field(&result, "value")
    }

    fn get_genesis_hash(&self) -> Result<String, RpcError> {
        let result = self.call("getGenesisHash", json!([]))?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| RpcError::InvalidResponse("genesis hash is not a string".into()))
    }

    fn get_latest_blockhash(&self) -> Result<[u8; 32], RpcError> {
        let result = self.call(
            "getLatestBlockhash",
            json!([{ "commitment": self.commitment.as_str() }]),
        )?;
        address_field(field(&result, "value")?, "blockhash")
    }

    fn send_transaction(&self, wire: &[u8]) -> Result<String, RpcError> {
        let result = self.call(
            "sendTransaction",
            json!([
                STANDARD.encode(wire),
                { "encoding": "base64", "preflightCommitment": self.commitment.as_str() }
            ]),
        )?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| RpcError::InvalidResponse("signature is not a string".into()))
    }

    fn confirm_transaction(&self, signature: &str) -> Result<(), RpcError> {
        for attempt in 0..self.confirm.attempts {
            if attempt > 0 {
                std::thread::sleep(self.confirm.interval);
            }
            if let Some((confirmation, err)) = self.signature_status(signature)? {
                if !err.is_null() {
                    return Err(transaction_error(&err));
                }
                if confirmation.is_some_and(|c| self.commitment.is_reached_by(c)) {
                    return Ok(());
                }
            }
        }
        Err(RpcError::NotConfirmed(signature.to_string()))
    }

    fn get_signatures_for_address(
        &self,
        address: &[u8; 32],
        before: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>, RpcError> {
        let mut options = json!({ "limit": limit, "commitment": self.commitment.as_str() });
        if let Some(before) = before {
            options["before"] = json!(before);
        }
        let result = self.call(
            "getSignaturesForAddress",
            json!([bytes_to_address(address), options]),
        )?;
        let entries = result
            .as_array()
            .ok_or_else(|| RpcError::InvalidResponse("signatures is not an array".into()))?;

        entries
            .iter()
            .map(|entry| {
                Ok(SignatureInfo {
                    signature: str_field(entry, "signature")?.to_string(),
                    slot: u64_field(entry, "slot")?,
                    block_time: entry.get("blockTime").and_then(Value::as_i64),
                    failed: entry.get("err").is_some_and(|e| !e.is_null()),
                    confirmation: entry
                        .get("confirmationStatus")
                        .and_then(Value::as_str)
                        .and_then(|s| s.parse().ok()),
                })
            })
            .collect()
    }

    fn get_transaction(&self, signature: &str) -> Result<Option<TransactionDetail>, RpcError> {
        let result = self.call(
            "getTransaction",
            json!([
                signature,
                {
                    "encoding": "base64",
                    "commitment": self.commitment.as_str(),
                    "maxSupportedTransactionVersion": 0
                }
            ]),
        )?;
        if result.is_null() {
            return Ok(None);
        }

        let wire = base64_pair(field(&result, "transaction")?)?;
        let message = match parse_transaction(&wire) {
            Ok(parsed) => Some(parsed.message),
            Err(e) => {
                tracing::debug!(signature, error = %e, "skipping unparsable transaction");
                None
            }
        };

        let meta = result.get("meta").cloned().unwrap_or(Value::Null);
        Ok(Some(TransactionDetail {
            signature: signature.to_string(),
            slot: u64_field(&result, "slot")?,
            block_time: result.get("blockTime").and_then(Value::as_i64),
            failed: meta.get("err").is_some_and(|e| !e.is_null()),
            message,
            pre_token_balances: token_balances(&meta, "preTokenBalances")?,
            post_token_balances: token_balances(&meta, "postTokenBalances")?,
        }))
    }
}

// ─── Response parsing ───────────────────────────────────────────────

fn rpc_error(error: &Value) -> RpcError {
    if let Some(p) = error
        .get("data")
        .and_then(|d| d.get("err"))
        .and_then(program_error_from_err)
    {
        return RpcError::Program(p);
    }
    RpcError::Rpc {
        code: error.get("code").and_then(Value::as_i64).unwrap_or(0),
        message: error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string(),
    }
}

fn field<'a>(value: &'a Value, key: &str) -> Result<&'a Value, RpcError> {
    value
        .get(key)
        .ok_or_else(|| RpcError::InvalidResponse(format!("missing `{key}`")))
}

fn str_field<'a>(value: &'a Value, key: &str) -> Result<&'a str, RpcError> {
    field(value, key)?
        .as_str()
        .ok_or_else(|| RpcError::InvalidResponse(format!("`{key}` is not a string")))
}

fn u64_field(value: &Value, key: &str) -> Result<u64, RpcError> {
    field(value, key)?
        .as_u64()
        .ok_or_else(|| RpcError::InvalidResponse(format!("`{key}` is not an unsigned integer")))
}

fn address_field(value: &Value, key: &str) -> Result<[u8; 32], RpcError> {
    let s = str_field(value, key)?;
    address_to_bytes(s).map_err(|e| RpcError::InvalidResponse(format!("`{key}`: {e}")))
}

/// Decode `["<base64>", "base64"]`.
fn base64_pair(value: &Value) -> Result<Vec<u8>, RpcError> {
    let encoded = value
        .as_array()
        .and_then(|pair| pair.first())
        .and_then(Value::as_str)
        .ok_or_else(|| RpcError::InvalidResponse("expected [data, \"base64\"]".into()))?;
    STANDARD
        .decode(encoded)
        .map_err(|e| RpcError::InvalidResponse(format!("base64: {e}")))
}

fn token_balances(meta: &Value, key: &str) -> Result<Vec<TokenBalanceEntry>, RpcError> {
    let Some(entries) = meta.get(key).and_then(Value::as_array) else {
        return Ok(Vec::new());
    };
    entries
        .iter()
        .map(|entry| {
            let index = u64_field(entry, "accountIndex")?;
            let amount = str_field(field(entry, "uiTokenAmount")?, "amount")?;
            Ok(TokenBalanceEntry {
                account_index: u8::try_from(index).map_err(|_| {
                    RpcError::InvalidResponse(format!("account index {index} out of range"))
                })?,
                mint: address_field(entry, "mint")?,
                owner: match entry.get("owner").and_then(Value::as_str) {
                    Some(owner) => Some(address_to_bytes(owner).map_err(|e| {
                        RpcError::InvalidResponse(format!("`owner`: {e}"))
                    })?),
                    None => None,
                },
                amount: amount.parse().map_err(|_| {
                    RpcError::InvalidResponse(format!("token amount `{amount}` is not a u64"))
                })?,
            })
        })
        .collect()
}
