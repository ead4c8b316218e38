//! Solana legacy transaction wire format, signing and parsing.
//!
//! Transactions are built by hand, without `solana-sdk`:
//!
//! ```text
//! Transaction:
//!   num_signatures          compact-u16
//!   signatures              64 bytes * num_signatures
//!   message:
//!     num_required_sigs     u8
//!     num_readonly_signed   u8
//!     num_readonly_unsigned u8
//!     num_accounts          compact-u16
//!     account_keys          32 bytes * num_accounts
//!     recent_blockhash      32 bytes
//!     num_instructions      compact-u16
//!     instructions[]        (see below)
//!
//! Instruction:
//!   program_id_index        u8
//!   num_accounts            compact-u16
//!   account_indices         u8 * num_accounts
//!   data_len                compact-u16
//!   data                    u8 * data_len
//! ```

use ed25519_dalek::Signer as _;
use zeroize::Zeroize;

use crate::error::SdkError;

/// The Solana System Program: 32 zero bytes.
pub const SYSTEM_PROGRAM_ID: [u8; 32] = [0u8; 32];

/// Maximum size of a serialized transaction accepted by the cluster.
pub const PACKET_DATA_SIZE: usize = 1232;

// ---------------------------------------------------------------------------
// Compact-u16 encoding
// ---------------------------------------------------------------------------

/// Encode a `u16` value in Solana's compact-u16 format (1 to 3 bytes).
pub fn encode_compact_u16(value: u16) -> Vec<u8> {
    let mut val = value as u32;
    let mut out = Vec::with_capacity(3);

    loop {
        let mut byte = (val & 0x7f) as u8;
        val >>= 7;
        if val > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if val == 0 {
            break;
        }
    }

    out
}

/// Decode a compact-u16 value, returning `(value, bytes_consumed)`.
pub fn decode_compact_u16(data: &[u8]) -> Result<(u16, usize), SdkError> {
    let mut value: u32 = 0;
    let mut shift = 0u32;
    let mut consumed = 0usize;

    loop {
        let byte = *data.get(consumed).ok_or_else(|| {
            SdkError::SerializationError(
                "unexpected end of data while decoding compact-u16".into(),
            )
        })?;
        consumed += 1;

        value |= ((byte & 0x7f) as u32) << shift;
        shift += 7;

        if byte & 0x80 == 0 || consumed >= 3 {
            break;
        }
    }

    if value > u16::MAX as u32 {
        return Err(SdkError::SerializationError(
            "compact-u16 value overflow".into(),
        ));
    }

    Ok((value as u16, consumed))
}

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

/// A single account reference in an instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountMeta {
    pub pubkey: [u8; 32],
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    /// A writable account.
    pub fn writable(pubkey: [u8; 32], is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: true,
        }
    }

    /// A read-only account.
    pub fn readonly(pubkey: [u8; 32], is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: false,
        }
    }
}

/// An instruction before it is compiled into a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub program_id: [u8; 32],
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

/// A compiled legacy message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Account keys in canonical order: writable signers, read-only signers,
    /// writable non-signers, read-only non-signers. The fee payer is first.
    pub account_keys: Vec<[u8; 32]>,
    pub num_required_signatures: u8,
    pub num_readonly_signed: u8,
    pub num_readonly_unsigned: u8,
    pub recent_blockhash: [u8; 32],
    pub instructions: Vec<CompiledInstruction>,
}

/// An instruction whose account references are indices into
/// `Message::account_keys`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub account_indices: Vec<u8>,
    pub data: Vec<u8>,
}

impl Message {
    /// Keys that must sign this message, in signature-slot order.
    pub fn signer_keys(&self) -> &[[u8; 32]] {
        let n = (self.num_required_signatures as usize).min(self.account_keys.len());
        &self.account_keys[..n]
    }

    /// Whether the account at `index` is writable under the header rules.
    pub fn is_writable(&self, index: usize) -> bool {
        let num_signed = self.num_required_signatures as usize;
        if index < num_signed {
            index < num_signed - self.num_readonly_signed as usize
        } else {
            let num_unsigned = self.account_keys.len() - num_signed;
            index - num_signed < num_unsigned - self.num_readonly_unsigned as usize
        }
    }

    /// Expand a compiled instruction back into pubkeys.
    pub fn decompile(&self, ix: &CompiledInstruction) -> Result<Instruction, SdkError> {
        let key = |idx: u8| {
            self.account_keys.get(idx as usize).copied().ok_or_else(|| {
                SdkError::SerializationError(format!("account index {idx} out of range"))
            })
        };

        let mut accounts = Vec::with_capacity(ix.account_indices.len());
        for &idx in &ix.account_indices {
            accounts.push(AccountMeta {
                pubkey: key(idx)?,
                is_signer: (idx as usize) < self.num_required_signatures as usize,
                is_writable: self.is_writable(idx as usize),
            });
        }

        Ok(Instruction {
            program_id: key(ix.program_id_index)?,
            accounts,
            data: ix.data.clone(),
        })
    }
}

/// Anything able to produce Ed25519 signatures for a single public key.
pub trait Signer {
    fn pubkey(&self) -> [u8; 32];
    fn sign_message(&self, message: &[u8]) -> Result<[u8; 64], SdkError>;
}

/// A local Ed25519 keypair. The seed is wiped when the keypair is dropped.
pub struct Keypair {
    signing_key: ed25519_dalek::SigningKey,
}

impl Keypair {
    /// Build a keypair from a 32-byte Ed25519 seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let mut seed = *seed;
        let signing_key = ed25519_dalek::SigningKey::from_bytes(&seed);
        seed.zeroize();
        Self { signing_key }
    }

    /// Build a keypair from the 64-byte `[seed || pubkey]` layout used by
    /// Solana CLI keypair files, checking that both halves agree.
    pub fn from_keypair_bytes(bytes: &[u8]) -> Result<Self, SdkError> {
        let arr: [u8; 64] = bytes.try_into().map_err(|_| {
            SdkError::InvalidPublicKey(format!("expected 64 keypair bytes, got {}", bytes.len()))
        })?;
        let signing_key = ed25519_dalek::SigningKey::from_keypair_bytes(&arr)
            .map_err(|e| SdkError::InvalidPublicKey(format!("keypair mismatch: {e}")))?;
        Ok(Self { signing_key })
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("pubkey", &crate::address::bytes_to_address(&self.pubkey()))
            .finish_non_exhaustive()
    }
}

impl Signer for Keypair {
    fn pubkey(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    fn sign_message(&self, message: &[u8]) -> Result<[u8; 64], SdkError> {
        Ok(self.signing_key.sign(message).to_bytes())
    }
}

// ---------------------------------------------------------------------------
// Compilation and serialization
// ---------------------------------------------------------------------------

/// Compile instructions into a message with a single fee payer.
///
/// The fee payer is always a writable signer at index 0.
pub fn compile_message(
    instructions: &[Instruction],
    fee_payer: &[u8; 32],
    recent_blockhash: &[u8; 32],
) -> Result<Message, SdkError> {
    struct AccountEntry {
        pubkey: [u8; 32],
        is_signer: bool,
        is_writable: bool,
    }

    if instructions.is_empty() {
        return Err(SdkError::TransactionBuildError(
            "a transaction needs at least one instruction".into(),
        ));
    }

    let mut entries: Vec<AccountEntry> = Vec::new();
    let mut upsert = |pubkey: [u8; 32], signer: bool, writable: bool| {
        if let Some(entry) = entries.iter_mut().find(|e| e.pubkey == pubkey) {
            entry.is_signer |= signer;
            entry.is_writable |= writable;
        } else {
            entries.push(AccountEntry {
                pubkey,
                is_signer: signer,
                is_writable: writable,
            });
        }
    };

    upsert(*fee_payer, true, true);
    for ix in instructions {
        for meta in &ix.accounts {
            upsert(meta.pubkey, meta.is_signer, meta.is_writable);
        }
        upsert(ix.program_id, false, false);
    }

    // Stable sort keeps insertion order within a class, so the fee payer
    // stays ahead of the other writable signers.
    entries.sort_by_key(|e| match (e.is_signer, e.is_writable) {
        (true, true) => 0u8,
        (true, false) => 1,
        (false, true) => 2,
        (false, false) => 3,
    });

    if entries.len() > u8::MAX as usize + 1 {
        return Err(SdkError::TransactionBuildError(format!(
            "too many accounts: {}",
            entries.len()
        )));
    }

    let count = |f: fn(&AccountEntry) -> bool| entries.iter().filter(|e| f(e)).count() as u8;
    let num_required_signatures = count(|e| e.is_signer);
    let num_readonly_signed = count(|e| e.is_signer && !e.is_writable);
    let num_readonly_unsigned = count(|e| !e.is_signer && !e.is_writable);

    let account_keys: Vec<[u8; 32]> = entries.iter().map(|e| e.pubkey).collect();
    let index_of = |key: &[u8; 32], what: &str| {
        account_keys
            .iter()
            .position(|k| k == key)
            .map(|i| i as u8)
            .ok_or_else(|| SdkError::TransactionBuildError(format!("{what} not in account keys")))
    };

    let mut compiled = Vec::with_capacity(instructions.len());
    for ix in instructions {
        let program_id_index = index_of(&ix.program_id, "program_id")?;
        let account_indices = ix
            .accounts
            .iter()
            .map(|meta| index_of(&meta.pubkey, "account"))
            .collect::<Result<Vec<u8>, _>>()?;

        compiled.push(CompiledInstruction {
            program_id_index,
            account_indices,
            data: ix.data.clone(),
        });
    }

    Ok(Message {
        account_keys,
        num_required_signatures,
        num_readonly_signed,
        num_readonly_unsigned,
        recent_blockhash: *recent_blockhash,
        instructions: compiled,
    })
}

/// Serialize the message (the bytes that get signed).
pub fn serialize_message(message: &Message) -> Result<Vec<u8>, SdkError> {
    let mut buf = Vec::with_capacity(256);

    buf.push(message.num_required_signatures);
    buf.push(message.num_readonly_signed);
    buf.push(message.num_readonly_unsigned);

    buf.extend_from_slice(&encode_compact_u16(len_u16(message.account_keys.len())?));
    for key in &message.account_keys {
        buf.extend_from_slice(key);
    }

    buf.extend_from_slice(&message.recent_blockhash);

    buf.extend_from_slice(&encode_compact_u16(len_u16(message.instructions.len())?));
    for ix in &message.instructions {
        buf.push(ix.program_id_index);
        buf.extend_from_slice(&encode_compact_u16(len_u16(ix.account_indices.len())?));
        buf.extend_from_slice(&ix.account_indices);
        buf.extend_from_slice(&encode_compact_u16(len_u16(ix.data.len())?));
        buf.extend_from_slice(&ix.data);
    }

    Ok(buf)
}

/// Sign a message with every required signer and return wire bytes.
///
/// `signers` may be given in any order; each required signature slot is
/// filled by the signer whose public key matches it. A missing signer is an
/// error.
pub fn sign_transaction(message: &Message, signers: &[&dyn Signer]) -> Result<Vec<u8>, SdkError> {
    let message_bytes = serialize_message(message)?;
    let required = message.signer_keys();

    let mut wire = Vec::with_capacity(1 + 64 * required.len() + message_bytes.len());
    wire.extend_from_slice(&encode_compact_u16(len_u16(required.len())?));

    for key in required {
        let signer = signers.iter().find(|s| s.pubkey() == *key).ok_or_else(|| {
            SdkError::SigningError(format!(
                "missing signer for {}",
                crate::address::bytes_to_address(key)
            ))
        })?;
        wire.extend_from_slice(&signer.sign_message(&message_bytes)?);
    }

    wire.extend_from_slice(&message_bytes);

    if wire.len() > PACKET_DATA_SIZE {
        return Err(SdkError::TransactionBuildError(format!(
            "transaction of {} bytes exceeds the {PACKET_DATA_SIZE}-byte packet limit",
            wire.len()
        )));
    }

    Ok(wire)
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// A wire transaction split into its signatures and message.
#[derive(Debug, Clone)]
pub struct ParsedTransaction {
    pub signatures: Vec<[u8; 64]>,
    pub message: Message,
    pub message_bytes: Vec<u8>,
}

impl ParsedTransaction {
    /// Check every signature against its signer key.
    pub fn verify_signatures(&self) -> Result<(), SdkError> {
        let signers = self.message.signer_keys();
        if signers.len() != self.signatures.len() {
            return Err(SdkError::SigningError(format!(
                "{} signatures for {} required signers",
                self.signatures.len(),
                signers.len()
            )));
        }

        for (key, sig) in signers.iter().zip(&self.signatures) {
            let vk = ed25519_dalek::VerifyingKey::from_bytes(key)
                .map_err(|e| SdkError::InvalidPublicKey(e.to_string()))?;
            let signature = ed25519_dalek::Signature::from_bytes(sig);
            vk.verify_strict(&self.message_bytes, &signature).map_err(|_| {
                SdkError::SigningError(format!(
                    "invalid signature for {}",
                    crate::address::bytes_to_address(key)
                ))
            })?;
        }
        Ok(())
    }

    /// The first signature, which is the transaction id.
    pub fn id(&self) -> Option<String> {
        self.signatures.first().map(crate::address::signature_to_string)
    }
}

/// Parse wire bytes produced by [`sign_transaction`] (or by any wallet).
pub fn parse_transaction(wire: &[u8]) -> Result<ParsedTransaction, SdkError> {
    let mut reader = Reader::new(wire);

    let num_sigs = reader.compact_u16()? as usize;
    let mut signatures = Vec::with_capacity(num_sigs);
    for _ in 0..num_sigs {
        signatures.push(reader.array::<64>()?);
    }

    let message_start = reader.pos;
    let message = parse_message_from(&mut reader)?;
    if reader.pos != wire.len() {
        return Err(SdkError::SerializationError(format!(
            "{} trailing bytes after message",
            wire.len() - reader.pos
        )));
    }

    Ok(ParsedTransaction {
        signatures,
        message,
        message_bytes: wire[message_start..].to_vec(),
    })
}

fn parse_message_from(reader: &mut Reader<'_>) -> Result<Message, SdkError> {
    let num_required_signatures = reader.u8()?;
    if num_required_signatures & 0x80 != 0 {
        return Err(SdkError::SerializationError(
            "versioned messages are not supported".into(),
        ));
    }
    let num_readonly_signed = reader.u8()?;
    let num_readonly_unsigned = reader.u8()?;

    let num_keys = reader.compact_u16()? as usize;
    let mut account_keys = Vec::with_capacity(num_keys);
    for _ in 0..num_keys {
        account_keys.push(reader.array::<32>()?);
    }

    if (num_required_signatures as usize) > num_keys
        || (num_readonly_signed > num_required_signatures)
        || (num_readonly_unsigned as usize) > num_keys - num_required_signatures as usize
    {
        return Err(SdkError::SerializationError(
            "message header inconsistent with account keys".into(),
        ));
    }

    let recent_blockhash = reader.array::<32>()?;

    let num_ix = reader.compact_u16()? as usize;
    let mut instructions = Vec::with_capacity(num_ix);
    for _ in 0..num_ix {
        let program_id_index = reader.u8()?;
        let n = reader.compact_u16()? as usize;
        let account_indices = reader.bytes(n)?.to_vec();
        let len = reader.compact_u16()? as usize;
        let data = reader.bytes(len)?.to_vec();
        instructions.push(CompiledInstruction {
            program_id_index,
            account_indices,
            data,
        });
    }

    Ok(Message {
        account_keys,
        num_required_signatures,
        num_readonly_signed,
        num_readonly_unsigned,
        recent_blockhash,
        instructions,
    })
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8], SdkError> {
        let end = self.pos.checked_add(n).filter(|&e| e <= self.data.len()).ok_or_else(|| {
            SdkError::SerializationError(format!("truncated transaction at offset {}", self.pos))
        })?;
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, SdkError> {
        Ok(self.bytes(1)?[0])
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], SdkError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    fn compact_u16(&mut self) -> Result<u16, SdkError> {
        let (value, used) = decode_compact_u16(&self.data[self.pos..])?;
        self.pos += used;
        Ok(value)
    }
}

fn len_u16(len: usize) -> Result<u16, SdkError> {
    u16::try_from(len)
        .map_err(|_| SdkError::SerializationError(format!("length {len} exceeds compact-u16")))
}
