//! SPL Token program support.
//!
//! Associated token account (ATA) derivation, the create-ATA instruction and
//! decoding of the packed Token program account layouts, without the
//! `spl-token` crates.

use crate::error::SdkError;
use crate::pda::find_program_address;
use crate::transaction::{AccountMeta, Instruction, SYSTEM_PROGRAM_ID};

// ---------------------------------------------------------------------------
// Well-known program IDs
// ---------------------------------------------------------------------------

/// SPL Token Program ID: `TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA`
pub const TOKEN_PROGRAM_ID: [u8; 32] = [
    0x06, 0xdd, 0xf6, 0xe1, 0xd7, 0x65, 0xa1, 0x93, 0xd9, 0xcb, 0xe1, 0x46, 0xce, 0xeb, 0x79,
    0xac, 0x1c, 0xb4, 0x85, 0xed, 0x5f, 0x5b, 0x37, 0x91, 0x3a, 0x8c, 0xf5, 0x85, 0x7e, 0xff,
    0x00, 0xa9,
];

/// Associated Token Account Program ID: `ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL`
pub const ASSOCIATED_TOKEN_PROGRAM_ID: [u8; 32] = [
    0x8c, 0x97, 0x25, 0x8f, 0x4e, 0x24, 0x89, 0xf1, 0xbb, 0x3d, 0x10, 0x29, 0x14, 0x8e, 0x0d,
    0x83, 0x0b, 0x5a, 0x13, 0x99, 0xda, 0xff, 0x10, 0x84, 0x04, 0x8e, 0x7b, 0xd8, 0xdb, 0xe9,
    0xf8, 0x59,
];

/// Packed size of a Token account.
pub const TOKEN_ACCOUNT_LEN: usize = 165;
/// Packed size of a Mint.
pub const MINT_LEN: usize = 82;

/// ATA program `CreateIdempotent` instruction tag.
const ATA_CREATE_IDEMPOTENT: u8 = 1;

// ---------------------------------------------------------------------------
// Associated token accounts
// ---------------------------------------------------------------------------

/// Derive the associated token account for a wallet + mint pair.
///
/// Seeds: `[wallet, token_program_id, mint]` under the ATA program.
pub fn derive_associated_token_address(
    wallet: &[u8; 32],
    mint: &[u8; 32],
) -> Result<[u8; 32], SdkError> {
    find_program_address(
        &[wallet.as_ref(), &TOKEN_PROGRAM_ID, mint.as_ref()],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    )
    .map(|(address, _bump)| address)
}

/// Build an ATA program `CreateIdempotent` instruction.
///
/// Succeeds on-chain even if the account already exists, so it can be
/// prepended to a transaction whenever the ATA looked missing.
pub fn create_associated_token_account_idempotent(
    payer: &[u8; 32],
    wallet: &[u8; 32],
    mint: &[u8; 32],
) -> Result<Instruction, SdkError> {
    let ata = derive_associated_token_address(wallet, mint)?;

    Ok(Instruction {
        program_id: ASSOCIATED_TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::writable(*payer, true),
            AccountMeta::writable(ata, false),
            AccountMeta::readonly(*wallet, false),
            AccountMeta::readonly(*mint, false),
            AccountMeta::readonly(SYSTEM_PROGRAM_ID, false),
            AccountMeta::readonly(TOKEN_PROGRAM_ID, false),
        ],
        data: vec![ATA_CREATE_IDEMPOTENT],
    })
}

// ---------------------------------------------------------------------------
// Instruction tags
// ---------------------------------------------------------------------------

/// The Token program instructions the transaction history cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenInstruction {
    Transfer,
    MintTo,
    Burn,
    TransferChecked,
    MintToChecked,
    BurnChecked,
}

impl TokenInstruction {
    /// Identify a Token program instruction from its data. Other tags
    /// (InitializeMint, Approve, ...) return `None`.
    pub fn from_data(data: &[u8]) -> Option<Self> {
        match data.first()? {
            3 => Some(Self::Transfer),
            7 => Some(Self::MintTo),
            8 => Some(Self::Burn),
            12 => Some(Self::TransferChecked),
            14 => Some(Self::MintToChecked),
            15 => Some(Self::BurnChecked),
            _ => None,
        }
    }

    pub fn is_transfer(self) -> bool {
        matches!(self, Self::Transfer | Self::TransferChecked)
    }

    pub fn is_mint(self) -> bool {
        matches!(self, Self::MintTo | Self::MintToChecked)
    }

    pub fn is_burn(self) -> bool {
        matches!(self, Self::Burn | Self::BurnChecked)
    }
}

// ---------------------------------------------------------------------------
// Account layouts
// ---------------------------------------------------------------------------

/// The fields of a Token account this client reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenAccount {
    pub mint: [u8; 32],
    pub owner: [u8; 32],
    pub amount: u64,
    pub delegate: Option<[u8; 32]>,
    pub is_frozen: bool,
}

impl TokenAccount {
    /// Decode a packed 165-byte Token account.
    pub fn unpack(data: &[u8]) -> Result<Self, SdkError> {
        if data.len() != TOKEN_ACCOUNT_LEN {
            return Err(SdkError::AccountDecodeError(format!(
                "token account must be {TOKEN_ACCOUNT_LEN} bytes, got {}",
                data.len()
            )));
        }

        let state = data[108];
        if state == 0 {
            return Err(SdkError::AccountDecodeError(
                "token account is not initialized".into(),
            ));
        }

        Ok(Self {
            mint: read_key(data, 0),
            owner: read_key(data, 32),
            amount: read_u64(data, 64),
            delegate: read_coption_key(data, 72)?,
            is_frozen: state == 2,
        })
    }
}

/// The fields of a Mint this client reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintInfo {
    pub mint_authority: Option<[u8; 32]>,
    pub supply: u64,
    pub decimals: u8,
    pub is_initialized: bool,
    pub freeze_authority: Option<[u8; 32]>,
}

impl MintInfo {
    /// Decode a packed 82-byte Mint.
    pub fn unpack(data: &[u8]) -> Result<Self, SdkError> {
        if data.len() != MINT_LEN {
            return Err(SdkError::AccountDecodeError(format!(
                "mint must be {MINT_LEN} bytes, got {}",
                data.len()
            )));
        }

        Ok(Self {
            mint_authority: read_coption_key(data, 0)?,
            supply: read_u64(data, 36),
            decimals: data[44],
            is_initialized: data[45] != 0,
            freeze_authority: read_coption_key(data, 46)?,
        })
    }
}

fn read_key(data: &[u8], at: usize) -> [u8; 32] {
    let mut key = [0u8; 32];
    key.copy_from_slice(&data[at..at + 32]);
    key
}

fn read_u64(data: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&data[at..at + 8]);
    u64::from_le_bytes(buf)
}

fn read_coption_key(data: &[u8], at: usize) -> Result<Option<[u8; 32]>, SdkError> {
    let mut tag = [0u8; 4];
    tag.copy_from_slice(&data[at..at + 4]);
    match u32::from_le_bytes(tag) {
        0 => Ok(None),
        1 => Ok(Some(read_key(data, at + 4))),
        other => Err(SdkError::AccountDecodeError(format!(
            "invalid COption tag {other} at offset {at}"
        ))),
    }
}
