//! Constants and error codes of the deployed `spl_practice` program.

use sha2::{Digest, Sha256};

/// Base units minted by one `mint_daily_tokens` call.
pub const DAILY_MINT_AMOUNT: u64 = 100;
/// Decimals of the practice token mint.
pub const TOKEN_DECIMALS: u8 = 9;
pub const SECONDS_PER_DAY: i64 = 86_400;

/// String limits implied by the account space the program allocates.
pub const MAX_NAME_LEN: usize = 50;
pub const MAX_SYMBOL_LEN: usize = 10;
pub const MAX_DESCRIPTION_LEN: usize = 200;

/// Allocated account sizes, discriminator included.
pub const USER_PROFILE_SPACE: usize = 8 + 32 + (4 + MAX_NAME_LEN) + 1 + 8 + 8 + 8;
pub const TOKEN_METADATA_SPACE: usize =
    8 + 32 + (4 + MAX_NAME_LEN) + (4 + MAX_SYMBOL_LEN) + (4 + MAX_DESCRIPTION_LEN) + 8;
pub const DAILY_MINT_RECORD_SPACE: usize = 8 + 32 + 4 + 8;

/// Anchor's first custom error code.
pub const CUSTOM_ERROR_OFFSET: u32 = 6000;

/// Whole UTC days elapsed since 1970-01-01 for a unix timestamp.
///
/// Matches the program's `(unix_timestamp / 86400) as u32`; timestamps
/// before the epoch map to day 0.
pub fn day_index(unix_timestamp: i64) -> u32 {
    let days = unix_timestamp.div_euclid(SECONDS_PER_DAY).max(0);
    u32::try_from(days).unwrap_or(u32::MAX)
}

/// Anchor instruction discriminator: `sha256("global:<name>")[..8]`.
pub fn instruction_discriminator(name: &str) -> [u8; 8] {
    sighash("global", name)
}

/// Anchor account discriminator: `sha256("account:<Name>")[..8]`.
pub fn account_discriminator(name: &str) -> [u8; 8] {
    sighash("account", name)
}

fn sighash(namespace: &str, name: &str) -> [u8; 8] {
    let digest = Sha256::digest(format!("{namespace}:{name}").as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

/// Errors the program (or the Anchor framework around it) can return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramError {
    /// 6000: signer does not own the account, or the daily mint was
    /// already claimed today.
    Unauthorized,
    /// 6001: checked arithmetic overflowed.
    Overflow,
    /// 3012: the account the instruction expects was never created.
    AccountNotInitialized,
    /// 2006: a PDA did not match its seeds.
    ConstraintSeeds,
    /// 0: `init` on an account that already exists (system program).
    AccountAlreadyInUse,
    Other(u32),
}

impl ProgramError {
    pub fn from_code(code: u32) -> Self {
        match code {
            6000 => Self::Unauthorized,
            6001 => Self::Overflow,
            3012 => Self::AccountNotInitialized,
            2006 => Self::ConstraintSeeds,
            0 => Self::AccountAlreadyInUse,
            other => Self::Other(other),
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            Self::Unauthorized => 6000,
            Self::Overflow => 6001,
            Self::AccountNotInitialized => 3012,
            Self::ConstraintSeeds => 2006,
            Self::AccountAlreadyInUse => 0,
            Self::Other(code) => *code,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Unauthorized => "Unauthorized access".into(),
            Self::Overflow => "Arithmetic overflow".into(),
            Self::AccountNotInitialized => "account not initialized".into(),
            Self::ConstraintSeeds => "seeds constraint violated".into(),
            Self::AccountAlreadyInUse => "account already in use".into(),
            Self::Other(code) => format!("custom program error {code}"),
        }
    }
}

impl std::fmt::Display for ProgramError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code {})", self.message(), self.code())
    }
}
