//! Account state of the `spl_practice` program.
//!
//! Each account is an 8-byte Anchor discriminator followed by the Borsh
//! encoding of its fields. Accounts are allocated at a fixed size, so the
//! payload may carry trailing zero bytes after the last field.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::error::SdkError;

/// A decodable program account.
pub trait ProgramAccount: BorshDeserialize + BorshSerialize + Sized {
    /// Account type name as it appears in the IDL.
    const NAME: &'static str;
    const DISCRIMINATOR: [u8; 8];

    /// Decode raw account data, checking the discriminator.
    fn decode(data: &[u8]) -> Result<Self, SdkError> {
        if data.len() < 8 {
            return Err(SdkError::AccountDecodeError(format!(
                "{}: {} bytes is shorter than the discriminator",
                Self::NAME,
                data.len()
            )));
        }
        if data[..8] != Self::DISCRIMINATOR {
            return Err(SdkError::AccountDecodeError(format!(
                "{}: discriminator mismatch",
                Self::NAME
            )));
        }

        let mut payload = &data[8..];
        Self::deserialize(&mut payload)
            .map_err(|e| SdkError::AccountDecodeError(format!("{}: {e}", Self::NAME)))
    }

    /// Encode as account data: discriminator plus fields.
    fn encode(&self) -> Result<Vec<u8>, SdkError> {
        let mut out = Self::DISCRIMINATOR.to_vec();
        self.serialize(&mut out)?;
        Ok(out)
    }
}

/// Per-owner profile created by `create_user_profile`.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct UserProfile {
    pub owner: [u8; 32],
    pub name: String,
    pub age: u8,
    pub balance: u64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ProgramAccount for UserProfile {
    const NAME: &'static str = "UserProfile";
    const DISCRIMINATOR: [u8; 8] = [32, 37, 119, 205, 179, 180, 13, 194];
}

/// Per-mint description created by `create_token_metadata`.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct TokenMetadata {
    pub mint: [u8; 32],
    pub name: String,
    pub symbol: String,
    pub description: String,
    pub total_supply: u64,
}

impl ProgramAccount for TokenMetadata {
    const NAME: &'static str = "TokenMetadata";
    const DISCRIMINATOR: [u8; 8] = [237, 215, 132, 182, 24, 127, 175, 173];
}

/// Per-user daily mint bookkeeping, written by `mint_daily_tokens`.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct DailyMintRecord {
    pub user: [u8; 32],
    /// Days since 1970-01-01 UTC of the last successful mint.
    pub last_mint_day: u32,
    pub total_minted: u64,
}

impl ProgramAccount for DailyMintRecord {
    const NAME: &'static str = "DailyMintRecord";
    const DISCRIMINATOR: [u8; 8] = [132, 109, 202, 243, 67, 215, 157, 5];
}

impl DailyMintRecord {
    /// Whether a mint on `today` (a day index) is still allowed.
    pub fn allows_mint_on(&self, today: u32) -> bool {
        self.last_mint_day != today
    }
}
