//! Instruction builders for the `spl_practice` program.
//!
//! Instruction data is the 8-byte Anchor discriminator followed by the Borsh
//! encoding of the arguments. Account order and roles mirror the program's
//! `#[derive(Accounts)]` structs exactly; the program rejects anything else.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::error::SdkError;
use crate::pda;
use crate::program::{MAX_DESCRIPTION_LEN, MAX_NAME_LEN, MAX_SYMBOL_LEN};
use crate::spl_token::TOKEN_PROGRAM_ID;
use crate::transaction::{AccountMeta, Instruction, SYSTEM_PROGRAM_ID};

pub const CREATE_USER_PROFILE: [u8; 8] = [9, 214, 142, 184, 153, 65, 50, 174];
pub const UPDATE_USER_PROFILE: [u8; 8] = [79, 75, 114, 130, 68, 123, 180, 11];
pub const ADD_BALANCE: [u8; 8] = [222, 94, 198, 210, 48, 187, 242, 30];
pub const CREATE_TOKEN_METADATA: [u8; 8] = [221, 80, 176, 37, 153, 188, 160, 68];
pub const MINT_DAILY_TOKENS: [u8; 8] = [242, 110, 25, 253, 64, 151, 39, 75];

/// Arguments of `create_user_profile` and `update_user_profile`.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ProfileArgs {
    pub name: String,
    pub age: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct AddBalanceArgs {
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct TokenMetadataArgs {
    pub name: String,
    pub symbol: String,
    pub description: String,
}

/// A decoded `spl_practice` instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PracticeInstruction {
    CreateUserProfile(ProfileArgs),
    UpdateUserProfile(ProfileArgs),
    AddBalance(AddBalanceArgs),
    CreateTokenMetadata(TokenMetadataArgs),
    MintDailyTokens,
}

impl PracticeInstruction {
    /// Decode instruction data by discriminator.
    pub fn decode(data: &[u8]) -> Result<Self, SdkError> {
        if data.len() < 8 {
            return Err(SdkError::SerializationError(
                "instruction data shorter than discriminator".into(),
            ));
        }
        let (disc, mut args) = data.split_at(8);
        let ix = match disc {
            d if d == CREATE_USER_PROFILE => {
                Self::CreateUserProfile(ProfileArgs::deserialize(&mut args)?)
            }
            d if d == UPDATE_USER_PROFILE => {
                Self::UpdateUserProfile(ProfileArgs::deserialize(&mut args)?)
            }
            d if d == ADD_BALANCE => Self::AddBalance(AddBalanceArgs::deserialize(&mut args)?),
            d if d == CREATE_TOKEN_METADATA => {
                Self::CreateTokenMetadata(TokenMetadataArgs::deserialize(&mut args)?)
            }
            d if d == MINT_DAILY_TOKENS => Self::MintDailyTokens,
            _ => {
                return Err(SdkError::SerializationError(
                    "unknown instruction discriminator".into(),
                ))
            }
        };
        if !args.is_empty() {
            return Err(SdkError::SerializationError(format!(
                "{} trailing bytes after instruction args",
                args.len()
            )));
        }
        Ok(ix)
    }

    /// Name of the instruction as it appears in the IDL.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateUserProfile(_) => "create_user_profile",
            Self::UpdateUserProfile(_) => "update_user_profile",
            Self::AddBalance(_) => "add_balance",
            Self::CreateTokenMetadata(_) => "create_token_metadata",
            Self::MintDailyTokens => "mint_daily_tokens",
        }
    }
}

/// Create the caller's profile account.
pub fn create_user_profile(
    program_id: &[u8; 32],
    user: &[u8; 32],
    name: &str,
    age: u8,
) -> Result<Instruction, SdkError> {
    check_len("name", name, MAX_NAME_LEN)?;
    let (profile, _) = pda::user_profile_address(user, program_id)?;

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::writable(profile, false),
            AccountMeta::writable(*user, true),
            AccountMeta::readonly(SYSTEM_PROGRAM_ID, false),
        ],
        data: encode(
            CREATE_USER_PROFILE,
            &ProfileArgs {
                name: name.to_string(),
                age,
            },
        )?,
    })
}

/// Overwrite name and age of the caller's profile.
pub fn update_user_profile(
    program_id: &[u8; 32],
    user: &[u8; 32],
    name: &str,
    age: u8,
) -> Result<Instruction, SdkError> {
    check_len("name", name, MAX_NAME_LEN)?;
    let (profile, _) = pda::user_profile_address(user, program_id)?;

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::writable(profile, false),
            AccountMeta::readonly(*user, true),
        ],
        data: encode(
            UPDATE_USER_PROFILE,
            &ProfileArgs {
                name: name.to_string(),
                age,
            },
        )?,
    })
}

/// Add `amount` to the caller's profile balance.
pub fn add_balance(
    program_id: &[u8; 32],
    user: &[u8; 32],
    amount: u64,
) -> Result<Instruction, SdkError> {
    let (profile, _) = pda::user_profile_address(user, program_id)?;

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::writable(profile, false),
            AccountMeta::readonly(*user, true),
        ],
        data: encode(ADD_BALANCE, &AddBalanceArgs { amount })?,
    })
}

/// Create the metadata account of `mint`, paid for by `authority`.
pub fn create_token_metadata(
    program_id: &[u8; 32],
    mint: &[u8; 32],
    authority: &[u8; 32],
    args: &TokenMetadataArgs,
) -> Result<Instruction, SdkError> {
    check_len("name", &args.name, MAX_NAME_LEN)?;
    check_len("symbol", &args.symbol, MAX_SYMBOL_LEN)?;
    check_len("description", &args.description, MAX_DESCRIPTION_LEN)?;
    let (metadata, _) = pda::token_metadata_address(mint, program_id)?;

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::writable(metadata, false),
            AccountMeta::readonly(*mint, false),
            AccountMeta::writable(*authority, true),
            AccountMeta::readonly(SYSTEM_PROGRAM_ID, false),
        ],
        data: encode(CREATE_TOKEN_METADATA, args)?,
    })
}

/// Accounts of a `mint_daily_tokens` call.
#[derive(Debug, Clone)]
pub struct MintDailyAccounts {
    pub user: [u8; 32],
    pub mint: [u8; 32],
    pub user_token_account: [u8; 32],
    pub mint_authority: [u8; 32],
}

/// Claim the daily mint for `accounts.user`.
pub fn mint_daily_tokens(
    program_id: &[u8; 32],
    accounts: &MintDailyAccounts,
) -> Result<Instruction, SdkError> {
    let (record, _) = pda::daily_mint_record_address(&accounts.user, program_id)?;

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::writable(record, false),
            AccountMeta::writable(accounts.mint, false),
            AccountMeta::writable(accounts.user_token_account, false),
            AccountMeta::writable(accounts.mint_authority, true),
            AccountMeta::writable(accounts.user, true),
            AccountMeta::readonly(SYSTEM_PROGRAM_ID, false),
            AccountMeta::readonly(TOKEN_PROGRAM_ID, false),
        ],
        data: MINT_DAILY_TOKENS.to_vec(),
    })
}

fn encode<T: BorshSerialize>(discriminator: [u8; 8], args: &T) -> Result<Vec<u8>, SdkError> {
    let mut data = discriminator.to_vec();
    args.serialize(&mut data)?;
    Ok(data)
}

fn check_len(field: &str, value: &str, max: usize) -> Result<(), SdkError> {
    if value.len() > max {
        return Err(SdkError::InvalidArgument(format!(
            "{field} is {} bytes, max {max}",
            value.len()
        )));
    }
    Ok(())
}
