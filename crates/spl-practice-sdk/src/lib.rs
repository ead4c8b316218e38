//! Wire-level support for the `spl_practice` Solana program.
//!
//! This crate knows everything about the deployed program that can be
//! computed offline: its IDL, PDA seeds, instruction encoding, account
//! layouts and error codes, plus the Solana legacy transaction wire format
//! and SPL Token layouts it needs to talk to it. There is no network code
//! here; `spl-practice-client` layers RPC and state on top.
//!
//! Like the rest of the workspace it avoids `solana-sdk` and `anchor-lang`,
//! using `ed25519-dalek` for signing, `borsh` for account and argument
//! encoding and `bs58` for addresses.

pub mod accounts;
pub mod address;
pub mod error;
pub mod idl;
pub mod instruction;
pub mod pda;
pub mod program;
pub mod spl_token;
pub mod transaction;

pub use accounts::{DailyMintRecord, ProgramAccount, TokenMetadata, UserProfile};
pub use address::{address_to_bytes, bytes_to_address, validate_address};
pub use error::SdkError;
pub use idl::Idl;
pub use instruction::{MintDailyAccounts, PracticeInstruction, TokenMetadataArgs};
pub use pda::{daily_mint_record_address, token_metadata_address, user_profile_address};
pub use program::{day_index, ProgramError, DAILY_MINT_AMOUNT, TOKEN_DECIMALS};
pub use spl_token::{
    derive_associated_token_address, MintInfo, TokenAccount, ASSOCIATED_TOKEN_PROGRAM_ID,
    TOKEN_PROGRAM_ID,
};
pub use transaction::{
    compile_message, parse_transaction, serialize_message, sign_transaction, AccountMeta,
    Instruction, Keypair, Message, ParsedTransaction, Signer, SYSTEM_PROGRAM_ID,
};
