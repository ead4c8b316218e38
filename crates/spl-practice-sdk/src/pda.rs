//! Program derived addresses.
//!
//! A PDA is `SHA-256(seed_0 || ... || seed_n || bump || program_id ||
//! "ProgramDerivedAddress")`, searched from bump 255 downwards until the hash
//! is NOT a valid Ed25519 point. The SPL practice program keys each of its
//! accounts by a fixed seed string plus the owning public key.

use sha2::{Digest, Sha256};

use crate::error::SdkError;

/// The marker appended to every PDA preimage.
const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

/// Solana limits: at most 16 seeds, each at most 32 bytes.
pub const MAX_SEEDS: usize = 16;
pub const MAX_SEED_LEN: usize = 32;

/// Seed of the per-owner `UserProfile` account.
pub const USER_PROFILE_SEED: &[u8] = b"user-profile";
/// Seed of the per-mint `TokenMetadata` account.
pub const TOKEN_METADATA_SEED: &[u8] = b"token-metadata";
/// Seed of the per-user `DailyMintRecord` account.
pub const DAILY_MINT_RECORD_SEED: &[u8] = b"daily-mint-record";

/// Find a valid PDA for the given seeds and program, returning the address
/// and the bump that produced it.
pub fn find_program_address(
    seeds: &[&[u8]],
    program_id: &[u8; 32],
) -> Result<([u8; 32], u8), SdkError> {
    check_seeds(seeds)?;

    for bump in (0u8..=255).rev() {
        if let Some(address) = hash_off_curve(seeds, &[bump], program_id) {
            return Ok((address, bump));
        }
    }

    Err(SdkError::InvalidAddress(
        "could not find valid PDA bump seed".into(),
    ))
}

/// Create a PDA from seeds with a caller-supplied bump.
///
/// Fails if the resulting hash lands on the curve.
pub fn create_program_address(
    seeds: &[&[u8]],
    bump: u8,
    program_id: &[u8; 32],
) -> Result<[u8; 32], SdkError> {
    check_seeds(seeds)?;
    hash_off_curve(seeds, &[bump], program_id).ok_or_else(|| {
        SdkError::InvalidAddress(format!("bump {bump} yields an on-curve address"))
    })
}

/// PDA of the `UserProfile` account owned by `owner`.
pub fn user_profile_address(
    owner: &[u8; 32],
    program_id: &[u8; 32],
) -> Result<([u8; 32], u8), SdkError> {
    find_program_address(&[USER_PROFILE_SEED, owner.as_ref()], program_id)
}

/// PDA of the `TokenMetadata` account describing `mint`.
pub fn token_metadata_address(
    mint: &[u8; 32],
    program_id: &[u8; 32],
) -> Result<([u8; 32], u8), SdkError> {
    find_program_address(&[TOKEN_METADATA_SEED, mint.as_ref()], program_id)
}

/// PDA of the `DailyMintRecord` account for `user`.
pub fn daily_mint_record_address(
    user: &[u8; 32],
    program_id: &[u8; 32],
) -> Result<([u8; 32], u8), SdkError> {
    find_program_address(&[DAILY_MINT_RECORD_SEED, user.as_ref()], program_id)
}

/// Check if 32 bytes decompress to a valid Ed25519 point.
pub fn is_on_curve(bytes: &[u8; 32]) -> bool {
    curve25519_dalek::edwards::CompressedEdwardsY(*bytes)
        .decompress()
        .is_some()
}

fn check_seeds(seeds: &[&[u8]]) -> Result<(), SdkError> {
    // One slot is reserved for the bump.
    if seeds.len() >= MAX_SEEDS {
        return Err(SdkError::InvalidArgument(format!(
            "too many seeds: {} (max {})",
            seeds.len(),
            MAX_SEEDS - 1
        )));
    }
    if let Some(seed) = seeds.iter().find(|s| s.len() > MAX_SEED_LEN) {
        return Err(SdkError::InvalidArgument(format!(
            "seed of {} bytes exceeds {MAX_SEED_LEN}",
            seed.len()
        )));
    }
    Ok(())
}

fn hash_off_curve(seeds: &[&[u8]], bump_seed: &[u8], program_id: &[u8; 32]) -> Option<[u8; 32]> {
    let mut hasher = Sha256::new();
    for seed in seeds {
        hasher.update(seed);
    }
    hasher.update(bump_seed);
    hasher.update(program_id);
    hasher.update(PDA_MARKER);

    let hash: [u8; 32] = hasher.finalize().into();

    if is_on_curve(&hash) {
        return None;
    }
    Some(hash)
}
