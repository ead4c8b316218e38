//! Base58 addresses.
//!
//! A Solana address is the Base58 encoding of a raw 32-byte key, either an
//! Ed25519 public key or a program derived address. Everything else in this
//! crate passes keys around as `[u8; 32]` and only converts at the edges.

use crate::error::SdkError;

/// Encode 32 bytes as a Base58 address string.
pub fn bytes_to_address(bytes: &[u8; 32]) -> String {
    bs58::encode(bytes).into_string()
}

/// Decode an address string to its 32-byte representation.
///
/// Returns an error if the address is not valid Base58 or does not decode
/// to exactly 32 bytes.
pub fn address_to_bytes(address: &str) -> Result<[u8; 32], SdkError> {
    let bytes = bs58::decode(address.trim())
        .into_vec()
        .map_err(|e| SdkError::InvalidAddress(format!("base58 decode failed: {e}")))?;

    let arr: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
        SdkError::InvalidAddress(format!("expected 32 bytes, got {}", v.len()))
    })?;

    Ok(arr)
}

/// Validate an address string.
pub fn validate_address(address: &str) -> Result<bool, SdkError> {
    address_to_bytes(address).map(|_| true)
}

/// Encode a 64-byte Ed25519 signature the way RPC nodes and explorers print it.
pub fn signature_to_string(signature: &[u8; 64]) -> String {
    bs58::encode(signature).into_string()
}

/// Decode a Base58 transaction signature.
pub fn signature_from_str(signature: &str) -> Result<[u8; 64], SdkError> {
    let bytes = bs58::decode(signature.trim())
        .into_vec()
        .map_err(|e| SdkError::InvalidArgument(format!("signature decode failed: {e}")))?;

    bytes.try_into().map_err(|v: Vec<u8>| {
        SdkError::InvalidArgument(format!("expected 64 signature bytes, got {}", v.len()))
    })
}

/// Shorten an address for display: `5K1z...c123`.
pub fn short_address(address: &str) -> String {
    if address.len() <= 8 {
        return address.to_string();
    }
    format!("{}...{}", &address[..4], &address[address.len() - 4..])
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The System Program address is 32 zero bytes.
    #[test]
    fn system_program_address() {
        assert_eq!(bytes_to_address(&[0u8; 32]), "11111111111111111111111111111111");
    }

    #[test]
    fn demo_mint_address_decodes() {
        // The placeholder mint used by the demo: 31 zero bytes followed by 0x01.
        let bytes = address_to_bytes("11111111111111111111111111111112").unwrap();
        let mut expected = [0u8; 32];
        expected[31] = 1;
        assert_eq!(bytes, expected);
    }

    #[test]
    fn roundtrip_token_program() {
        let address = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
        let bytes = address_to_bytes(address).unwrap();
        assert_eq!(bytes_to_address(&bytes), address);
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        assert!(validate_address("  11111111111111111111111111111111\n").unwrap());
    }

    #[test]
    fn validate_garbage_returns_error() {
        assert!(validate_address("not-a-valid-address!!!").is_err());
    }

    #[test]
    fn validate_too_short_returns_error() {
        // "1" decodes to a single zero byte.
        let err = validate_address("1").unwrap_err();
        assert!(err.to_string().contains("expected 32 bytes"));
    }

    #[test]
    fn signature_roundtrip() {
        let sig = [7u8; 64];
        let text = signature_to_string(&sig);
        assert_eq!(signature_from_str(&text).unwrap(), sig);
    }

    #[test]
    fn signature_wrong_length_fails() {
        let text = bs58::encode([1u8; 32]).into_string();
        assert!(signature_from_str(&text).is_err());
    }

    #[test]
    fn short_address_keeps_both_ends() {
        let short = short_address("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");
        assert_eq!(short, "Toke...Q5DA");
        assert_eq!(short_address("abc"), "abc");
    }
}
