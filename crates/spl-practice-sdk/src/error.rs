use thiserror::Error;

/// Errors produced while encoding, decoding or signing data for the
/// SPL practice program.
#[derive(Debug, Error)]
pub enum SdkError {
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("transaction build error: {0}")]
    TransactionBuildError(String),

    #[error("signing error: {0}")]
    SigningError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("account decode error: {0}")]
    AccountDecodeError(String),

    #[error("malformed IDL: {0}")]
    MalformedIdl(String),
}

impl From<std::io::Error> for SdkError {
    fn from(e: std::io::Error) -> Self {
        SdkError::SerializationError(e.to_string())
    }
}
