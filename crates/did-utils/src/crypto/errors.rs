/// The set of errors that can occur during key operations.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Can not retrieve signature
    #[error("can not retrieve signature")]
    CanNotRetrieveSignature,
    /// Invalid key length
    #[error("invalid key length")]
    InvalidKeyLength,
    /// Invalid secret key
    #[error("invalid secret key")]
    InvalidSecretKey,
    /// Invalid seed
    #[error("invalid seed")]
    InvalidSeed,
    /// Invalid public key
    #[error("invalid public key")]
    InvalidPublicKey,
    /// Error while signing
    #[error("signature error")]
    SignatureError,
    /// Error while verifying
    #[error("verification error")]
    VerificationError,
    /// Invalid proof
    #[error("invalid proof")]
    InvalidProof,
    /// Invalid call
    #[error("invalid call: {0}")]
    InvalidCall(String),
    /// Unsupported algorithm
    #[error("unsupported algorithm")]
    Unsupported,
}
