use core::fmt::{Debug, Display};
use std::error::Error as StdError;

use serde::Serialize;

/// Coarse classification of connector errors.
#[derive(thiserror::Error, Debug, Copy, Clone, Eq, PartialEq)]
pub enum ErrorKind {
    /// A DID, method, service, key or seed does not exist.
    #[error("Not found")]
    NotFound,
    /// Any other failure.
    #[error("General error")]
    General,
}

/// Operation-specific error codes, rendered camelCase.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCode {
    InvalidInput,
    ConfigurationInvalid,
    ControllerSeedMissing,
    IdentityNotFound,
    IdentityCreationFailed,
    IdentityResolutionFailed,
    DocumentUpdateFailed,
    MethodMissing,
    VerificationKeyMissing,
    ServiceMissing,
    RevocationServiceMissing,
    VaultFailure,
    InsufficientGas,
    GasStationFailure,
    TransactionSigningFailed,
    TransactionSubmissionFailed,
    TransactionConfirmationTimeout,
    InclusionFailed,
    DidExtractionFailed,
    UnexpectedExecutionResult,
    CredentialCreationFailed,
    CredentialValidationFailed,
    PresentationCreationFailed,
    PresentationValidationFailed,
    ProofCreationFailed,
    ProofVerificationFailed,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidInput => "invalidInput",
            ErrorCode::ConfigurationInvalid => "configurationInvalid",
            ErrorCode::ControllerSeedMissing => "controllerSeedMissing",
            ErrorCode::IdentityNotFound => "identityNotFound",
            ErrorCode::IdentityCreationFailed => "identityCreationFailed",
            ErrorCode::IdentityResolutionFailed => "identityResolutionFailed",
            ErrorCode::DocumentUpdateFailed => "documentUpdateFailed",
            ErrorCode::MethodMissing => "methodMissing",
            ErrorCode::VerificationKeyMissing => "verificationKeyMissing",
            ErrorCode::ServiceMissing => "serviceMissing",
            ErrorCode::RevocationServiceMissing => "revocationServiceMissing",
            ErrorCode::VaultFailure => "vaultFailure",
            ErrorCode::InsufficientGas => "insufficientGas",
            ErrorCode::GasStationFailure => "gasStationFailure",
            ErrorCode::TransactionSigningFailed => "transactionSigningFailed",
            ErrorCode::TransactionSubmissionFailed => "transactionSubmissionFailed",
            ErrorCode::TransactionConfirmationTimeout => "transactionConfirmationTimeout",
            ErrorCode::InclusionFailed => "inclusionFailed",
            ErrorCode::DidExtractionFailed => "didExtractionFailed",
            ErrorCode::UnexpectedExecutionResult => "unexpectedExecutionResult",
            ErrorCode::CredentialCreationFailed => "credentialCreationFailed",
            ErrorCode::CredentialValidationFailed => "credentialValidationFailed",
            ErrorCode::PresentationCreationFailed => "presentationCreationFailed",
            ErrorCode::PresentationValidationFailed => "presentationValidationFailed",
            ErrorCode::ProofCreationFailed => "proofCreationFailed",
            ErrorCode::ProofVerificationFailed => "proofVerificationFailed",
        }
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents all possible errors of connector operations.
///
/// Vault and ledger faults never surface raw: they are wrapped with the code
/// of the operation that hit them and kept as the source.
pub struct Error {
    kind: ErrorKind,
    code: ErrorCode,
    source: eyre::Report,
}

impl Error {
    /// Returns the kind of the error that occurred.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Returns the lowest level error that caused this error.
    pub fn source(&self) -> &(dyn StdError + 'static) {
        self.source.root_cause()
    }

    /// Returns the context of the error.
    pub fn context(&self) -> &(dyn StdError) {
        self.source.as_ref()
    }

    pub(crate) fn new<E>(kind: ErrorKind, code: ErrorCode, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Error {
            kind,
            code,
            source: eyre::Report::new(source),
        }
    }

    pub(crate) fn msg<M>(kind: ErrorKind, code: ErrorCode, msg: M) -> Self
    where
        M: Display + Debug + Send + Sync + 'static,
    {
        Error {
            kind,
            code,
            source: eyre::Report::msg(msg),
        }
    }

    /// Wraps `source` under a message describing what was attempted.
    pub(crate) fn wrap<E, M>(kind: ErrorKind, code: ErrorCode, source: E, msg: M) -> Self
    where
        E: StdError + Send + Sync + 'static,
        M: Display + Send + Sync + 'static,
    {
        Error {
            kind,
            code,
            source: eyre::Report::new(source).wrap_err(msg),
        }
    }

    pub(crate) fn not_found<M>(code: ErrorCode, msg: M) -> Self
    where
        M: Display + Debug + Send + Sync + 'static,
    {
        Self::msg(ErrorKind::NotFound, code, msg)
    }

    pub(crate) fn general<M>(code: ErrorCode, msg: M) -> Self
    where
        M: Display + Debug + Send + Sync + 'static,
    {
        Self::msg(ErrorKind::General, code, msg)
    }

    /// Wraps a vault failure, keeping a missing entry a `NotFound`.
    pub(crate) fn vault<M>(err: keystore::Error, msg: M) -> Self
    where
        M: Display + Send + Sync + 'static,
    {
        let kind = match err.kind() {
            keystore::ErrorKind::NotFound => ErrorKind::NotFound,
            _ => ErrorKind::General,
        };
        Self::wrap(kind, ErrorCode::VaultFailure, err, msg)
    }

    /// Wraps a ledger failure.
    ///
    /// Failures with a dedicated code keep it; everything else gets `code`.
    pub(crate) fn ledger<M>(err: ledger_client::Error, code: ErrorCode, msg: M) -> Self
    where
        M: Display + Send + Sync + 'static,
    {
        use ledger_client::Error as LedgerError;

        let (kind, code) = match &err {
            LedgerError::NotFound(_) => (ErrorKind::NotFound, ErrorCode::IdentityNotFound),
            LedgerError::InvalidDid(_) | LedgerError::InvalidObjectId(_) | LedgerError::NetworkMismatch { .. } => {
                (ErrorKind::General, ErrorCode::InvalidInput)
            }
            LedgerError::ConfirmationTimeout { .. } => (ErrorKind::General, ErrorCode::TransactionConfirmationTimeout),
            LedgerError::TransactionFailed(_) => (ErrorKind::General, ErrorCode::InclusionFailed),
            LedgerError::UnexpectedExecutionResult { .. } => (ErrorKind::General, ErrorCode::UnexpectedExecutionResult),
            LedgerError::GasStation(_) => (ErrorKind::General, ErrorCode::GasStationFailure),
            _ => (ErrorKind::General, code),
        };
        Self::wrap(kind, code, err, msg)
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Error")
            .field("kind", &self.kind)
            .field("code", &self.code)
            .field("context", &self.context())
            .field("source", &self.source())
            .finish()
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.kind, self.code, self.context())
    }
}

impl StdError for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_render_camel_case() {
        assert_eq!(ErrorCode::MethodMissing.to_string(), "methodMissing");
        assert_eq!(
            serde_json::to_value(ErrorCode::TransactionConfirmationTimeout).unwrap(),
            "transactionConfirmationTimeout"
        );
        assert_eq!(
            serde_json::to_value(ErrorCode::DidExtractionFailed).unwrap(),
            ErrorCode::DidExtractionFailed.as_str()
        );
    }

    #[test]
    fn test_ledger_errors_keep_dedicated_codes() {
        let err = Error::ledger(
            ledger_client::Error::NotFound("did:iota:0x01".to_string()),
            ErrorCode::IdentityResolutionFailed,
            "could not resolve did:iota:0x01",
        );
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.code(), ErrorCode::IdentityNotFound);
        assert_eq!(err.context().to_string(), "could not resolve did:iota:0x01");
        assert_eq!(err.source().to_string(), "identity not found: did:iota:0x01");

        let err = Error::ledger(
            ledger_client::Error::Rpc("connection reset".to_string()),
            ErrorCode::IdentityResolutionFailed,
            "could not resolve did:iota:0x01",
        );
        assert_eq!(err.kind(), ErrorKind::General);
        assert_eq!(err.code(), ErrorCode::IdentityResolutionFailed);
        assert_eq!(
            err.to_string(),
            "General error (identityResolutionFailed): could not resolve did:iota:0x01"
        );
    }
}
