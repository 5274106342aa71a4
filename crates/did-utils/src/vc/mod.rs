//! Verifiable credential and presentation data model.

pub mod model;

pub use model::{
    Credential, CredentialStatus, Presentation, VcClaim, VpClaim, CREDENTIALS_CONTEXT_V1, VERIFIABLE_CREDENTIAL_TYPE,
    VERIFIABLE_PRESENTATION_TYPE,
};
