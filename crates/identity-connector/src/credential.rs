//! Issuing and checking JWT verifiable credentials and presentations.

use chrono::{DateTime, SubsecRound, Utc};
use did_utils::{
    didcore::{fragment_of, Document},
    jose::jwt::{self, JwtClaims, JwtError},
    revocation::{RevocationBitmap, RevocationError, REVOCATION_BITMAP_2022, REVOCATION_SERVICE_FRAGMENT},
    vc::{Credential, CredentialStatus, Presentation, VcClaim, VpClaim},
};
use futures::future::try_join_all;
use keystore::Keystore;
use ledger_client::IdentityClient;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{config::SubjectHolderRelationship, signer::TransientKeyStore, Error, ErrorCode, ErrorKind};

/// Everything needed to issue one credential.
#[derive(Debug, Clone, Default)]
pub struct CredentialRequest {
    /// Fragment of the issuer's signing method.
    pub fragment: String,
    /// JSON-LD subject; its `@context` and `@type` are hoisted.
    pub subject: Value,
    pub types: Vec<String>,
    pub contexts: Vec<Value>,
    pub id: Option<String>,
    /// Bit of the issuer's revocation bitmap controlling this credential.
    pub revocation_index: Option<u32>,
    pub expiration_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssuedCredential {
    pub credential: Credential,
    pub jwt: String,
}

/// Result of checking a credential that is otherwise valid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CredentialCheck {
    pub revoked: bool,
    /// Absent when revoked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<Credential>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssuedPresentation {
    pub presentation: Presentation,
    pub jwt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresentationCheck {
    pub holder: String,
    pub presentation: Presentation,
    /// One entry per presented credential, in order.
    pub credentials: Vec<CredentialCheck>,
}

/// Why a token was rejected. Checks stop at the first failure.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("malformed token: {0}")]
    Malformed(JwtError),
    #[error("key {kid} does not belong to {did}")]
    ForeignKey { kid: String, did: String },
    #[error("{0} is not a verification method of the signer")]
    UnknownMethod(String),
    #[error("method {0} has no usable public key")]
    UnusableKey(String),
    #[error("invalid signature: {0}")]
    Signature(JwtError),
    #[error("{0}")]
    Time(JwtError),
    #[error("issuer mismatch: token {claimed}, document {expected}")]
    IssuerMismatch { claimed: String, expected: String },
    #[error("holder mismatch: token {claimed}, document {expected}")]
    HolderMismatch { claimed: String, expected: String },
    #[error("unsupported credential status {0}")]
    UnsupportedStatus(String),
    #[error("malformed credential status: {0}")]
    MalformedStatus(String),
    #[error("revocation bitmap: {0}")]
    Revocation(#[from] RevocationError),
    #[error("credential revoked at index {0}")]
    Revoked(u32),
}

/// Current time without sub-second precision, as JWTs carry it.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// Expiration truncated to whole seconds, which must still follow `issued_at`.
fn expiration_after(
    expiration: Option<DateTime<Utc>>,
    issued_at: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, Error> {
    let expiration = expiration.map(|expiration| expiration.trunc_subsecs(0));
    if expiration.is_some_and(|expiration| expiration <= issued_at) {
        return Err(Error::general(
            ErrorCode::InvalidInput,
            "expiration date must lie in the future",
        ));
    }
    Ok(expiration)
}

fn did_of(id: &str) -> &str {
    id.split('#').next().unwrap_or(id)
}

/// Checks a token against the document of its signer: key id, signature,
/// validity window.
fn verify_token<T: DeserializeOwned>(
    token: &str,
    signer: &Document,
    now: DateTime<Utc>,
) -> Result<JwtClaims<T>, ValidationError> {
    let kid = jwt::key_id(token).map_err(ValidationError::Malformed)?;
    if did_of(&kid) != signer.id {
        return Err(ValidationError::ForeignKey {
            kid,
            did: signer.id.clone(),
        });
    }

    let (method, _) = signer
        .find_method(&kid)
        .ok_or_else(|| ValidationError::UnknownMethod(kid.clone()))?;
    let jwk = method
        .public_key_jwk
        .as_ref()
        .ok_or_else(|| ValidationError::UnusableKey(kid.clone()))?;

    let claims: JwtClaims<T> = jwt::decode_verified(token, jwk).map_err(ValidationError::Signature)?;
    claims.check_time(now.timestamp()).map_err(ValidationError::Time)?;

    Ok(claims)
}

fn check_status(status: &CredentialStatus, issuer: &Document) -> Result<(), ValidationError> {
    if status.status_type != REVOCATION_BITMAP_2022 {
        return Err(ValidationError::UnsupportedStatus(status.status_type.clone()));
    }
    let index = status
        .index()
        .ok_or_else(|| ValidationError::MalformedStatus(format!("index {}", status.revocation_bitmap_index)))?;
    if did_of(&status.id) != issuer.id {
        return Err(ValidationError::MalformedStatus(format!(
            "{} is not a service of the issuer",
            status.id
        )));
    }

    let service = issuer
        .find_service(fragment_of(&status.id))
        .ok_or_else(|| ValidationError::MalformedStatus(format!("issuer has no service {}", status.id)))?;
    if RevocationBitmap::try_from(service)?.is_revoked(index) {
        return Err(ValidationError::Revoked(index));
    }
    Ok(())
}

/// Validates a credential JWT against its issuer's document.
///
/// The revocation status is only looked at when `with_status` is set.
pub fn validate_credential(
    token: &str,
    issuer: &Document,
    now: DateTime<Utc>,
    with_status: bool,
) -> Result<Credential, ValidationError> {
    let claims: JwtClaims<VcClaim> = verify_token(token, issuer, now)?;
    let credential = claims.claim.vc;

    for claimed in [&claims.iss, &credential.issuer] {
        if claimed != &issuer.id {
            return Err(ValidationError::IssuerMismatch {
                claimed: claimed.clone(),
                expected: issuer.id.clone(),
            });
        }
    }

    if with_status {
        if let Some(status) = &credential.credential_status {
            check_status(status, issuer)?;
        }
    }

    Ok(credential)
}

/// Validates a presentation JWT against its holder's document. Enclosed
/// credentials are not looked at.
pub fn validate_presentation(
    token: &str,
    holder: &Document,
    now: DateTime<Utc>,
) -> Result<Presentation, ValidationError> {
    let claims: JwtClaims<VpClaim> = verify_token(token, holder, now)?;
    let presentation = claims.claim.vp;

    for claimed in [&claims.iss, &presentation.holder] {
        if claimed != &holder.id {
            return Err(ValidationError::HolderMismatch {
                claimed: claimed.clone(),
                expected: holder.id.clone(),
            });
        }
    }

    Ok(presentation)
}

fn validation_failed(code: ErrorCode, err: ValidationError, msg: impl Into<String>) -> Error {
    Error::wrap(ErrorKind::General, code, err, msg.into())
}

async fn resolve(client: &IdentityClient, did: &str) -> Result<Document, Error> {
    client
        .resolve_did(did)
        .await
        .map_err(|err| Error::ledger(err, ErrorCode::IdentityResolutionFailed, format!("could not resolve {did}")))
}

pub(crate) async fn create_credential(
    keystore: &Keystore,
    controller: &str,
    issuer: &Document,
    request: CredentialRequest,
) -> Result<IssuedCredential, Error> {
    let signer = TransientKeyStore::load(keystore, controller, issuer, &request.fragment).await?;

    let issued_at = now();
    let expiration_date = expiration_after(request.expiration_date, issued_at)?;

    let mut credential = Credential::from_subject(
        &issuer.id,
        &request.subject,
        &request.types,
        &request.contexts,
        issued_at,
    );
    credential.id = request.id;
    credential.expiration_date = expiration_date;
    credential.credential_status = request.revocation_index.map(|index| CredentialStatus {
        id: issuer.method_id(REVOCATION_SERVICE_FRAGMENT),
        status_type: REVOCATION_BITMAP_2022.to_string(),
        revocation_bitmap_index: index.to_string(),
    });

    let token = signer.sign_jwt(&credential.clone().into_claims()).map_err(|err| {
        Error::wrap(
            ErrorKind::General,
            ErrorCode::CredentialCreationFailed,
            err,
            "could not sign credential",
        )
    })?;
    drop(signer);

    // Structure and signature only: the index may already be revoked.
    let validated = validate_credential(&token, issuer, issued_at, false).map_err(|err| {
        validation_failed(ErrorCode::CredentialCreationFailed, err, "issued credential does not validate")
    })?;
    tracing::info!("issued credential {} by {}", validated.id.as_deref().unwrap_or("(anonymous)"), issuer.id);

    Ok(IssuedCredential {
        credential: validated,
        jwt: token,
    })
}

fn issuer_of(token: &str) -> Result<String, JwtError> {
    let (_, claims) = jwt::decode_unverified::<VcClaim>(token)?;
    Ok(claims.iss)
}

/// Reclassifies a revoked credential into a check result.
fn credential_check(result: Result<Credential, ValidationError>) -> Result<CredentialCheck, ValidationError> {
    match result {
        Ok(credential) => Ok(CredentialCheck {
            revoked: false,
            credential: Some(credential),
        }),
        Err(ValidationError::Revoked(index)) => {
            tracing::debug!("credential revoked at index {index}");
            Ok(CredentialCheck {
                revoked: true,
                credential: None,
            })
        }
        Err(err) => Err(err),
    }
}

pub(crate) async fn check_credential(client: &IdentityClient, token: &str) -> Result<CredentialCheck, Error> {
    let issuer = issuer_of(token).map_err(|err| {
        validation_failed(
            ErrorCode::CredentialValidationFailed,
            ValidationError::Malformed(err),
            "could not decode credential",
        )
    })?;
    let document = resolve(client, &issuer).await?;

    credential_check(validate_credential(token, &document, now(), true))
        .map_err(|err| validation_failed(ErrorCode::CredentialValidationFailed, err, "credential is not valid"))
}

pub(crate) async fn create_presentation(
    keystore: &Keystore,
    controller: &str,
    holder: &Document,
    fragment: &str,
    credentials: Vec<String>,
    expiration_date: Option<DateTime<Utc>>,
) -> Result<IssuedPresentation, Error> {
    for (position, token) in credentials.iter().enumerate() {
        issuer_of(token).map_err(|err| {
            Error::wrap(
                ErrorKind::General,
                ErrorCode::InvalidInput,
                err,
                format!("credential #{position} is not a credential JWT"),
            )
        })?;
    }

    let signer = TransientKeyStore::load(keystore, controller, holder, fragment).await?;
    let issued_at = now();
    let expiration_date = expiration_after(expiration_date, issued_at)?;

    let mut presentation = Presentation::new(&holder.id, credentials);
    presentation.expiration_date = expiration_date;

    let token = signer.sign_jwt(&presentation.into_claims(issued_at)).map_err(|err| {
        Error::wrap(
            ErrorKind::General,
            ErrorCode::PresentationCreationFailed,
            err,
            "could not sign presentation",
        )
    })?;
    tracing::debug!("presentation signed with {}", signer.kid());
    drop(signer);

    let validated = validate_presentation(&token, holder, issued_at).map_err(|err| {
        validation_failed(ErrorCode::PresentationCreationFailed, err, "issued presentation does not validate")
    })?;

    Ok(IssuedPresentation {
        presentation: validated,
        jwt: token,
    })
}

pub(crate) async fn check_presentation(
    client: &IdentityClient,
    token: &str,
    relationship: SubjectHolderRelationship,
) -> Result<PresentationCheck, Error> {
    let failed = |err, msg: &str| validation_failed(ErrorCode::PresentationValidationFailed, err, msg);

    let (_, claims) = jwt::decode_unverified::<VpClaim>(token)
        .map_err(|err| failed(ValidationError::Malformed(err), "could not decode presentation"))?;
    let holder = resolve(client, &claims.iss).await?;

    let checked_at = now();
    let presentation = validate_presentation(token, &holder, checked_at)
        .map_err(|err| failed(err, "presentation is not valid"))?;

    let mut issuers = Vec::with_capacity(presentation.verifiable_credential.len());
    for token in &presentation.verifiable_credential {
        issuers.push(issuer_of(token).map_err(|err| failed(ValidationError::Malformed(err), "could not decode credential"))?);
    }
    let documents = try_join_all(issuers.iter().map(|issuer| resolve(client, issuer))).await?;

    let mut credentials = Vec::with_capacity(documents.len());
    for (token, issuer) in presentation.verifiable_credential.iter().zip(&documents) {
        let check = credential_check(validate_credential(token, issuer, checked_at, true))
            .map_err(|err| failed(err, "presented credential is not valid"))?;

        if let (SubjectHolderRelationship::AlwaysSubject, Some(credential)) = (relationship, &check.credential) {
            if credential.subject_id() != Some(holder.id.as_str()) {
                return Err(Error::general(
                    ErrorCode::PresentationValidationFailed,
                    format!(
                        "subject {} of a presented credential is not the holder",
                        credential.subject_id().unwrap_or("(none)")
                    ),
                ));
            }
        }
        credentials.push(check);
    }

    Ok(PresentationCheck {
        holder: holder.id.clone(),
        presentation,
        credentials,
    })
}
