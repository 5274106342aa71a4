//! Pure mutations of a resolved DID document.
//!
//! Nothing here talks to the ledger: every operation edits a document the
//! caller then publishes. Vault keys of new methods are named after the
//! controller and the method fragment.

use did_utils::{
    didcore::{fragment_of, Document, MethodScope, Service, ServiceEndpoint, VerificationMethod},
    ldmodel::Context,
    revocation::{RevocationBitmap, REVOCATION_SERVICE_FRAGMENT},
};
use keystore::{vault_key_for, KeyType, Keystore};
use ledger_client::{LedgerDid, Network};
use url::Url;
use uuid::Uuid;

use crate::{Error, ErrorCode, ErrorKind};

/// A document for an identity not yet on the ledger.
///
/// It carries the placeholder DID of `network` and an empty revocation
/// bitmap; the ledger substitutes the real DID on creation.
pub fn new_document(network: Network) -> Document {
    let mut document = Document::new(Context::default(), LedgerDid::placeholder(network).to_string());
    ensure_revocation_service(&mut document);
    document
}

/// Adds an Ed25519 verification method under `scope`.
///
/// The key is generated under a temporary vault name, then moved to
/// `<controller>/<fragment>` once the fragment is known. Without an explicit
/// fragment the JWK thumbprint is used. A method with the same fragment is
/// replaced.
pub async fn add_verification_method(
    keystore: &Keystore,
    controller: &str,
    document: &mut Document,
    scope: MethodScope,
    fragment: Option<&str>,
) -> Result<VerificationMethod, Error> {
    if let Some(fragment) = fragment {
        validate_fragment(fragment)?;
    }

    let temporary = vault_key_for(controller, &format!("tmp-{}", Uuid::new_v4()));
    let jwk = keystore
        .create_key(&temporary, KeyType::Ed25519)
        .await
        .map_err(|err| Error::vault(err, "could not generate verification key"))?;

    let fragment = match fragment {
        Some(fragment) => fragment_of(fragment).to_string(),
        None => match jwk.thumbprint() {
            Ok(thumbprint) => thumbprint,
            Err(err) => {
                discard(keystore, &temporary).await;
                return Err(Error::wrap(
                    ErrorKind::General,
                    ErrorCode::DocumentUpdateFailed,
                    err,
                    "could not derive method fragment",
                ));
            }
        },
    };

    let name = vault_key_for(controller, &fragment);
    if let Err(err) = keystore.rename_key(&temporary, &name).await {
        discard(keystore, &temporary).await;
        return Err(Error::vault(err, format!("could not store verification key {name}")));
    }

    let method = VerificationMethod::from_jwk(document.method_id(&fragment), document.id.clone(), &jwk);
    document.remove_method(&fragment);
    document.insert_method(scope, method.clone());
    tracing::debug!("added method {} as {scope}", method.id);

    Ok(method)
}

async fn discard(keystore: &Keystore, name: &str) {
    if let Err(err) = keystore.delete_key(name).await {
        tracing::warn!("could not remove temporary key {name}: {err}");
    }
}

/// Removes a verification method from every scope.
///
/// The document is untouched when the method does not exist.
pub fn remove_verification_method(document: &mut Document, fragment: &str) -> Result<VerificationMethod, Error> {
    document.remove_method(fragment).ok_or_else(|| {
        Error::not_found(
            ErrorCode::MethodMissing,
            format!("{} has no verification method #{}", document.id, fragment_of(fragment)),
        )
    })
}

/// Adds a service, replacing one with the same fragment.
pub fn add_service(
    document: &mut Document,
    fragment: &str,
    types: Vec<String>,
    endpoints: Vec<String>,
) -> Result<Service, Error> {
    validate_fragment(fragment)?;
    if fragment_of(fragment) == REVOCATION_SERVICE_FRAGMENT {
        return Err(Error::general(
            ErrorCode::InvalidInput,
            "#revocation is reserved for the revocation bitmap",
        ));
    }
    if types.is_empty() || types.iter().any(|t| t.trim().is_empty()) {
        return Err(Error::general(ErrorCode::InvalidInput, "a service needs at least one type"));
    }
    if endpoints.is_empty() {
        return Err(Error::general(ErrorCode::InvalidInput, "a service needs at least one endpoint"));
    }
    for endpoint in &endpoints {
        Url::parse(endpoint).map_err(|err| {
            Error::wrap(
                ErrorKind::General,
                ErrorCode::InvalidInput,
                err,
                format!("invalid service endpoint {endpoint}"),
            )
        })?;
    }

    let service = Service::new(document.method_id(fragment), types.into(), endpoints.into());
    document.remove_service(fragment);
    document.insert_service(service.clone());
    tracing::debug!("added service {}", service.id);

    Ok(service)
}

/// Removes a service, other services keep their order.
pub fn remove_service(document: &mut Document, fragment: &str) -> Result<Service, Error> {
    document.remove_service(fragment).ok_or_else(|| {
        Error::not_found(
            ErrorCode::ServiceMissing,
            format!("{} has no service #{}", document.id, fragment_of(fragment)),
        )
    })
}

/// Adds an empty revocation bitmap service unless one exists.
///
/// Returns whether the document changed.
pub fn ensure_revocation_service(document: &mut Document) -> bool {
    if document.find_service(REVOCATION_SERVICE_FRAGMENT).is_some() {
        return false;
    }
    let service = RevocationBitmap::new().to_service(document.method_id(REVOCATION_SERVICE_FRAGMENT));
    document.insert_service(service);
    true
}

/// Decodes the revocation bitmap of a document, if it publishes one.
pub fn revocation_bitmap(document: &Document) -> Result<Option<RevocationBitmap>, Error> {
    document
        .find_service(REVOCATION_SERVICE_FRAGMENT)
        .map(|service| {
            RevocationBitmap::try_from(service).map_err(|err| {
                Error::wrap(
                    ErrorKind::General,
                    ErrorCode::DocumentUpdateFailed,
                    err,
                    format!("{} publishes a malformed revocation service", document.id),
                )
            })
        })
        .transpose()
}

fn store_bitmap(document: &mut Document, bitmap: &RevocationBitmap) -> Result<(), Error> {
    let service = document
        .find_service_mut(REVOCATION_SERVICE_FRAGMENT)
        .ok_or_else(|| Error::not_found(ErrorCode::RevocationServiceMissing, "no revocation service"))?;
    service.service_endpoint = ServiceEndpoint::SingleString(bitmap.to_endpoint());
    Ok(())
}

/// Marks credential indices as revoked, creating the revocation service
/// when the document has none.
pub fn revoke_credentials(document: &mut Document, indices: &[u32]) -> Result<(), Error> {
    ensure_revocation_service(document);
    let mut bitmap = revocation_bitmap(document)?.unwrap_or_default();
    for index in indices {
        bitmap.revoke(*index);
    }
    store_bitmap(document, &bitmap)
}

/// Clears credential indices. Fails if the document has no revocation service.
pub fn unrevoke_credentials(document: &mut Document, indices: &[u32]) -> Result<(), Error> {
    let mut bitmap = revocation_bitmap(document)?.ok_or_else(|| {
        Error::not_found(
            ErrorCode::RevocationServiceMissing,
            format!("{} has no revocation service", document.id),
        )
    })?;
    for index in indices {
        bitmap.unrevoke(*index);
    }
    store_bitmap(document, &bitmap)
}

fn validate_fragment(fragment: &str) -> Result<(), Error> {
    let fragment = fragment_of(fragment);
    if fragment.is_empty() || fragment.contains(['/', '?', ' ']) {
        return Err(Error::general(ErrorCode::InvalidInput, format!("invalid fragment `{fragment}`")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use did_utils::revocation::REVOCATION_BITMAP_2022;

    use super::*;

    const DID: &str = "did:iota:0x0101010101010101010101010101010101010101010101010101010101010101";

    fn document() -> Document {
        let mut document = Document::new(Context::default(), DID.to_string());
        ensure_revocation_service(&mut document);
        document
    }

    #[test]
    fn test_new_document_has_only_revocation_service() {
        let document = new_document(Network::Testnet);

        assert_eq!(document.id, LedgerDid::placeholder(Network::Testnet).to_string());
        assert!(document.methods().is_empty());
        assert_eq!(document.services().len(), 1);
        assert_eq!(document.services()[0].id, format!("{}#revocation", document.id));
        assert_eq!(document.services()[0].types(), vec![REVOCATION_BITMAP_2022]);
    }

    #[tokio::test]
    async fn test_add_method_with_derived_fragment() {
        let keystore = Keystore::in_memory();
        let mut document = document();

        let method = add_verification_method(&keystore, "alice", &mut document, MethodScope::Authentication, None)
            .await
            .unwrap();

        let jwk = method.public_key_jwk.clone().unwrap();
        let fragment = jwk.thumbprint().unwrap();
        assert_eq!(method.id, format!("{DID}#{fragment}"));
        assert_eq!(method.controller, DID);

        let (found, scope) = document.find_method(&fragment).unwrap();
        assert_eq!(found, &method);
        assert_eq!(scope, MethodScope::Authentication);

        let stored = keystore.get_key(&vault_key_for("alice", &fragment)).await.unwrap().unwrap();
        assert!(stored.is_private());
        assert_eq!(stored.x, jwk.x);
    }

    #[tokio::test]
    async fn test_add_method_replaces_same_fragment() {
        let keystore = Keystore::in_memory();
        let mut document = document();

        let first = add_verification_method(&keystore, "alice", &mut document, MethodScope::Authentication, Some("key-1"))
            .await
            .unwrap();
        let second = add_verification_method(&keystore, "alice", &mut document, MethodScope::AssertionMethod, Some("#key-1"))
            .await
            .unwrap();

        assert_ne!(first.public_key_jwk, second.public_key_jwk);
        assert_eq!(document.methods().len(), 1);
        let (found, scope) = document.find_method("key-1").unwrap();
        assert_eq!(found, &second);
        assert_eq!(scope, MethodScope::AssertionMethod);
        assert!(document.authentication.is_none());

        let stored = keystore.get_key(&vault_key_for("alice", "key-1")).await.unwrap().unwrap();
        assert_eq!(Some(stored.to_public()), second.public_key_jwk);
    }

    #[tokio::test]
    async fn test_remove_method() {
        let keystore = Keystore::in_memory();
        let mut document = document();
        add_verification_method(&keystore, "alice", &mut document, MethodScope::VerificationMethod, Some("key-1"))
            .await
            .unwrap();

        let untouched = document.clone();
        let err = remove_verification_method(&mut document, "key-2").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.code(), ErrorCode::MethodMissing);
        assert_eq!(document, untouched);

        let removed = remove_verification_method(&mut document, "key-1").unwrap();
        assert_eq!(removed.id, format!("{DID}#key-1"));
        assert!(document.find_method("key-1").is_none());
    }

    #[test]
    fn test_services() {
        let mut document = document();

        add_service(
            &mut document,
            "linked-domain",
            vec!["LinkedDomains".to_string()],
            vec!["https://example.org/".to_string()],
        )
        .unwrap();
        add_service(
            &mut document,
            "hub",
            vec!["Hub".to_string(), "Mailbox".to_string()],
            vec!["https://hub.example.org/".to_string(), "https://mail.example.org/".to_string()],
        )
        .unwrap();
        assert_eq!(document.services().len(), 3);

        // Upsert keeps a single entry.
        add_service(
            &mut document,
            "hub",
            vec!["Hub".to_string()],
            vec!["https://hub2.example.org/".to_string()],
        )
        .unwrap();
        assert_eq!(document.services().len(), 3);
        assert_eq!(document.find_service("hub").unwrap().types(), vec!["Hub"]);

        let removed = remove_service(&mut document, "linked-domain").unwrap();
        assert_eq!(removed.id, format!("{DID}#linked-domain"));
        let ids: Vec<&str> = document.services().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec![format!("{DID}#revocation"), format!("{DID}#hub")]);

        let err = remove_service(&mut document, "linked-domain").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.code(), ErrorCode::ServiceMissing);
    }

    #[test]
    fn test_rejects_invalid_services() {
        let mut document = document();

        assert!(add_service(&mut document, "s", vec![], vec!["https://example.org".to_string()]).is_err());
        assert!(add_service(&mut document, "s", vec!["T".to_string()], vec![]).is_err());
        let err = add_service(&mut document, "s", vec!["T".to_string()], vec!["not a url".to_string()]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidInput);
        assert_eq!(document.services().len(), 1);
    }

    #[test]
    fn test_revocation_fragment_is_reserved() {
        let mut document = Document::new(Context::default(), DID.to_string());

        let err = add_service(
            &mut document,
            "revocation",
            vec!["LinkedDomains".to_string()],
            vec!["https://example.org".to_string()],
        )
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidInput);
        assert!(document.services().is_empty());

        revoke_credentials(&mut document, &[1]).unwrap();
        assert!(revocation_bitmap(&document).unwrap().unwrap().is_revoked(1));
    }

    #[test]
    fn test_revocation() {
        let mut document = Document::new(Context::default(), DID.to_string());

        let err = unrevoke_credentials(&mut document, &[1]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.code(), ErrorCode::RevocationServiceMissing);

        // The service is created on first revocation.
        revoke_credentials(&mut document, &[5, 1]).unwrap();
        let bitmap = revocation_bitmap(&document).unwrap().unwrap();
        assert!(bitmap.is_revoked(1) && bitmap.is_revoked(5));
        assert!(!bitmap.is_revoked(2));

        unrevoke_credentials(&mut document, &[5, 9]).unwrap();
        let bitmap = revocation_bitmap(&document).unwrap().unwrap();
        assert!(bitmap.is_revoked(1));
        assert!(!bitmap.is_revoked(5));
        assert_eq!(document.services().len(), 1);

        assert!(!ensure_revocation_service(&mut document));
    }
}
