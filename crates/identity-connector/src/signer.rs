//! Short-lived access to a verification method's private key.

use did_utils::{
    crypto::{Ed25519KeyPair, Error as CryptoError},
    didcore::Document,
    jose::jwt::{self, JwtClaims, JwtError},
    jwk::Jwk,
};
use keystore::{vault_key_for, Keystore};
use serde::Serialize;
use zeroize::Zeroize;

use crate::{Error, ErrorCode};

/// Holds one private key for the duration of a single signing operation.
///
/// The private component is wiped when the store is dropped.
pub(crate) struct TransientKeyStore {
    kid: String,
    jwk: Jwk,
}

impl TransientKeyStore {
    /// Loads the vault key behind the method `fragment` of `document`.
    ///
    /// The method must exist and its public key must match the vault key.
    pub(crate) async fn load(
        keystore: &Keystore,
        controller: &str,
        document: &Document,
        fragment: &str,
    ) -> Result<Self, Error> {
        let (method, _) = document.find_method(fragment).ok_or_else(|| {
            Error::not_found(
                ErrorCode::MethodMissing,
                format!("{} has no verification method #{fragment}", document.id),
            )
        })?;

        let name = vault_key_for(controller, fragment);
        let jwk = keystore
            .get_key(&name)
            .await
            .map_err(|err| Error::vault(err, format!("could not read key {name}")))?
            .filter(Jwk::is_private)
            .ok_or_else(|| Error::not_found(ErrorCode::VerificationKeyMissing, format!("no private key {name} in vault")))?;

        let matches = method.public_key_jwk.as_ref().is_some_and(|public| public.x == jwk.x);
        if !matches {
            return Err(Error::general(
                ErrorCode::VerificationKeyMissing,
                format!("vault key {name} does not belong to {}", method.id),
            ));
        }

        Ok(Self {
            kid: method.id.clone(),
            jwk,
        })
    }

    /// Absolute id of the verification method.
    pub(crate) fn kid(&self) -> &str {
        &self.kid
    }

    pub(crate) fn sign_jwt<T: Serialize>(&self, claims: &JwtClaims<T>) -> Result<String, JwtError> {
        jwt::encode(claims, &self.kid, &self.jwk)
    }

    pub(crate) fn keypair(&self) -> Result<Ed25519KeyPair, CryptoError> {
        Ed25519KeyPair::try_from(&self.jwk)
    }
}

impl Drop for TransientKeyStore {
    fn drop(&mut self) {
        if let Some(d) = self.jwk.d.as_mut() {
            d.zeroize();
        }
    }
}

#[cfg(test)]
mod tests {
    use did_utils::{
        didcore::{MethodScope, VerificationMethod},
        ldmodel::Context,
    };
    use keystore::KeyType;

    use super::*;
    use crate::ErrorKind;

    const DID: &str = "did:iota:0x0101010101010101010101010101010101010101010101010101010101010101";

    async fn setup(keystore: &Keystore) -> Document {
        let jwk = keystore
            .create_key(&vault_key_for("alice", "key-1"), KeyType::Ed25519)
            .await
            .unwrap();
        let mut document = Document::new(Context::default(), DID.to_string());
        let method = VerificationMethod::from_jwk(document.method_id("key-1"), DID.to_string(), &jwk);
        document.insert_method(MethodScope::AssertionMethod, method);
        document
    }

    #[tokio::test]
    async fn test_load_and_sign() {
        let keystore = Keystore::in_memory();
        let document = setup(&keystore).await;

        let signer = TransientKeyStore::load(&keystore, "alice", &document, "key-1").await.unwrap();
        assert_eq!(signer.kid(), format!("{DID}#key-1"));
        assert!(signer.keypair().is_ok());
    }

    #[tokio::test]
    async fn test_missing_method_or_key() {
        let keystore = Keystore::in_memory();
        let document = setup(&keystore).await;

        let err = TransientKeyStore::load(&keystore, "alice", &document, "key-2").await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.code(), ErrorCode::MethodMissing);

        let err = TransientKeyStore::load(&keystore, "bob", &document, "key-1").await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.code(), ErrorCode::VerificationKeyMissing);
    }

    #[tokio::test]
    async fn test_rejects_foreign_vault_key() {
        let keystore = Keystore::in_memory();
        let document = setup(&keystore).await;
        keystore
            .create_key(&vault_key_for("alice", "key-1"), KeyType::Ed25519)
            .await
            .unwrap();

        let err = TransientKeyStore::load(&keystore, "alice", &document, "key-1").await.err().unwrap();
        assert_eq!(err.code(), ErrorCode::VerificationKeyMissing);
    }
}
