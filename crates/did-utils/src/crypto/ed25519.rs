use super::traits::{CoreSign, Generate, KeyMaterial, BYTES_LENGTH_32};
use super::utils::generate_seed;
use super::{errors::Error, AsymmetricKey};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use zeroize::Zeroizing;

pub type Ed25519KeyPair = AsymmetricKey<VerifyingKey, SigningKey>;

impl std::fmt::Debug for Ed25519KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{:?}", self.public_key))
    }
}

impl KeyMaterial for Ed25519KeyPair {
    fn public_key_bytes(&self) -> Result<[u8; BYTES_LENGTH_32], Error> {
        Ok(self.public_key.to_bytes())
    }

    fn private_key_bytes(&self) -> Result<[u8; BYTES_LENGTH_32], Error> {
        match &self.secret_key {
            Some(sk) => Ok(sk.to_bytes()),
            None => Err(Error::InvalidSecretKey),
        }
    }
}

impl Generate for Ed25519KeyPair {
    fn new() -> Result<Ed25519KeyPair, Error> {
        Self::new_with_seed(&[])
    }

    fn new_with_seed(seed: &[u8]) -> Result<Ed25519KeyPair, Error> {
        let secret_seed = Zeroizing::new(generate_seed(seed)?);
        Self::from_secret_key(&secret_seed)
    }

    fn from_public_key(public_key: &[u8; BYTES_LENGTH_32]) -> Result<Ed25519KeyPair, Error> {
        let public_key = VerifyingKey::from_bytes(public_key).map_err(|_| Error::InvalidPublicKey)?;
        Ok(Ed25519KeyPair {
            public_key,
            secret_key: None,
        })
    }

    fn from_secret_key(secret_key: &[u8; BYTES_LENGTH_32]) -> Result<Ed25519KeyPair, Error> {
        let sk = SigningKey::from_bytes(secret_key);
        Ok(Ed25519KeyPair {
            public_key: sk.verifying_key(),
            secret_key: Some(sk),
        })
    }
}

impl CoreSign for Ed25519KeyPair {
    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, Error> {
        match &self.secret_key {
            Some(sk) => sk
                .try_sign(payload)
                .map(|signature| signature.to_bytes().to_vec())
                .map_err(|_| Error::SignatureError),
            None => Err(Error::InvalidSecretKey),
        }
    }

    fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<(), Error> {
        let sig = Signature::try_from(signature).map_err(|_| Error::CanNotRetrieveSignature)?;
        self.public_key
            .verify(payload, &sig)
            .map_err(|_| Error::VerificationError)
    }
}

impl Ed25519KeyPair {
    /// Drops the secret half, keeping only what a verifier needs.
    pub fn to_public(&self) -> Ed25519KeyPair {
        Ed25519KeyPair {
            public_key: self.public_key,
            secret_key: None,
        }
    }
}
