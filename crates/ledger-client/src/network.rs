//! Networks, object identifiers, addresses and the `did:iota` method.

use std::{fmt, str::FromStr};

use did_utils::crypto::{sha256_hash::sha256_hash, Ed25519KeyPair, KeyMaterial};
use serde::{Deserialize, Serialize};

use crate::Error;

pub const DID_METHOD: &str = "iota";

/// Address flag prepended to Ed25519 public keys before hashing.
const ED25519_FLAG: u8 = 0x00;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    #[default]
    Testnet,
    Devnet,
    Localnet,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Devnet => "devnet",
            Network::Localnet => "localnet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "iota" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            "devnet" => Ok(Network::Devnet),
            "localnet" => Ok(Network::Localnet),
            _ => Err(Error::UnknownNetwork(s.to_string())),
        }
    }
}

fn is_hex_id(value: &str) -> bool {
    value
        .strip_prefix("0x")
        .is_some_and(|hex| hex.len() == 64 && hex.bytes().all(|b| b.is_ascii_hexdigit()))
}

/// A 32-byte ledger object identifier, rendered `0x` + 64 lowercase hex digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId(String);

impl ObjectId {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(format!("0x{}", hex::encode(bytes)))
    }

    /// The all-zero id, standing for an identity not yet created.
    pub fn placeholder() -> Self {
        Self::from_bytes([0; 32])
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ObjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !is_hex_id(s) {
            return Err(Error::InvalidObjectId(s.to_string()));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }
}

impl TryFrom<String> for ObjectId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ObjectId> for String {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An account address: `0x` + hex(sha256(flag ‖ public key)).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn from_public_key(public_key: &[u8; 32]) -> Self {
        let mut input = Vec::with_capacity(33);
        input.push(ED25519_FLAG);
        input.extend_from_slice(public_key);
        Self(format!("0x{}", hex::encode(sha256_hash(&input))))
    }

    pub fn from_keypair(keypair: &Ed25519KeyPair) -> Result<Self, Error> {
        Ok(Self::from_public_key(&keypair.public_key_bytes()?))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !is_hex_id(s) {
            return Err(Error::InvalidObjectId(s.to_string()));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }
}

impl TryFrom<String> for Address {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A `did:iota` identifier.
///
/// Mainnet DIDs carry no network segment (`did:iota:<object-id>`); every other
/// network is named (`did:iota:<network>:<object-id>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LedgerDid {
    pub network: Network,
    pub object_id: ObjectId,
}

impl LedgerDid {
    pub fn new(network: Network, object_id: ObjectId) -> Self {
        Self { network, object_id }
    }

    /// The DID a document carries before its identity object exists.
    pub fn placeholder(network: Network) -> Self {
        Self::new(network, ObjectId::placeholder())
    }
}

impl fmt::Display for LedgerDid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.network {
            Network::Mainnet => write!(f, "did:{DID_METHOD}:{}", self.object_id),
            network => write!(f, "did:{DID_METHOD}:{network}:{}", self.object_id),
        }
    }
}

impl FromStr for LedgerDid {
    type Err = Error;

    /// Parses a DID, ignoring any fragment. An explicit `mainnet` segment is
    /// accepted and dropped on formatting.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let did = s.split('#').next().unwrap_or_default();
        let invalid = || Error::InvalidDid(s.to_string());

        let parts: Vec<&str> = did.split(':').collect();
        match parts.as_slice() {
            ["did", DID_METHOD, id] => Ok(Self::new(Network::Mainnet, id.parse().map_err(|_| invalid())?)),
            ["did", DID_METHOD, network, id] => Ok(Self::new(
                network.parse().map_err(|_| invalid())?,
                id.parse().map_err(|_| invalid())?,
            )),
            _ => Err(invalid()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "0x1c4b4d7e4b1d1b0d1c4b4d7e4b1d1b0d1c4b4d7e4b1d1b0d1c4b4d7e4b1d1b0d";

    #[test]
    fn test_mainnet_dids_omit_network() {
        let did = LedgerDid::new(Network::Mainnet, ID.parse().unwrap());
        assert_eq!(did.to_string(), format!("did:iota:{ID}"));
        assert_eq!(did.to_string().parse::<LedgerDid>().unwrap(), did);

        let explicit: LedgerDid = format!("did:iota:mainnet:{ID}").parse().unwrap();
        assert_eq!(explicit, did);
    }

    #[test]
    fn test_other_networks_are_named() {
        for network in [Network::Testnet, Network::Devnet, Network::Localnet] {
            let did = LedgerDid::new(network, ID.parse().unwrap());
            assert_eq!(did.to_string(), format!("did:iota:{network}:{ID}"));
            assert_eq!(did.to_string().parse::<LedgerDid>().unwrap(), did);
        }
    }

    #[test]
    fn test_rejects_malformed_dids() {
        for did in [
            "did:web:example.com",
            "did:iota:0x1234",
            "did:iota:moonnet:0x1c4b4d7e4b1d1b0d1c4b4d7e4b1d1b0d1c4b4d7e4b1d1b0d1c4b4d7e4b1d1b0d",
            "iota:0x1c4b",
        ] {
            assert!(matches!(did.parse::<LedgerDid>(), Err(Error::InvalidDid(_))), "{did}");
        }
    }

    #[test]
    fn test_fragment_is_ignored() {
        let did: LedgerDid = format!("did:iota:testnet:{ID}#key-1").parse().unwrap();
        assert_eq!(did.network, Network::Testnet);
    }

    #[test]
    fn test_address_derivation() {
        let address = Address::from_public_key(&[1; 32]);
        assert!(address.as_str().starts_with("0x"));
        assert_eq!(address.as_str().len(), 66);
        assert_ne!(address, Address::from_public_key(&[2; 32]));
        assert_eq!(address.to_string().parse::<Address>().unwrap(), address);
    }
}
