//! Revocation bitmap published as a DID document service.

use std::collections::BTreeSet;

use base64::{engine::general_purpose::STANDARD, Engine};
use thiserror::Error;

use crate::didcore::{Service, ServiceEndpoint, ServiceType};

pub const REVOCATION_BITMAP_2022: &str = "RevocationBitmap2022";
pub const REVOCATION_SERVICE_FRAGMENT: &str = "revocation";

const DATA_URL_PREFIX: &str = "data:application/octet-stream;base64,";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RevocationError {
    #[error("service `{0}` is not of type RevocationBitmap2022")]
    InvalidServiceType(String),
    #[error("revocation service endpoint must be a base64 data url")]
    InvalidEndpoint,
    #[error("malformed bitmap payload")]
    MalformedBitmap,
}

/// Set of revoked credential indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevocationBitmap {
    revoked: BTreeSet<u32>,
}

impl RevocationBitmap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks an index as revoked. Returns whether it was newly set.
    pub fn revoke(&mut self, index: u32) -> bool {
        self.revoked.insert(index)
    }

    /// Clears an index. Returns whether it was set.
    pub fn unrevoke(&mut self, index: u32) -> bool {
        self.revoked.remove(&index)
    }

    pub fn is_revoked(&self, index: u32) -> bool {
        self.revoked.contains(&index)
    }

    pub fn len(&self) -> usize {
        self.revoked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revoked.is_empty()
    }

    /// Encodes the bitmap as a data url: sorted indices, little endian u32 each.
    pub fn to_endpoint(&self) -> String {
        let bytes: Vec<u8> = self.revoked.iter().flat_map(|index| index.to_le_bytes()).collect();
        format!("{DATA_URL_PREFIX}{}", STANDARD.encode(bytes))
    }

    pub fn from_endpoint(endpoint: &str) -> Result<Self, RevocationError> {
        let payload = endpoint
            .strip_prefix(DATA_URL_PREFIX)
            .ok_or(RevocationError::InvalidEndpoint)?;
        let bytes = STANDARD.decode(payload).map_err(|_| RevocationError::MalformedBitmap)?;
        if bytes.len() % 4 != 0 {
            return Err(RevocationError::MalformedBitmap);
        }

        let revoked = bytes
            .chunks_exact(4)
            .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Ok(Self { revoked })
    }

    /// Wraps the bitmap in a service with the given absolute id.
    pub fn to_service(&self, id: String) -> Service {
        Service::new(
            id,
            ServiceType::SingleString(REVOCATION_BITMAP_2022.to_string()),
            ServiceEndpoint::SingleString(self.to_endpoint()),
        )
    }
}

impl TryFrom<&Service> for RevocationBitmap {
    type Error = RevocationError;

    fn try_from(service: &Service) -> Result<Self, Self::Error> {
        if !service.types().contains(&REVOCATION_BITMAP_2022) {
            return Err(RevocationError::InvalidServiceType(service.id.clone()));
        }

        match &service.service_endpoint {
            ServiceEndpoint::SingleString(endpoint) => Self::from_endpoint(endpoint),
            _ => Err(RevocationError::InvalidEndpoint),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_bitmap_endpoint() {
        let bitmap = RevocationBitmap::new();
        assert_eq!(bitmap.to_endpoint(), DATA_URL_PREFIX);
        assert_eq!(RevocationBitmap::from_endpoint(DATA_URL_PREFIX).unwrap(), bitmap);
    }

    #[test]
    fn test_revoke_unrevoke_through_service() {
        let mut bitmap = RevocationBitmap::new();
        assert!(bitmap.revoke(5));
        assert!(!bitmap.revoke(5));
        bitmap.revoke(1);

        let service = bitmap.to_service("did:iota:0x01#revocation".to_string());
        let mut decoded = RevocationBitmap::try_from(&service).unwrap();
        assert!(decoded.is_revoked(5));
        assert!(decoded.is_revoked(1));
        assert!(!decoded.is_revoked(2));

        assert!(decoded.unrevoke(5));
        assert!(!decoded.is_revoked(5));
        assert_eq!(decoded.len(), 1);
    }

    #[test]
    fn test_endpoint_layout() {
        let mut bitmap = RevocationBitmap::new();
        bitmap.revoke(258);
        bitmap.revoke(1);
        // 1 then 258, little endian
        assert_eq!(
            bitmap.to_endpoint(),
            format!("{DATA_URL_PREFIX}{}", STANDARD.encode([1, 0, 0, 0, 2, 1, 0, 0]))
        );
    }

    #[test]
    fn test_rejects_foreign_services() {
        let service = Service::new(
            "did:iota:0x01#linked".to_string(),
            ServiceType::SingleString("LinkedDomains".to_string()),
            ServiceEndpoint::SingleString("https://example.com".to_string()),
        );
        assert!(matches!(
            RevocationBitmap::try_from(&service),
            Err(RevocationError::InvalidServiceType(_))
        ));
        assert_eq!(
            RevocationBitmap::from_endpoint("data:application/octet-stream;base64,AAA"),
            Err(RevocationError::MalformedBitmap)
        );
    }
}
