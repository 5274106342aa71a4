use std::{collections::HashMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{jwk::Jwk, ldmodel::Context};

pub const JSON_WEB_KEY_2020: &str = "JsonWebKey2020";

// === Structure of a did document ===

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(rename = "@context")]
    pub context: Context,

    // === Identifier ===

    // Identifier property is mandatory in a did document.
    // see https://www.w3.org/TR/did-core/#dfn-id
    pub id: String,

    // See https://www.w3.org/TR/did-core/#dfn-controller
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controller: Option<Controller>,

    // See https://www.w3.org/TR/did-core/#dfn-alsoknownas
    #[serde(skip_serializing_if = "Option::is_none")]
    pub also_known_as: Option<Vec<String>>,

    // === Verification Methods ===
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_method: Option<Vec<VerificationMethod>>,

    // === Verification Relationships ===
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication: Option<Vec<VerificationMethodType>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub assertion_method: Option<Vec<VerificationMethodType>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_agreement: Option<Vec<VerificationMethodType>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub capability_invocation: Option<Vec<VerificationMethodType>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub capability_delegation: Option<Vec<VerificationMethodType>>,

    // === Services ===
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<Vec<Service>>,

    // === Dynamic Properties ===
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(flatten)]
    pub additional_properties: Option<HashMap<String, Value>>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Controller {
    SingleString(String),
    SetOfString(Vec<String>),
}

// See https://www.w3.org/TR/did-core/#services
#[derive(Serialize, Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,

    #[serde(rename = "type")]
    pub service_type: ServiceType,

    pub service_endpoint: ServiceEndpoint,

    // === Additional properties ===
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(flatten)]
    pub additional_properties: Option<HashMap<String, Value>>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ServiceType {
    SingleString(String),
    SetOfString(Vec<String>),
}

#[derive(Serialize, Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ServiceEndpoint {
    SingleString(String),
    SetOfString(Vec<String>),
    Map(serde_json::Map<String, Value>),
}

#[derive(Serialize, Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationMethod {
    pub id: String,

    #[serde(rename = "type")]
    pub key_type: String,

    pub controller: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key_jwk: Option<Jwk>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key_multibase: Option<String>,
}

/// An entry of a verification relationship: either a reference to a
/// method listed under `verificationMethod`, or an embedded method.
#[derive(Serialize, Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum VerificationMethodType {
    Reference(String),
    Embedded(Box<VerificationMethod>),
}

impl VerificationMethodType {
    pub fn id(&self) -> &str {
        match self {
            VerificationMethodType::Reference(id) => id,
            VerificationMethodType::Embedded(method) => &method.id,
        }
    }
}

/// The role a verification method plays in a DID document.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum MethodScope {
    VerificationMethod,
    Authentication,
    AssertionMethod,
    KeyAgreement,
    CapabilityInvocation,
    CapabilityDelegation,
}

impl MethodScope {
    pub const ALL: [MethodScope; 6] = [
        MethodScope::VerificationMethod,
        MethodScope::Authentication,
        MethodScope::AssertionMethod,
        MethodScope::KeyAgreement,
        MethodScope::CapabilityInvocation,
        MethodScope::CapabilityDelegation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MethodScope::VerificationMethod => "verificationMethod",
            MethodScope::Authentication => "authentication",
            MethodScope::AssertionMethod => "assertionMethod",
            MethodScope::KeyAgreement => "keyAgreement",
            MethodScope::CapabilityInvocation => "capabilityInvocation",
            MethodScope::CapabilityDelegation => "capabilityDelegation",
        }
    }
}

impl fmt::Display for MethodScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown method scope: {0}")]
pub struct UnknownMethodScope(pub String);

impl FromStr for MethodScope {
    type Err = UnknownMethodScope;

    /// Accepts both the document property name (`assertionMethod`) and its
    /// kebab-case rendition (`assertion-method`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s.chars().filter(|c| *c != '-' && *c != '_').collect();
        MethodScope::ALL
            .into_iter()
            .find(|scope| scope.as_str().eq_ignore_ascii_case(&normalized))
            .ok_or_else(|| UnknownMethodScope(s.to_string()))
    }
}

/// Returns the fragment of a DID URL, without the leading `#`.
///
/// A bare fragment (with or without `#`) is returned as is.
pub fn fragment_of(id: &str) -> &str {
    match id.rfind('#') {
        Some(pos) => &id[pos + 1..],
        None => id,
    }
}

fn same_fragment(id: &str, fragment: &str) -> bool {
    fragment_of(id) == fragment_of(fragment)
}

impl Document {
    /// Creates a document holding nothing but its identifier.
    pub fn new(context: Context, id: String) -> Self {
        Self {
            context,
            id,
            ..Default::default()
        }
    }

    /// Builds the absolute DID URL `<did>#<fragment>`.
    pub fn method_id(&self, fragment: &str) -> String {
        format!("{}#{}", self.id, fragment_of(fragment))
    }

    fn relationship(&self, scope: MethodScope) -> Option<&Vec<VerificationMethodType>> {
        match scope {
            MethodScope::VerificationMethod => None,
            MethodScope::Authentication => self.authentication.as_ref(),
            MethodScope::AssertionMethod => self.assertion_method.as_ref(),
            MethodScope::KeyAgreement => self.key_agreement.as_ref(),
            MethodScope::CapabilityInvocation => self.capability_invocation.as_ref(),
            MethodScope::CapabilityDelegation => self.capability_delegation.as_ref(),
        }
    }

    fn relationship_mut(&mut self, scope: MethodScope) -> Option<&mut Option<Vec<VerificationMethodType>>> {
        match scope {
            MethodScope::VerificationMethod => None,
            MethodScope::Authentication => Some(&mut self.authentication),
            MethodScope::AssertionMethod => Some(&mut self.assertion_method),
            MethodScope::KeyAgreement => Some(&mut self.key_agreement),
            MethodScope::CapabilityInvocation => Some(&mut self.capability_invocation),
            MethodScope::CapabilityDelegation => Some(&mut self.capability_delegation),
        }
    }

    /// Looks a verification method up by fragment (or full DID URL) across
    /// the generic list and every relationship, following references.
    pub fn find_method(&self, fragment: &str) -> Option<(&VerificationMethod, MethodScope)> {
        let generic = self
            .verification_method
            .iter()
            .flatten()
            .find(|method| same_fragment(&method.id, fragment));

        if let Some(method) = generic {
            let scope = MethodScope::ALL[1..]
                .iter()
                .copied()
                .find(|scope| {
                    self.relationship(*scope)
                        .into_iter()
                        .flatten()
                        .any(|entry| same_fragment(entry.id(), fragment))
                })
                .unwrap_or(MethodScope::VerificationMethod);
            return Some((method, scope));
        }

        MethodScope::ALL[1..].iter().find_map(|scope| {
            self.relationship(*scope)
                .into_iter()
                .flatten()
                .find_map(|entry| match entry {
                    VerificationMethodType::Embedded(method) if same_fragment(&method.id, fragment) => {
                        Some((method.as_ref(), *scope))
                    }
                    _ => None,
                })
        })
    }

    /// Returns every method of the document, generic and embedded alike.
    pub fn methods(&self) -> Vec<&VerificationMethod> {
        let mut methods: Vec<&VerificationMethod> = self.verification_method.iter().flatten().collect();
        for scope in &MethodScope::ALL[1..] {
            for entry in self.relationship(*scope).into_iter().flatten() {
                if let VerificationMethodType::Embedded(method) = entry {
                    methods.push(method);
                }
            }
        }
        methods
    }

    /// Inserts a method under the given scope.
    ///
    /// Generic methods go to `verificationMethod`; scoped methods are
    /// embedded in their relationship.
    pub fn insert_method(&mut self, scope: MethodScope, method: VerificationMethod) {
        match self.relationship_mut(scope) {
            None => self.verification_method.get_or_insert_with(Vec::new).push(method),
            Some(relationship) => relationship
                .get_or_insert_with(Vec::new)
                .push(VerificationMethodType::Embedded(Box::new(method))),
        }
    }

    /// Removes a method by fragment from every place it appears, references included.
    ///
    /// Returns the removed method, or `None` if the document holds no such
    /// method, in which case the document is left untouched.
    pub fn remove_method(&mut self, fragment: &str) -> Option<VerificationMethod> {
        let (removed, _) = self.find_method(fragment)?;
        let removed = removed.clone();

        if let Some(methods) = self.verification_method.as_mut() {
            methods.retain(|method| !same_fragment(&method.id, fragment));
            if methods.is_empty() {
                self.verification_method = None;
            }
        }

        for scope in &MethodScope::ALL[1..] {
            if let Some(relationship) = self.relationship_mut(*scope) {
                if let Some(entries) = relationship.as_mut() {
                    entries.retain(|entry| !same_fragment(entry.id(), fragment));
                    if entries.is_empty() {
                        *relationship = None;
                    }
                }
            }
        }

        Some(removed)
    }

    pub fn find_service(&self, fragment: &str) -> Option<&Service> {
        self.service
            .iter()
            .flatten()
            .find(|service| same_fragment(&service.id, fragment))
    }

    pub fn find_service_mut(&mut self, fragment: &str) -> Option<&mut Service> {
        self.service
            .iter_mut()
            .flatten()
            .find(|service| same_fragment(&service.id, fragment))
    }

    /// Appends a service, keeping insertion order.
    pub fn insert_service(&mut self, service: Service) {
        self.service.get_or_insert_with(Vec::new).push(service);
    }

    /// Removes a service by fragment, leaving other services in place.
    pub fn remove_service(&mut self, fragment: &str) -> Option<Service> {
        let services = self.service.as_mut()?;
        let position = services.iter().position(|service| same_fragment(&service.id, fragment))?;
        Some(services.remove(position))
    }

    pub fn services(&self) -> &[Service] {
        self.service.as_deref().unwrap_or_default()
    }
}

impl VerificationMethod {
    /// Creates a `JsonWebKey2020` method carrying the public part of `jwk`.
    pub fn from_jwk(id: String, controller: String, jwk: &Jwk) -> Self {
        Self {
            id,
            key_type: JSON_WEB_KEY_2020.to_string(),
            controller,
            public_key_jwk: Some(jwk.to_public()),
            public_key_multibase: None,
        }
    }
}

impl Service {
    pub fn new(id: String, service_type: ServiceType, service_endpoint: ServiceEndpoint) -> Self {
        Self {
            id,
            service_type,
            service_endpoint,
            additional_properties: None,
        }
    }

    pub fn types(&self) -> Vec<&str> {
        match &self.service_type {
            ServiceType::SingleString(t) => vec![t.as_str()],
            ServiceType::SetOfString(types) => types.iter().map(String::as_str).collect(),
        }
    }
}

impl From<Vec<String>> for ServiceType {
    fn from(mut types: Vec<String>) -> Self {
        if types.len() == 1 {
            ServiceType::SingleString(types.remove(0))
        } else {
            ServiceType::SetOfString(types)
        }
    }
}

impl From<Vec<String>> for ServiceEndpoint {
    fn from(mut endpoints: Vec<String>) -> Self {
        if endpoints.len() == 1 {
            ServiceEndpoint::SingleString(endpoints.remove(0))
        } else {
            ServiceEndpoint::SetOfString(endpoints)
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use serde_json::json;

    fn jwk() -> Jwk {
        serde_json::from_value(json!({
            "kty": "OKP",
            "crv": "Ed25519",
            "x": "Z0GqpN71rMcnAkky6_J6Bfknr8B-TBsekG3qdI0EQX4"
        }))
        .unwrap()
    }

    fn document() -> Document {
        Document::new(Context::default(), "did:iota:0x01".to_string())
    }

    #[test]
    fn test_method_scope_parsing() {
        assert_eq!("authentication".parse::<MethodScope>().unwrap(), MethodScope::Authentication);
        assert_eq!("assertion-method".parse::<MethodScope>().unwrap(), MethodScope::AssertionMethod);
        assert_eq!("keyAgreement".parse::<MethodScope>().unwrap(), MethodScope::KeyAgreement);
        assert!("owner".parse::<MethodScope>().is_err());
    }

    #[test]
    fn test_scoped_methods_are_embedded() {
        let mut doc = document();
        let method = VerificationMethod::from_jwk(doc.method_id("key-1"), doc.id.clone(), &jwk());
        doc.insert_method(MethodScope::Authentication, method);

        assert!(doc.verification_method.is_none());
        let (found, scope) = doc.find_method("#key-1").unwrap();
        assert_eq!(scope, MethodScope::Authentication);
        assert!(found.id.ends_with("#key-1"));

        let serialized = serde_json::to_value(&doc).unwrap();
        assert_eq!(serialized["authentication"][0]["id"], json!("did:iota:0x01#key-1"));
        assert_eq!(serialized["authentication"][0]["publicKeyJwk"]["crv"], json!("Ed25519"));
    }

    #[test]
    fn test_remove_method_clears_references() {
        let mut doc = document();
        let method = VerificationMethod::from_jwk(doc.method_id("key-1"), doc.id.clone(), &jwk());
        doc.insert_method(MethodScope::VerificationMethod, method);
        doc.assertion_method = Some(vec![VerificationMethodType::Reference(doc.method_id("key-1"))]);

        assert_eq!(doc.find_method("key-1").unwrap().1, MethodScope::AssertionMethod);
        assert!(doc.remove_method("key-1").is_some());
        assert!(doc.verification_method.is_none());
        assert!(doc.assertion_method.is_none());
        assert!(doc.remove_method("key-1").is_none());
    }

    #[test]
    fn test_remove_service_keeps_others() {
        let mut doc = document();
        for fragment in ["a", "b", "c"] {
            doc.insert_service(Service::new(
                doc.method_id(fragment),
                vec!["LinkedDomains".to_string()].into(),
                vec!["https://example.com".to_string()].into(),
            ));
        }

        let removed = doc.remove_service("#b").unwrap();
        assert!(removed.id.ends_with("#b"));
        let remaining: Vec<_> = doc.services().iter().map(|s| fragment_of(&s.id)).collect();
        assert_eq!(remaining, vec!["a", "c"]);
        assert!(doc.remove_service("b").is_none());
    }

    #[test]
    fn test_document_round_trip() {
        let raw = json!({
            "@context": "https://www.w3.org/ns/did/v1",
            "id": "did:iota:0x01",
            "verificationMethod": [{
                "id": "did:iota:0x01#key-0",
                "type": "JsonWebKey2020",
                "controller": "did:iota:0x01",
                "publicKeyJwk": {"kty": "OKP", "crv": "Ed25519", "x": "Z0GqpN71rMcnAkky6_J6Bfknr8B-TBsekG3qdI0EQX4"}
            }],
            "assertionMethod": ["did:iota:0x01#key-0"],
            "service": [{
                "id": "did:iota:0x01#revocation",
                "type": "RevocationBitmap2022",
                "serviceEndpoint": "data:application/octet-stream;base64,"
            }]
        });

        let doc: Document = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(doc.find_method("key-0").unwrap().1, MethodScope::AssertionMethod);
        assert_eq!(doc.find_service("revocation").unwrap().types(), vec!["RevocationBitmap2022"]);
        assert_eq!(
            json_canon::to_string(&doc).unwrap(),
            json_canon::to_string(&raw).unwrap()
        );
    }
}
