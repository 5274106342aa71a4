use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::jose::jwt::JwtClaims;

pub const CREDENTIALS_CONTEXT_V1: &str = "https://www.w3.org/2018/credentials/v1";
pub const VERIFIABLE_CREDENTIAL_TYPE: &str = "VerifiableCredential";
pub const VERIFIABLE_PRESENTATION_TYPE: &str = "VerifiablePresentation";

/// Represents a Verifiable Credential.
///
/// See https://www.w3.org/TR/vc-data-model/ (1.1)
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    #[serde(rename = "@context")]
    pub context: Vec<Value>,

    // Identifier of this credential, not of its subject.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "type")]
    pub cred_type: Vec<String>,

    pub issuer: String,

    pub issuance_date: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<DateTime<Utc>>,

    pub credential_subject: Value,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_status: Option<CredentialStatus>,
}

/// Points at a bit of the issuer's revocation bitmap.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialStatus {
    pub id: String,

    #[serde(rename = "type")]
    pub status_type: String,

    // Carried as a string on the wire.
    pub revocation_bitmap_index: String,
}

impl CredentialStatus {
    pub fn index(&self) -> Option<u32> {
        self.revocation_bitmap_index.parse().ok()
    }
}

/// Represents a Verifiable Presentation holding credential JWTs.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Presentation {
    #[serde(rename = "@context")]
    pub context: Vec<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "type")]
    pub pres_type: Vec<String>,

    pub holder: String,

    pub verifiable_credential: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VcClaim {
    pub vc: Credential,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VpClaim {
    pub vp: Presentation,
}

fn push_unique<T: PartialEq>(list: &mut Vec<T>, item: T) {
    if !list.contains(&item) {
        list.push(item);
    }
}

/// Splits a JSON-LD value that may be a single item or an array.
fn one_or_many(value: Option<&Value>) -> Vec<Value> {
    match value {
        None | Some(Value::Null) => vec![],
        Some(Value::Array(items)) => items.clone(),
        Some(item) => vec![item.clone()],
    }
}

impl Credential {
    /// Builds an unsigned credential about a JSON-LD subject.
    ///
    /// The subject is copied. Its `@context` is hoisted into the credential
    /// context; its `@type`/`type` join the credential types after
    /// `VerifiableCredential`.
    pub fn from_subject(
        issuer: &str,
        subject: &Value,
        types: &[String],
        contexts: &[Value],
        issuance_date: DateTime<Utc>,
    ) -> Self {
        let mut subject = subject.clone();

        let mut context = vec![Value::String(CREDENTIALS_CONTEXT_V1.to_string())];
        let mut cred_type = vec![VERIFIABLE_CREDENTIAL_TYPE.to_string()];

        if let Some(object) = subject.as_object_mut() {
            for item in one_or_many(object.remove("@context").as_ref()) {
                push_unique(&mut context, item);
            }
            for key in ["@type", "type"] {
                for item in one_or_many(object.get(key)) {
                    if let Value::String(t) = item {
                        push_unique(&mut cred_type, t);
                    }
                }
            }
        }

        for item in contexts {
            push_unique(&mut context, item.clone());
        }
        for t in types {
            push_unique(&mut cred_type, t.clone());
        }

        Self {
            context,
            id: None,
            cred_type,
            issuer: issuer.to_string(),
            issuance_date,
            expiration_date: None,
            credential_subject: subject,
            credential_status: None,
        }
    }

    /// The subject's `id`, if it has one.
    pub fn subject_id(&self) -> Option<&str> {
        self.credential_subject.get("id").and_then(Value::as_str)
    }

    pub fn into_claims(self) -> JwtClaims<VcClaim> {
        JwtClaims {
            iss: self.issuer.clone(),
            sub: self.subject_id().map(str::to_string),
            jti: self.id.clone(),
            nbf: self.issuance_date.timestamp(),
            exp: self.expiration_date.map(|date| date.timestamp()),
            claim: VcClaim { vc: self },
        }
    }
}

impl Presentation {
    pub fn new(holder: &str, credentials: Vec<String>) -> Self {
        Self {
            context: vec![Value::String(CREDENTIALS_CONTEXT_V1.to_string())],
            id: None,
            pres_type: vec![VERIFIABLE_PRESENTATION_TYPE.to_string()],
            holder: holder.to_string(),
            verifiable_credential: credentials,
            expiration_date: None,
        }
    }

    pub fn into_claims(self, issued_at: DateTime<Utc>) -> JwtClaims<VpClaim> {
        JwtClaims {
            iss: self.holder.clone(),
            sub: None,
            jti: self.id.clone(),
            nbf: issued_at.timestamp(),
            exp: self.expiration_date.map(|date| date.timestamp()),
            claim: VpClaim { vp: self },
        }
    }
}

/// Converts JWT seconds back into a timestamp.
pub fn timestamp(seconds: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(seconds, 0).single()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_credential_from_subject() {
        let subject = json!({
            "@context": "https://schema.org",
            "@type": "Person",
            "id": "did:iota:0x02",
            "name": "Alice"
        });
        let now = timestamp(1_700_000_000).unwrap();

        let credential = Credential::from_subject(
            "did:iota:0x01",
            &subject,
            &["UniversityDegreeCredential".to_string(), "Person".to_string()],
            &[json!("https://example.com/ctx")],
            now,
        );

        assert_eq!(
            credential.cred_type,
            vec!["VerifiableCredential", "Person", "UniversityDegreeCredential"]
        );
        assert_eq!(
            credential.context,
            vec![
                json!(CREDENTIALS_CONTEXT_V1),
                json!("https://schema.org"),
                json!("https://example.com/ctx")
            ]
        );
        assert!(credential.credential_subject.get("@context").is_none());
        assert_eq!(credential.credential_subject["name"], json!("Alice"));
        // The caller's subject is left alone.
        assert_eq!(subject["@context"], json!("https://schema.org"));

        let claims = credential.clone().into_claims();
        assert_eq!(claims.iss, "did:iota:0x01");
        assert_eq!(claims.sub.as_deref(), Some("did:iota:0x02"));
        assert_eq!(claims.nbf, 1_700_000_000);
        assert_eq!(claims.claim.vc, credential);
    }

    #[test]
    fn test_credential_status_wire_format() {
        let status = CredentialStatus {
            id: "did:iota:0x01#revocation".to_string(),
            status_type: "RevocationBitmap2022".to_string(),
            revocation_bitmap_index: "5".to_string(),
        };

        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            json!({
                "id": "did:iota:0x01#revocation",
                "type": "RevocationBitmap2022",
                "revocationBitmapIndex": "5"
            })
        );
        assert_eq!(status.index(), Some(5));
    }

    #[test]
    fn test_presentation_claims() {
        let mut presentation = Presentation::new("did:iota:0x03", vec!["a.b.c".to_string()]);
        presentation.expiration_date = timestamp(2_000);

        let claims = presentation.into_claims(timestamp(1_000).unwrap());
        assert_eq!(claims.iss, "did:iota:0x03");
        assert_eq!(claims.exp, Some(2_000));

        let value = serde_json::to_value(&claims).unwrap();
        assert_eq!(value["vp"]["type"], json!(["VerifiablePresentation"]));
        assert_eq!(value["vp"]["verifiableCredential"], json!(["a.b.c"]));
    }
}
