use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DID_CONTEXT_V1: &str = "https://www.w3.org/ns/did/v1";

// The @context property defines the vocabulary used in the JSON-LD document.
// It provides a way to map the keys in the JSON structure to specific terms,
// properties, and classes from external vocabularies.
#[derive(Serialize, Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Context {
    SingleString(String),
    SetOfString(Vec<String>),
    JsonObject(Value),
}

impl Default for Context {
    fn default() -> Self {
        Context::SingleString(DID_CONTEXT_V1.to_string())
    }
}
