use serde_json::Value;

use crate::crypto::Error;

use super::model::Proof;

/// A trait to be implemented by every crypto suite
pub trait CryptoProof {
    /// Creates the proof value and adds it to the proof object.
    ///
    /// The payload is the data to be signed without any proof entry.
    ///
    /// Returns the proof object with the proof value added.
    fn proof(&self, payload: Value) -> Result<Proof, Error>;

    /// Verifies that this proof authenticates the payload.
    ///
    /// A `proof` entry found on the payload is ignored.
    fn verify(&self, payload: Value) -> Result<(), Error>;
}

/// Returns the payload with its `proof` entry removed, if any.
pub(super) fn strip_proof(mut payload: Value) -> Value {
    if let Some(object) = payload.as_object_mut() {
        object.remove("proof");
    }
    payload
}
