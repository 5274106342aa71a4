use super::{errors::Error, traits::BYTES_LENGTH_32};

// Generate a seed from an optional initial seed.
// If the initial seed is empty or has the wrong size, generate a random seed.
pub(super) fn generate_seed(initial_seed: &[u8]) -> Result<[u8; BYTES_LENGTH_32], Error> {
    let mut seed = [0u8; BYTES_LENGTH_32];
    if initial_seed.len() != BYTES_LENGTH_32 {
        getrandom::getrandom(&mut seed).map_err(|_| Error::InvalidSeed)?;
    } else {
        seed.copy_from_slice(initial_seed);
    }
    Ok(seed)
}

/// Fills a fresh 32-byte buffer with OS randomness.
pub fn random_bytes_32() -> Result<[u8; BYTES_LENGTH_32], Error> {
    generate_seed(&[])
}
