//! JOSE primitives: compact JWS and JWT.

pub mod jws;
pub mod jwt;

pub use jws::{JwsAlg, JwsError, JwsHeader};
pub use jwt::{JwtClaims, JwtError};
