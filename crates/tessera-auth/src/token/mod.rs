//! Access token signing and refresh token encoding.

pub mod jwt;
pub mod opaque;

pub use jwt::{AccessTokenClaims, JwtError, JwtService, SigningAlgorithm, SigningKeyPair};
pub use opaque::RefreshTokenCodec;
