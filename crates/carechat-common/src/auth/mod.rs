//! Bearer token validation

mod jwt;

pub use jwt::{strip_bearer, Claims, JwtService};
