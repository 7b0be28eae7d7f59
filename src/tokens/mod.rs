pub mod jwt;
pub mod password;

pub use jwt::{extract_bearer, TokenError, TokenService};
pub use password::{hash_password, verify_password, PasswordError};
