/// Account registration, HS256 bearer tokens and session revocation

pub mod jwt;
pub mod middleware;
pub mod password;
pub mod service;

pub use jwt::Claims;
pub use middleware::{bearer_token, require_auth, AuthenticatedUser};
pub use service::{AuthService, LoginSession, RegisterRequest};
