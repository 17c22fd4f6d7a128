mod auth;
mod context;
mod models;

pub use auth::AuthClient;
pub use context::{AuthContext, TokenSource};
pub use models::{parse_expiry, AccessToken, Credential, TOKEN_SAFETY_MARGIN_MINUTES};
