pub mod authorize;
pub mod refresher;
pub mod token_cache;

pub use authorize::Authorizer;
pub use refresher::{OAuthRefresher, TokenRefresher, TokenResponse};
pub use token_cache::{CachedToken, TokenCache};
