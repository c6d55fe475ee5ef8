pub mod identity;
pub mod token;

pub use identity::IdentityCache;
pub use token::{EnvToken, StaticToken, TokenProvider};
