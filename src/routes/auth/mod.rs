pub mod claims;
pub mod session;
pub mod token;

pub use session::AuthSession;
pub use token::TokenVerifier;
