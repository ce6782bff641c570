pub mod oauth;
pub mod token;

pub use oauth::TokenManager;
pub use token::{ClientCredentials, GrantType, TokenExchange, TokenResponse, TokenState};
