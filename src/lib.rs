//! # Pop Up Archive Rust SDK
//!
//! Cliente assíncrono para a API do Pop Up Archive.
//!
//! ## Features
//!
//! - Autenticação OAuth2 (authorization code, password e refresh token)
//! - Acesso a coleções, itens e busca
//! - Transporte HTTP plugável (`reqwest` por padrão)
//! - Configuração por variáveis de ambiente
//!
//! ## Exemplo
//!
//! ```no_run
//! use popuparchive::{ApiClient, ClientConfig, QueryParams};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ApiClient::from_config(ClientConfig::from_env()?)?;
//!     client.exchange_credentials("usuario", "senha").await?;
//!     let collections = client.get_user_collections(&QueryParams::new()).await?;
//!     println!("{}", collections);
//!     Ok(())
//! }
//! ```

/// Módulo de autenticação OAuth2
pub mod auth;

/// Módulo de cliente API
pub mod client;

/// Módulo de configuração
pub mod config;

/// Módulo de tratamento de erros
pub mod error;

/// Versão do SDK
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// User agent padrão enviado pelo transporte
pub const USER_AGENT: &str = concat!("SDK-Rust-Popuparchive/", env!("CARGO_PKG_VERSION"));

// Re-exportações para conveniência
pub use auth::{TokenExchange, TokenManager, TokenResponse, TokenState};
pub use client::{ApiClient, QueryParams, RequestBody, RequestOptions};
pub use config::ClientConfig;
pub use error::{ApiError, ApiResult};
