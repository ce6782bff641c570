use std::env;
use std::fmt;
use std::path::Path;

use crate::client::transport::TransportOptions;
use crate::config::formats::ResponseFormat;
use crate::error::{ApiError, ApiResult};

/// Domínio padrão do serviço
pub const DEFAULT_DOMAIN: &str = "www.popuparchive.com";

pub const ENV_CLIENT_ID: &str = "POPUPARCHIVE_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "POPUPARCHIVE_CLIENT_SECRET";
pub const ENV_REDIRECT_URI: &str = "POPUPARCHIVE_REDIRECT_URI";
pub const ENV_DOMAIN: &str = "POPUPARCHIVE_DOMAIN";
pub const ENV_ACCESS_TOKEN: &str = "POPUPARCHIVE_ACCESS_TOKEN";
pub const ENV_RESPONSE_FORMAT: &str = "POPUPARCHIVE_RESPONSE_FORMAT";

/// Configuração de um `ApiClient`
#[derive(Clone, PartialEq)]
pub struct ClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: Option<String>,
    /// Host do serviço, sem esquema nem barras
    pub domain: String,
    /// Token obtido previamente (o SDK não persiste tokens)
    pub access_token: Option<String>,
    /// `None` desliga o header `Accept`
    pub response_format: Option<ResponseFormat>,
    pub transport: TransportOptions,
}

impl ClientConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: None,
            domain: DEFAULT_DOMAIN.to_string(),
            access_token: None,
            response_format: Some(ResponseFormat::default()),
            transport: TransportOptions::defaults(),
        }
    }

    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_access_token(mut self, access_token: impl Into<String>) -> Self {
        self.access_token = Some(access_token.into());
        self
    }

    pub fn with_response_format(mut self, response_format: Option<ResponseFormat>) -> Self {
        self.response_format = response_format;
        self
    }

    pub fn with_transport(mut self, transport: TransportOptions) -> Self {
        self.transport.merge(&transport);
        self
    }

    /// Carrega o `.env` do diretório atual (se existir) e lê as variáveis
    pub fn from_env() -> ApiResult<Self> {
        load_env_file(Path::new("."))?;
        Self::from_vars()
    }

    /// Lê a configuração das variáveis de ambiente do processo
    ///
    /// Apenas `POPUPARCHIVE_CLIENT_ID` é obrigatório; variáveis vazias contam
    /// como ausentes.
    pub fn from_vars() -> ApiResult<Self> {
        let client_id = Self::get_env_var(ENV_CLIENT_ID).ok_or(ApiError::MissingClientId)?;
        let client_secret = Self::get_env_var(ENV_CLIENT_SECRET).unwrap_or_default();

        let mut config = Self::new(client_id, client_secret);
        config.redirect_uri = Self::get_env_var(ENV_REDIRECT_URI);
        config.access_token = Self::get_env_var(ENV_ACCESS_TOKEN);

        if let Some(domain) = Self::get_env_var(ENV_DOMAIN) {
            config.domain = domain;
        }

        if let Some(format) = Self::get_env_var(ENV_RESPONSE_FORMAT) {
            config.response_format = Some(ResponseFormat::from_key(&format)?);
        }

        config.validate()?;
        log::debug!("Configuração carregada do ambiente: {:?}", config);
        Ok(config)
    }

    fn get_env_var(key: &str) -> Option<String> {
        env::var(key).ok().filter(|value| !value.is_empty())
    }

    /// Valida as configurações obrigatórias
    pub fn validate(&self) -> ApiResult<()> {
        if self.client_id.is_empty() {
            return Err(ApiError::MissingClientId);
        }

        if self.domain.is_empty() {
            return Err(ApiError::config_error("domain must not be empty"));
        }

        if self.domain.contains("://") || self.domain.contains('/') {
            return Err(ApiError::config_error(format!(
                "domain must be a bare host name, got: {}",
                self.domain
            )));
        }

        Ok(())
    }
}

/// Carrega `dir/.env` se existir; variáveis já definidas não são sobrescritas
///
/// Retorna `true` quando o arquivo foi lido.
pub fn load_env_file(dir: &Path) -> ApiResult<bool> {
    let path = dir.join(".env");
    if !path.is_file() {
        return Ok(false);
    }

    dotenvy::from_path(&path)
        .map_err(|e| ApiError::config_error(format!("Failed to load {}: {}", path.display(), e)))?;
    log::debug!("Variáveis carregadas de {}", path.display());
    Ok(true)
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("redirect_uri", &self.redirect_uri)
            .field("domain", &self.domain)
            .field("has_access_token", &self.access_token.is_some())
            .field("response_format", &self.response_format)
            .field("transport", &self.transport)
            .finish()
    }
}
