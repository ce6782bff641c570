use thiserror::Error;

/// Tipos de erro do SDK do Pop Up Archive
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("A client id must be provided")]
    MissingClientId,

    #[error("The given response format is unsupported: {0}")]
    UnsupportedResponseFormat(String),

    #[error("The given audio format is unsupported: {0}")]
    UnsupportedAudioFormat(String),

    /// A requisição completou, mas o status não é 2xx
    #[error("The requested URL responded with HTTP code {http_code}.")]
    InvalidHttpResponse { http_code: u16, http_body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ApiError {
    pub fn invalid_http_response(http_code: u16, http_body: impl Into<String>) -> Self {
        Self::InvalidHttpResponse {
            http_code,
            http_body: http_body.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn transport_error(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Código HTTP da resposta inválida, se este erro veio de uma
    pub fn http_code(&self) -> Option<u16> {
        match self {
            Self::InvalidHttpResponse { http_code, .. } => Some(*http_code),
            _ => None,
        }
    }

    /// Corpo da resposta inválida, se este erro veio de uma
    pub fn http_body(&self) -> Option<&str> {
        match self {
            Self::InvalidHttpResponse { http_body, .. } => Some(http_body),
            _ => None,
        }
    }
}

/// Tipo de resultado padrão do SDK
pub type ApiResult<T> = Result<T, ApiError>;
