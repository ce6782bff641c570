//! Transporte HTTP: a única parte do SDK que abre conexões

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::client::request::Method;
use crate::error::{ApiError, ApiResult};

/// Opções do transporte (user agent, timeout, captura de headers)
///
/// Cada campo `None` significa "não sobrescrever"; ao mesclar, os valores
/// presentes nos overrides vencem.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportOptions {
    pub user_agent: Option<String>,
    pub timeout: Option<Duration>,
    /// Com `false`, o envelope da resposta chega sem headers
    pub capture_headers: Option<bool>,
}

impl TransportOptions {
    /// Opções padrão de um cliente recém-criado
    pub fn defaults() -> Self {
        Self {
            user_agent: Some(crate::USER_AGENT.to_string()),
            timeout: None,
            capture_headers: Some(true),
        }
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn capture_headers(mut self, capture: bool) -> Self {
        self.capture_headers = Some(capture);
        self
    }

    /// Aplica os overrides sobre estas opções
    pub fn merge(&mut self, overrides: &TransportOptions) {
        if let Some(user_agent) = &overrides.user_agent {
            self.user_agent = Some(user_agent.clone());
        }
        if let Some(timeout) = overrides.timeout {
            self.timeout = Some(timeout);
        }
        if let Some(capture) = overrides.capture_headers {
            self.capture_headers = Some(capture);
        }
    }

    pub fn merged(&self, overrides: &TransportOptions) -> Self {
        let mut merged = self.clone();
        merged.merge(overrides);
        merged
    }

    pub fn captures_headers(&self) -> bool {
        self.capture_headers.unwrap_or(true)
    }
}

/// Requisição já montada pelo pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    /// Linhas `Nome: valor`
    pub headers: Vec<String>,
    pub body: Option<String>,
    pub options: TransportOptions,
}

/// Resposta crua: status, bloco de headers e corpo separados
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status_code: u16,
    pub raw_headers: String,
    pub raw_body: String,
}

impl RawResponse {
    pub fn new(status_code: u16, raw_headers: impl Into<String>, raw_body: impl Into<String>) -> Self {
        Self {
            status_code,
            raw_headers: raw_headers.into(),
            raw_body: raw_body.into(),
        }
    }
}

/// Colaborador que executa a chamada HTTP
///
/// Falhas de rede (DNS, conexão, TLS) devem ser devolvidas como erro, sem
/// retry; qualquer status HTTP recebido é uma resposta válida aqui.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: TransportRequest) -> ApiResult<RawResponse>;
}

/// Transporte padrão sobre `reqwest`
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> ApiResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| ApiError::config_error(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Usa um `reqwest::Client` já configurado (proxy, TLS, pool)
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn reqwest_method(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: TransportRequest) -> ApiResult<RawResponse> {
        let url = url::Url::parse(&request.url)?;
        let mut builder = self
            .client
            .request(Self::reqwest_method(request.method), url);

        let mut has_user_agent = false;
        for header in &request.headers {
            match header.split_once(':') {
                Some((name, value)) => {
                    has_user_agent |= name.trim().eq_ignore_ascii_case("user-agent");
                    builder = builder.header(name.trim(), value.trim());
                }
                None => log::warn!("⚠️ Header ignorado (sem ':'): {}", header),
            }
        }

        if !has_user_agent {
            if let Some(user_agent) = &request.options.user_agent {
                builder = builder.header(reqwest::header::USER_AGENT, user_agent.as_str());
            }
        }

        if let Some(timeout) = request.options.timeout {
            builder = builder.timeout(timeout);
        }

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status_code = response.status().as_u16();

        let raw_headers = if request.options.captures_headers() {
            response
                .headers()
                .iter()
                .map(|(name, value)| {
                    format!("{}: {}\r\n", name.as_str(), String::from_utf8_lossy(value.as_bytes()))
                })
                .collect()
        } else {
            String::new()
        };

        let raw_body = response.text().await?;

        Ok(RawResponse {
            status_code,
            raw_headers,
            raw_body,
        })
    }
}
