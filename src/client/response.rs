//! Envelope de resposta: status, headers normalizados e corpo

use indexmap::IndexMap;

use crate::client::transport::RawResponse;
use crate::error::{ApiError, ApiResult};

/// Headers da resposta, com chaves em minúsculas e `-` trocado por `_`
pub type ResponseHeaders = IndexMap<String, String>;

/// Resultado capturado de uma chamada despachada
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResponseEnvelope {
    pub status_code: u16,
    pub headers: ResponseHeaders,
    pub body: String,
}

impl ResponseEnvelope {
    /// Monta o envelope a partir da resposta crua do transporte
    pub fn from_raw(raw: RawResponse) -> Self {
        Self {
            status_code: raw.status_code,
            headers: parse_http_headers(&raw.raw_headers),
            body: raw.raw_body,
        }
    }

    /// Valor de um header pelo nome normalizado (ex.: `content_type`)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        is_valid_response_code(self.status_code)
    }

    /// Consome o envelope devolvendo o corpo, ou o erro de status HTTP
    pub fn into_body(self) -> ApiResult<String> {
        if self.is_success() {
            Ok(self.body)
        } else {
            Err(ApiError::invalid_http_response(self.status_code, self.body))
        }
    }
}

/// Um status é válido se for 2xx
pub fn is_valid_response_code(code: u16) -> bool {
    (200..=299).contains(&code)
}

/// Faz o parse de um bloco de headers cru
///
/// Linhas sem `": "` (status line, linhas vazias) são ignoradas. Com mais de
/// um bloco (redirects, `100 Continue`), o último valor de cada chave vence.
pub fn parse_http_headers(raw: &str) -> ResponseHeaders {
    let mut headers = ResponseHeaders::new();

    for line in raw.trim().split('\n') {
        let Some((key, value)) = line.split_once(": ") else {
            continue;
        };

        let key = key.trim().to_lowercase().replace('-', "_");
        headers.insert(key, value.trim().to_string());
    }

    headers
}
