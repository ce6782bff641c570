//! Montagem de requisições: URL, query string, headers e opções por chamada

use std::fmt;

use indexmap::IndexMap;
use url::form_urlencoded;

use crate::client::transport::TransportOptions;
use crate::config::ResponseFormat;

/// Parâmetros de query, na ordem em que serão codificados
pub type QueryParams = IndexMap<String, String>;

/// Campos de formulário para POST/PUT, na ordem em que serão codificados
pub type PostData = IndexMap<String, String>;

/// Parâmetro injetado nas chamadas sem access token
pub const CONSUMER_KEY_PARAM: &str = "consumer_key";

const API_PREFIX: &str = "api/";

/// Método HTTP suportado pelo pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Corpo da requisição
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    /// Enviado como `application/x-www-form-urlencoded`
    Form(PostData),
    /// Enviado como está, sem `Content-Type` padrão
    Raw(String),
}

impl RequestBody {
    /// Serializa o corpo para o transporte
    pub fn encode(&self) -> Option<String> {
        match self {
            Self::Empty => None,
            Self::Form(data) => Some(encode_pairs(data)),
            Self::Raw(raw) => Some(raw.clone()),
        }
    }

    pub fn content_type(&self) -> Option<&'static str> {
        match self {
            Self::Form(_) => Some("application/x-www-form-urlencoded"),
            _ => None,
        }
    }
}

/// Opções de uma única chamada; não são guardadas entre chamadas
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOptions {
    pub method: Method,
    pub query: QueryParams,
    pub body: RequestBody,
    /// Headers extras no formato `Nome: valor`
    pub headers: Vec<String>,
    /// Anexa `Authorization: Bearer` quando houver token
    pub include_auth: bool,
    /// Overrides do transporte apenas para esta chamada
    pub transport: TransportOptions,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::Get,
            query: QueryParams::new(),
            body: RequestBody::Empty,
            headers: Vec::new(),
            include_auth: true,
            transport: TransportOptions::default(),
        }
    }
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn query(mut self, query: QueryParams) -> Self {
        self.query = query;
        self
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.headers.push(header.into());
        self
    }

    /// Não envia o bearer token nesta chamada
    pub fn without_auth(mut self) -> Self {
        self.include_auth = false;
        self
    }

    pub fn transport(mut self, transport: TransportOptions) -> Self {
        self.transport = transport;
        self
    }
}

/// Mescla parâmetros: a ordem dos defaults é mantida e o chamador vence em colisão
pub fn merge_params(defaults: QueryParams, overrides: &QueryParams) -> QueryParams {
    let mut merged = defaults;
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Codifica pares como form-encoding (espaço vira `+`, reservados em `%XX`)
pub fn encode_pairs(params: &IndexMap<String, String>) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter())
        .finish()
}

/// Verifica se o caminho já é uma URL absoluta (`http://` ou `https://`)
pub fn is_absolute_url(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}

/// Caminhos de autorização não levam o prefixo `/api/`
pub fn uses_api_prefix(path: &str) -> bool {
    !path.contains("authorize")
}

/// Construtor de URLs para um domínio do serviço
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlBuilder {
    domain: String,
}

impl UrlBuilder {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Constrói a URL de uma chamada
    ///
    /// # Parâmetros
    /// - `path`: caminho relativo (`collections/public`) ou URL absoluta, usada como está
    /// - `params`: query string, codificada na ordem recebida
    /// - `use_api_prefix`: insere `/api/` entre domínio e caminho
    /// - `consumer_key`: `Some(client_id)` quando não há access token; com `None`
    ///   o parâmetro `consumer_key` nunca é enviado
    pub fn build(
        &self,
        path: &str,
        params: &QueryParams,
        use_api_prefix: bool,
        consumer_key: Option<&str>,
    ) -> String {
        let mut params = params.clone();
        match consumer_key {
            Some(key) => {
                params.insert(CONSUMER_KEY_PARAM.to_string(), key.to_string());
            }
            None => {
                params.shift_remove(CONSUMER_KEY_PARAM);
            }
        }

        let mut url = if is_absolute_url(path) {
            path.to_string()
        } else {
            format!(
                "https://{}/{}{}",
                self.domain,
                if use_api_prefix { API_PREFIX } else { "" },
                path.trim_start_matches('/')
            )
        };

        if !params.is_empty() {
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(&encode_pairs(&params));
        }

        url
    }
}

/// Headers padrão de toda chamada
///
/// `Accept` só entra se houver formato configurado; `Authorization` só com
/// `include_auth` e token presente.
pub fn build_default_headers(
    response_format: Option<ResponseFormat>,
    access_token: Option<&str>,
    include_auth: bool,
) -> Vec<String> {
    let mut headers = Vec::new();

    if let Some(format) = response_format {
        headers.push(format!("Accept: {}", format.mime_type()));
    }

    if include_auth {
        if let Some(token) = access_token.filter(|token| !token.is_empty()) {
            headers.push(format!("Authorization: Bearer {}", token));
        }
    }

    headers
}

/// Mescla headers do chamador sobre os defaults
///
/// Um header do chamador com o mesmo nome (sem diferenciar maiúsculas)
/// substitui o default na mesma posição; os demais são anexados ao final.
pub fn merge_headers(defaults: Vec<String>, extra: &[String]) -> Vec<String> {
    let mut merged = defaults;

    for header in extra {
        let name = header_name(header);
        let existing = name.as_ref().and_then(|name| {
            merged
                .iter()
                .position(|current| header_name(current).as_deref() == Some(name.as_str()))
        });

        match existing {
            Some(index) => merged[index] = header.clone(),
            None => merged.push(header.clone()),
        }
    }

    merged
}

/// Nome normalizado (minúsculo) de uma linha `Nome: valor`
pub fn header_name(header: &str) -> Option<String> {
    header
        .split_once(':')
        .map(|(name, _)| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
}
