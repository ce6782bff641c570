use std::sync::{Arc, PoisonError, RwLock};

use crate::auth::oauth::TokenManager;
use crate::auth::token::{ClientCredentials, TokenExchange, TokenState};
use crate::client::request::{
    build_default_headers, merge_headers, merge_params, uses_api_prefix, Method, PostData,
    QueryParams, RequestBody, RequestOptions, UrlBuilder,
};
use crate::client::response::ResponseEnvelope;
use crate::client::transport::{ReqwestTransport, Transport, TransportOptions, TransportRequest};
use crate::config::formats::{audio_mime_type, ResponseFormat};
use crate::config::ClientConfig;
use crate::error::ApiResult;

/// Versão da API remota
pub const API_VERSION: u32 = 1;

/// Cliente da API do Pop Up Archive
///
/// Cada chamada passa pelo mesmo pipeline: URL (com `consumer_key` quando não
/// autenticado), headers (`Accept` e `Authorization: Bearer`), transporte e
/// validação do status. A última resposta fica disponível para diagnóstico;
/// com chamadas concorrentes, a última a terminar vence.
pub struct ApiClient {
    tokens: TokenManager,
    urls: UrlBuilder,
    transport: Arc<dyn Transport>,
    response_format: Option<ResponseFormat>,
    transport_options: TransportOptions,
    last_response: RwLock<Option<ResponseEnvelope>>,
}

impl ApiClient {
    /// Cria um cliente com o domínio padrão e transporte `reqwest`
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: Option<String>,
    ) -> ApiResult<Self> {
        let mut config = ClientConfig::new(client_id, client_secret);
        config.redirect_uri = redirect_uri;
        Self::from_config(config)
    }

    pub fn from_config(config: ClientConfig) -> ApiResult<Self> {
        let transport = ReqwestTransport::new()?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Cria um cliente com um transporte próprio
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> ApiResult<Self> {
        config.validate()?;

        let credentials =
            ClientCredentials::new(config.client_id, config.client_secret, config.redirect_uri)?;
        let urls = UrlBuilder::new(config.domain);
        let tokens = TokenManager::new(credentials, urls.clone());

        if let Some(access_token) = config.access_token {
            tokens.set_access_token(access_token);
        }

        Ok(Self {
            tokens,
            urls,
            transport,
            response_format: config.response_format,
            transport_options: config.transport,
            last_response: RwLock::new(None),
        })
    }

    pub fn api_version(&self) -> u32 {
        API_VERSION
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    // ---- OAuth2 ----

    /// URL de autorização (ver `TokenManager::build_authorize_url`)
    pub fn authorize_url(&self, params: &QueryParams) -> String {
        self.tokens.build_authorize_url(params)
    }

    pub fn access_token_url(&self, params: &QueryParams) -> String {
        self.tokens.access_token_url(params)
    }

    /// Troca um authorization code por access token
    ///
    /// # Retorno
    /// - `Ok(TokenExchange::Issued)`: token armazenado, resposta completa
    /// - `Ok(TokenExchange::NotIssued)`: resposta 2xx sem `access_token`
    /// - `Err(ApiError::InvalidHttpResponse)`: status não-2xx
    pub async fn exchange_authorization_code(
        &self,
        code: &str,
        extra_post_data: &PostData,
        options: RequestOptions,
    ) -> ApiResult<TokenExchange> {
        let data = self.tokens.authorization_code_grant(code, extra_post_data);
        self.request_token(data, options).await
    }

    /// Grant `password` com usuário e senha
    pub async fn exchange_credentials(&self, username: &str, password: &str) -> ApiResult<TokenExchange> {
        let data = self.tokens.credentials_grant(username, password);
        self.request_token(data, RequestOptions::default()).await
    }

    /// Renova o access token a partir de um refresh token
    pub async fn refresh_access_token(
        &self,
        refresh_token: &str,
        extra_post_data: &PostData,
        options: RequestOptions,
    ) -> ApiResult<TokenExchange> {
        let data = self.tokens.refresh_grant(refresh_token, extra_post_data);
        self.request_token(data, options).await
    }

    async fn request_token(&self, data: PostData, options: RequestOptions) -> ApiResult<TokenExchange> {
        // Uma troca por vez: evita escritas intercaladas no token armazenado
        let _guard = self.tokens.lock_exchange().await;

        let grant_type = data.get("grant_type").cloned().unwrap_or_default();
        log::info!("🔐 [OAuth2] Solicitando access token (grant: {})", grant_type);

        let url = self.tokens.access_token_url(&options.query);
        let options = options
            .method(Method::Post)
            .body(RequestBody::Form(data));

        let body = self.request(&url, options).await?;
        self.tokens.accept_token_response(&body)
    }

    pub fn current_access_token(&self) -> Option<String> {
        self.tokens.current_access_token()
    }

    pub fn token_state(&self) -> TokenState {
        self.tokens.token_state()
    }

    pub fn set_access_token(&self, access_token: impl Into<String>) -> &Self {
        self.tokens.set_access_token(access_token);
        self
    }

    pub fn clear_access_token(&self) -> &Self {
        self.tokens.clear_access_token();
        self
    }

    pub fn redirect_uri(&self) -> Option<&str> {
        self.tokens.redirect_uri()
    }

    pub fn set_redirect_uri(&mut self, redirect_uri: Option<String>) -> &mut Self {
        self.tokens.set_redirect_uri(redirect_uri);
        self
    }

    // ---- Configuração ----

    /// MIME type enviado no `Accept`, se houver formato configurado
    pub fn response_format(&self) -> Option<&'static str> {
        self.response_format.map(|format| format.mime_type())
    }

    /// Seleciona o formato pela chave da tabela (`*` ou `json`)
    pub fn set_response_format(&mut self, key: &str) -> ApiResult<&mut Self> {
        self.response_format = Some(ResponseFormat::from_key(key)?);
        Ok(self)
    }

    /// Remove o header `Accept` das próximas chamadas
    pub fn clear_response_format(&mut self) -> &mut Self {
        self.response_format = None;
        self
    }

    pub fn transport_options(&self) -> &TransportOptions {
        &self.transport_options
    }

    /// Mescla overrides nas opções do transporte; os overrides vencem
    pub fn set_transport_options(&mut self, overrides: TransportOptions) -> &mut Self {
        self.transport_options.merge(&overrides);
        self
    }

    pub fn audio_mime_type(&self, extension: &str) -> ApiResult<&'static str> {
        audio_mime_type(extension)
    }

    // ---- Pipeline ----

    /// Constrói a URL de uma chamada aplicando a regra do `consumer_key`
    pub fn build_url(&self, path: &str, params: &QueryParams, use_api_prefix: bool) -> String {
        self.urls
            .build(path, params, use_api_prefix, self.tokens.consumer_key())
    }

    /// Headers padrão (`Accept`, e `Authorization` se `include_auth` e houver token)
    pub fn build_headers(&self, include_auth: bool) -> Vec<String> {
        let access_token = self.tokens.current_access_token();
        build_default_headers(self.response_format, access_token.as_deref(), include_auth)
    }

    /// Executa a chamada e captura status, headers e corpo, sem validar o status
    pub async fn dispatch(&self, url: &str, options: &RequestOptions) -> ApiResult<ResponseEnvelope> {
        let mut defaults = self.build_headers(options.include_auth);
        if let Some(content_type) = options.body.content_type() {
            defaults.push(format!("Content-Type: {}", content_type));
        }

        let transport_options = self.transport_options.merged(&options.transport);
        let capture_headers = transport_options.captures_headers();

        let request = TransportRequest {
            method: options.method,
            url: url.to_string(),
            headers: merge_headers(defaults, &options.headers),
            body: options.body.encode(),
            options: transport_options,
        };

        log::debug!("{} {}", options.method, url);

        let raw = self.transport.execute(request).await?;
        let mut envelope = ResponseEnvelope::from_raw(raw);
        if !capture_headers {
            envelope.headers.clear();
        }

        log::debug!("Response status: {}", envelope.status_code);

        *self
            .last_response
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(envelope.clone());

        Ok(envelope)
    }

    /// Executa a chamada e devolve o corpo se o status for 2xx
    pub async fn request(&self, url: &str, options: RequestOptions) -> ApiResult<String> {
        let envelope = self.dispatch(url, &options).await?;
        if !envelope.is_success() {
            log::warn!("❌ {} {} respondeu HTTP {}", options.method, url, envelope.status_code);
        }
        envelope.into_body()
    }

    async fn send(&self, path: &str, params: &QueryParams, options: RequestOptions) -> ApiResult<String> {
        let query = merge_params(params.clone(), &options.query);
        let url = self.build_url(path, &query, uses_api_prefix(path));
        self.request(&url, options).await
    }

    // ---- Diagnóstico da última resposta ----

    pub fn last_response(&self) -> Option<ResponseEnvelope> {
        self.last_response
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last_status_code(&self) -> Option<u16> {
        self.last_response().map(|response| response.status_code)
    }

    pub fn last_body(&self) -> Option<String> {
        self.last_response().map(|response| response.body)
    }

    /// Header da última resposta pelo nome normalizado (ex.: `content_type`)
    pub fn http_header(&self, name: &str) -> Option<String> {
        self.last_response()
            .and_then(|response| response.header(name).map(str::to_string))
    }

    // ---- Chamadas genéricas ----

    pub async fn get(&self, path: &str, params: &QueryParams, options: RequestOptions) -> ApiResult<String> {
        self.send(path, params, options.method(Method::Get)).await
    }

    pub async fn post(&self, path: &str, data: RequestBody, options: RequestOptions) -> ApiResult<String> {
        self.send(path, &QueryParams::new(), options.method(Method::Post).body(data))
            .await
    }

    pub async fn put(&self, path: &str, data: RequestBody, options: RequestOptions) -> ApiResult<String> {
        self.send(path, &QueryParams::new(), options.method(Method::Put).body(data))
            .await
    }

    pub async fn delete(&self, path: &str, params: &QueryParams, options: RequestOptions) -> ApiResult<String> {
        self.send(path, params, options.method(Method::Delete)).await
    }

    // ---- Recursos ----

    /// GET `collections/public`
    pub async fn get_public_collections(&self, params: &QueryParams) -> ApiResult<String> {
        self.get("collections/public", params, RequestOptions::default())
            .await
    }

    /// GET `collections`; inclui coleções privadas quando autenticado
    pub async fn get_user_collections(&self, params: &QueryParams) -> ApiResult<String> {
        self.get("collections", params, RequestOptions::default())
            .await
    }

    /// GET `collections/{id}`
    pub async fn get_collection_by_id(&self, collection_id: &str, params: &QueryParams) -> ApiResult<String> {
        let path = format!("collections/{}", urlencoding::encode(collection_id));
        self.get(&path, params, RequestOptions::default()).await
    }

    /// GET `collections/{collection_id}/items/{item_id}`
    pub async fn get_item_by_id(
        &self,
        collection_id: &str,
        item_id: &str,
        params: &QueryParams,
    ) -> ApiResult<String> {
        let path = format!(
            "collections/{}/items/{}",
            urlencoding::encode(collection_id),
            urlencoding::encode(item_id)
        );
        self.get(&path, params, RequestOptions::default()).await
    }

    /// GET `search?query=collection_id:{id}` mesclado com `params`
    pub async fn get_items_by_collection_id(
        &self,
        collection_id: &str,
        params: &QueryParams,
    ) -> ApiResult<String> {
        let mut query = QueryParams::new();
        query.insert("query".to_string(), format!("collection_id:{}", collection_id));

        let query = merge_params(query, params);
        self.get("search", &query, RequestOptions::default()).await
    }

    /// GET `search` com `filters[{key}]={value}` mesclado com `params`
    pub async fn search_by_filter(
        &self,
        filter_key: &str,
        filter_value: &str,
        params: &QueryParams,
    ) -> ApiResult<String> {
        let mut query = QueryParams::new();
        query.insert(format!("filters[{}]", filter_key), filter_value.to_string());

        let query = merge_params(query, params);
        self.get("search", &query, RequestOptions::default()).await
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("tokens", &self.tokens)
            .field("urls", &self.urls)
            .field("response_format", &self.response_format)
            .field("transport_options", &self.transport_options)
            .finish_non_exhaustive()
    }
}
