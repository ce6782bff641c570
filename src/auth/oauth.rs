use std::sync::{PoisonError, RwLock};

use tokio::sync::{Mutex, MutexGuard};

use crate::auth::token::{ClientCredentials, GrantType, TokenExchange, TokenState};
use crate::client::request::{merge_params, PostData, QueryParams, UrlBuilder};
use crate::error::ApiResult;

/// Caminho do endpoint de autorização (sem prefixo `/api/`)
pub const AUTHORIZE_PATH: &str = "oauth/authorize";

/// Caminho do endpoint de token (sem prefixo `/api/`)
pub const ACCESS_TOKEN_PATH: &str = "oauth/token";

/// Gerenciador do estado OAuth2 do cliente
///
/// Guarda as credenciais e o token atual, monta a URL de autorização e os
/// formulários de cada grant. As chamadas HTTP em si ficam no `ApiClient`.
#[derive(Debug)]
pub struct TokenManager {
    credentials: ClientCredentials,
    urls: UrlBuilder,
    state: RwLock<TokenState>,
    exchange_guard: Mutex<()>,
}

impl TokenManager {
    pub fn new(credentials: ClientCredentials, urls: UrlBuilder) -> Self {
        Self {
            credentials,
            urls,
            state: RwLock::new(TokenState::default()),
            exchange_guard: Mutex::new(()),
        }
    }

    pub fn credentials(&self) -> &ClientCredentials {
        &self.credentials
    }

    pub fn client_id(&self) -> &str {
        self.credentials.client_id()
    }

    pub fn redirect_uri(&self) -> Option<&str> {
        self.credentials.redirect_uri()
    }

    pub fn set_redirect_uri(&mut self, redirect_uri: Option<String>) -> &mut Self {
        self.credentials.set_redirect_uri(redirect_uri);
        self
    }

    /// `Some(client_id)` enquanto não houver access token
    pub fn consumer_key(&self) -> Option<&str> {
        if self.read_state().is_authenticated() {
            None
        } else {
            Some(self.client_id())
        }
    }

    /// URL de autorização para onde o usuário deve ser enviado
    ///
    /// Defaults `client_id`, `redirect_uri` (só se configurada) e
    /// `response_type=code`; os parâmetros do chamador vencem em colisão.
    /// Nenhuma chamada de rede.
    pub fn build_authorize_url(&self, params: &QueryParams) -> String {
        let mut defaults = QueryParams::new();
        defaults.insert("client_id".to_string(), self.client_id().to_string());
        if let Some(redirect_uri) = self.redirect_uri() {
            defaults.insert("redirect_uri".to_string(), redirect_uri.to_string());
        }
        defaults.insert("response_type".to_string(), "code".to_string());

        let params = merge_params(defaults, params);
        self.urls
            .build(AUTHORIZE_PATH, &params, false, self.consumer_key())
    }

    /// URL do endpoint de token
    pub fn access_token_url(&self, params: &QueryParams) -> String {
        self.urls
            .build(ACCESS_TOKEN_PATH, params, false, self.consumer_key())
    }

    /// Formulário do grant `authorization_code`
    ///
    /// Campos vazios (ou `"0"`) são removidos antes do envio, inclusive os
    /// enviados pelo chamador. Compatibilidade com o SDK legado: não reutilizar
    /// esse filtro em outros grants.
    pub fn authorization_code_grant(&self, code: &str, extra: &PostData) -> PostData {
        let mut defaults = PostData::new();
        defaults.insert("code".to_string(), code.to_string());
        self.insert_client_fields(&mut defaults, true);
        defaults.insert("grant_type".to_string(), GrantType::AuthorizationCode.as_str().to_string());

        let mut data = merge_params(defaults, extra);
        data.retain(|_, value| !is_falsy(value));
        data
    }

    /// Formulário do grant `password`
    pub fn credentials_grant(&self, username: &str, password: &str) -> PostData {
        let mut data = PostData::new();
        self.insert_client_fields(&mut data, false);
        data.insert("username".to_string(), username.to_string());
        data.insert("password".to_string(), password.to_string());
        data.insert("grant_type".to_string(), GrantType::Password.as_str().to_string());
        data
    }

    /// Formulário do grant `refresh_token`
    pub fn refresh_grant(&self, refresh_token: &str, extra: &PostData) -> PostData {
        let mut defaults = PostData::new();
        defaults.insert("refresh_token".to_string(), refresh_token.to_string());
        self.insert_client_fields(&mut defaults, true);
        defaults.insert("grant_type".to_string(), GrantType::RefreshToken.as_str().to_string());

        merge_params(defaults, extra)
    }

    fn insert_client_fields(&self, data: &mut PostData, with_redirect: bool) {
        data.insert("client_id".to_string(), self.client_id().to_string());
        data.insert(
            "client_secret".to_string(),
            self.credentials.client_secret().to_string(),
        );
        if with_redirect {
            data.insert(
                "redirect_uri".to_string(),
                self.redirect_uri().unwrap_or_default().to_string(),
            );
        }
    }

    /// Interpreta a resposta do endpoint de token e guarda o token emitido
    pub fn accept_token_response(&self, body: &str) -> ApiResult<TokenExchange> {
        let exchange = TokenExchange::from_body(body)?;

        match &exchange {
            TokenExchange::Issued(response) => {
                *self.write_state() = TokenState::from_response(response);
                log::info!("✅ [OAuth2] Access token obtido e armazenado");
            }
            TokenExchange::NotIssued { .. } => {
                log::warn!("⚠️ [OAuth2] Resposta do endpoint de token sem access_token");
            }
        }

        Ok(exchange)
    }

    pub fn current_access_token(&self) -> Option<String> {
        self.read_state().access_token().map(str::to_string)
    }

    /// Cópia do estado atual (token, refresh token, expiração)
    pub fn token_state(&self) -> TokenState {
        self.read_state().clone()
    }

    /// Define um token obtido fora do SDK
    pub fn set_access_token(&self, access_token: impl Into<String>) {
        *self.write_state() = TokenState::with_token(access_token);
        log::info!("🔑 [OAuth2] Access token definido manualmente");
    }

    /// Volta ao estado não autenticado
    pub fn clear_access_token(&self) {
        *self.write_state() = TokenState::default();
        log::info!("🗑️ [OAuth2] Access token removido");
    }

    /// Serializa trocas de token concorrentes
    pub(crate) async fn lock_exchange(&self) -> MutexGuard<'_, ()> {
        self.exchange_guard.lock().await
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, TokenState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, TokenState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn is_falsy(value: &str) -> bool {
    value.is_empty() || value == "0"
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn manager(redirect_uri: Option<&str>) -> TokenManager {
        let credentials =
            ClientCredentials::new("abc", "shh", redirect_uri.map(str::to_string)).unwrap();
        TokenManager::new(credentials, UrlBuilder::new("www.popuparchive.com"))
    }

    fn pairs(data: &PostData) -> Vec<(&str, &str)> {
        data.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect()
    }

    #[test]
    fn test_authorize_url() {
        let tokens = manager(Some("https://cb"));
        let url = tokens.build_authorize_url(&QueryParams::new());

        assert!(url.starts_with("https://www.popuparchive.com/oauth/authorize?"));
        assert!(url.contains("client_id=abc&redirect_uri=https%3A%2F%2Fcb&response_type=code"));
        assert!(!url.contains("/api/"));
        assert!(url.ends_with("&consumer_key=abc"));
    }

    #[test]
    fn test_authorize_url_without_redirect_uri() {
        let tokens = manager(None);
        assert_eq!(
            tokens.build_authorize_url(&QueryParams::new()),
            "https://www.popuparchive.com/oauth/authorize?client_id=abc&response_type=code&consumer_key=abc"
        );
    }

    #[test]
    fn test_authorize_url_caller_overrides_win() {
        let tokens = manager(Some("https://cb"));
        tokens.set_access_token("tok");

        let mut params = QueryParams::new();
        params.insert("response_type".to_string(), "token".to_string());
        params.insert("scope".to_string(), "read write".to_string());

        let url = tokens.build_authorize_url(&params);
        assert_eq!(
            url,
            "https://www.popuparchive.com/oauth/authorize?client_id=abc&redirect_uri=https%3A%2F%2Fcb&response_type=token&scope=read+write"
        );
    }

    #[test]
    fn test_access_token_url() {
        let tokens = manager(None);
        assert_eq!(
            tokens.access_token_url(&QueryParams::new()),
            "https://www.popuparchive.com/oauth/token?consumer_key=abc"
        );

        tokens.set_access_token("tok");
        assert_eq!(
            tokens.access_token_url(&QueryParams::new()),
            "https://www.popuparchive.com/oauth/token"
        );
    }

    #[test]
    fn test_authorization_code_grant_drops_falsy_fields() {
        let tokens = manager(None);
        let data = tokens.authorization_code_grant("the-code", &PostData::new());

        assert_eq!(
            pairs(&data),
            vec![
                ("code", "the-code"),
                ("client_id", "abc"),
                ("client_secret", "shh"),
                ("grant_type", "authorization_code"),
            ]
        );

        // Um code vazio também some do formulário
        let data = tokens.authorization_code_grant("", &PostData::new());
        assert!(!data.contains_key("code"));
    }

    #[test]
    fn test_authorization_code_grant_merges_extra() {
        let tokens = manager(Some("https://cb"));
        let mut extra = PostData::new();
        extra.insert("redirect_uri".to_string(), "https://other".to_string());
        extra.insert("state".to_string(), "s1".to_string());

        let data = tokens.authorization_code_grant("c", &extra);
        assert_eq!(data.get("redirect_uri").map(String::as_str), Some("https://other"));
        assert_eq!(data.get("state").map(String::as_str), Some("s1"));
        assert_eq!(data.get_index(4).map(|(k, _)| k.as_str()), Some("grant_type"));
    }

    #[test]
    fn test_credentials_grant() {
        let tokens = manager(Some("https://cb"));
        let data = tokens.credentials_grant("u", "p");
        assert_eq!(
            pairs(&data),
            vec![
                ("client_id", "abc"),
                ("client_secret", "shh"),
                ("username", "u"),
                ("password", "p"),
                ("grant_type", "password"),
            ]
        );
    }

    #[test]
    fn test_refresh_grant_keeps_empty_fields() {
        let tokens = manager(None);
        let data = tokens.refresh_grant("r1", &PostData::new());
        assert_eq!(
            pairs(&data),
            vec![
                ("refresh_token", "r1"),
                ("client_id", "abc"),
                ("client_secret", "shh"),
                ("redirect_uri", ""),
                ("grant_type", "refresh_token"),
            ]
        );
    }

    #[test]
    fn test_accept_token_response_stores_token() {
        let tokens = manager(None);
        assert_eq!(tokens.consumer_key(), Some("abc"));

        let exchange = tokens
            .accept_token_response(r#"{"access_token":"tok123","refresh_token":"r"}"#)
            .unwrap();

        assert!(exchange.is_issued());
        assert_eq!(tokens.current_access_token().as_deref(), Some("tok123"));
        assert_eq!(tokens.token_state().refresh_token(), Some("r"));
        assert_eq!(tokens.consumer_key(), None);
    }

    #[test]
    fn test_not_issued_keeps_previous_token() {
        let tokens = manager(None);
        tokens.set_access_token("old");

        let exchange = tokens.accept_token_response(r#"{"error":"invalid_grant"}"#).unwrap();
        assert!(!exchange.is_issued());
        assert_eq!(tokens.current_access_token().as_deref(), Some("old"));
    }

    #[test]
    fn test_clear_access_token() {
        let tokens = manager(None);
        tokens.set_access_token("tok");
        tokens.clear_access_token();
        assert_eq!(tokens.current_access_token(), None);
        assert_eq!(tokens.consumer_key(), Some("abc"));
    }
}
