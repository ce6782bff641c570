use chrono::{DateTime, Duration, Utc};
use oauth2::{AccessToken, ClientId, ClientSecret, RefreshToken};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{ApiError, ApiResult};

/// Credenciais da aplicação cliente
///
/// Apenas `redirect_uri` pode mudar depois da construção.
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    client_id: ClientId,
    client_secret: ClientSecret,
    redirect_uri: Option<String>,
}

impl ClientCredentials {
    /// Cria as credenciais; falha com `MissingClientId` se o client id for vazio
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: Option<String>,
    ) -> ApiResult<Self> {
        let client_id = client_id.into();
        if client_id.is_empty() {
            return Err(ApiError::MissingClientId);
        }

        Ok(Self {
            client_id: ClientId::new(client_id),
            client_secret: ClientSecret::new(client_secret.into()),
            redirect_uri,
        })
    }

    pub fn client_id(&self) -> &str {
        self.client_id.as_str()
    }

    pub fn client_secret(&self) -> &str {
        self.client_secret.secret()
    }

    pub fn redirect_uri(&self) -> Option<&str> {
        self.redirect_uri.as_deref()
    }

    pub fn set_redirect_uri(&mut self, redirect_uri: Option<String>) {
        self.redirect_uri = redirect_uri;
    }
}

/// Tipo de grant enviado ao endpoint de token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantType {
    AuthorizationCode,
    Password,
    RefreshToken,
}

impl GrantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::Password => "password",
            Self::RefreshToken => "refresh_token",
        }
    }
}

/// Resposta do endpoint de token, com todos os campos recebidos
///
/// Campos opcionais com tipo inesperado (ex.: `"scope": [...]`) não invalidam
/// a resposta: ficam em `extra` com o valor cru.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Campos não mapeados acima
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TokenResponse {
    /// Monta a resposta a partir do objeto JSON; `None` sem `access_token` string não-vazia
    pub fn from_fields(mut fields: Map<String, Value>) -> Option<Self> {
        let access_token = match fields.get("access_token") {
            Some(Value::String(token)) if !token.is_empty() => token.clone(),
            _ => return None,
        };
        fields.remove("access_token");

        let token_type = take_field(&mut fields, "token_type", string_value);
        let expires_in = take_field(&mut fields, "expires_in", seconds_value);
        let refresh_token = take_field(&mut fields, "refresh_token", string_value);
        let scope = take_field(&mut fields, "scope", string_value);

        Some(Self {
            access_token,
            token_type,
            expires_in,
            refresh_token,
            scope,
            extra: fields,
        })
    }
}

/// Remove o campo só quando o valor tem o tipo esperado
fn take_field<T>(
    fields: &mut Map<String, Value>,
    key: &str,
    parse: impl Fn(&Value) -> Option<T>,
) -> Option<T> {
    let parsed = fields.get(key).and_then(parse)?;
    fields.remove(key);
    Some(parsed)
}

fn string_value(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

/// Aceita `7200` e `"7200"`; negativos e frações ficam de fora
fn seconds_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Resultado de uma troca de token
///
/// `NotIssued` não é erro: a chamada HTTP teve sucesso, mas a resposta não
/// trouxe `access_token`.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenExchange {
    Issued(TokenResponse),
    NotIssued { response: Value },
}

impl TokenExchange {
    /// Interpreta o corpo JSON devolvido pelo endpoint de token
    pub fn from_body(body: &str) -> ApiResult<Self> {
        let value: Value = serde_json::from_str(body)?;

        if let Value::Object(fields) = &value {
            if let Some(response) = TokenResponse::from_fields(fields.clone()) {
                return Ok(Self::Issued(response));
            }
        }

        Ok(Self::NotIssued { response: value })
    }

    pub fn is_issued(&self) -> bool {
        matches!(self, Self::Issued(_))
    }

    pub fn access_token(&self) -> Option<&str> {
        match self {
            Self::Issued(response) => Some(&response.access_token),
            Self::NotIssued { .. } => None,
        }
    }

    pub fn into_response(self) -> Option<TokenResponse> {
        match self {
            Self::Issued(response) => Some(response),
            Self::NotIssued { .. } => None,
        }
    }
}

/// Estado de autenticação mantido pelo `TokenManager`
///
/// Sem access token o cliente está no estado não autenticado: as chamadas
/// levam `consumer_key` em vez de `Authorization`.
#[derive(Debug, Clone, Default)]
pub struct TokenState {
    access_token: Option<AccessToken>,
    refresh_token: Option<RefreshToken>,
    expires_at: Option<DateTime<Utc>>,
}

impl TokenState {
    /// Estado com um token obtido fora do SDK (sem refresh nem expiração)
    pub fn with_token(access_token: impl Into<String>) -> Self {
        let access_token = access_token.into();
        Self {
            access_token: (!access_token.is_empty()).then(|| AccessToken::new(access_token)),
            refresh_token: None,
            expires_at: None,
        }
    }

    /// Estado a partir de uma resposta de token emitida agora
    pub fn from_response(response: &TokenResponse) -> Self {
        Self::from_response_at(response, Utc::now())
    }

    pub(crate) fn from_response_at(response: &TokenResponse, issued_at: DateTime<Utc>) -> Self {
        let expires_at = response
            .expires_in
            .and_then(|secs| i64::try_from(secs).ok())
            .map(|secs| issued_at + Duration::seconds(secs));

        Self {
            access_token: Some(AccessToken::new(response.access_token.clone())),
            refresh_token: response.refresh_token.clone().map(RefreshToken::new),
            expires_at,
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_ref().map(|token| token.secret().as_str())
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_ref().map(|token| token.secret().as_str())
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    /// Sem expiração conhecida o token nunca é considerado expirado
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub(crate) fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_credentials_require_client_id() {
        let result = ClientCredentials::new("", "secret", None);
        assert!(matches!(result, Err(ApiError::MissingClientId)));

        let credentials = ClientCredentials::new("abc", "secret", Some("https://cb".to_string())).unwrap();
        assert_eq!(credentials.client_id(), "abc");
        assert_eq!(credentials.client_secret(), "secret");
        assert_eq!(credentials.redirect_uri(), Some("https://cb"));
    }

    #[test]
    fn test_credentials_debug_hides_secret() {
        let credentials = ClientCredentials::new("abc", "super-secret", None).unwrap();
        assert!(!format!("{:?}", credentials).contains("super-secret"));
    }

    #[test]
    fn test_redirect_uri_is_mutable() {
        let mut credentials = ClientCredentials::new("abc", "", None).unwrap();
        credentials.set_redirect_uri(Some("https://new".to_string()));
        assert_eq!(credentials.redirect_uri(), Some("https://new"));
    }

    #[test]
    fn test_exchange_issued_keeps_full_response() {
        let exchange = TokenExchange::from_body(
            r#"{"access_token":"tok123","token_type":"bearer","expires_in":7200,"refresh_token":"ref","created_at":1}"#,
        )
        .unwrap();

        assert!(exchange.is_issued());
        assert_eq!(exchange.access_token(), Some("tok123"));

        let response = exchange.into_response().unwrap();
        assert_eq!(response.token_type.as_deref(), Some("bearer"));
        assert_eq!(response.expires_in, Some(7200));
        assert_eq!(response.refresh_token.as_deref(), Some("ref"));
        assert_eq!(response.extra.get("created_at"), Some(&Value::from(1)));
    }

    #[test]
    fn test_exchange_not_issued_is_not_an_error() {
        let exchange = TokenExchange::from_body(r#"{"error":"invalid_grant"}"#).unwrap();
        assert!(!exchange.is_issued());
        assert_eq!(exchange.access_token(), None);
        match exchange {
            TokenExchange::NotIssued { response } => assert_eq!(response["error"], "invalid_grant"),
            TokenExchange::Issued(_) => panic!("token should not be issued"),
        }

        let exchange = TokenExchange::from_body(r#"{"access_token":""}"#).unwrap();
        assert!(!exchange.is_issued());
    }

    #[test]
    fn test_exchange_tolerates_unexpected_optional_fields() {
        let exchange = TokenExchange::from_body(r#"{"access_token":"tok","expires_in":"3600"}"#).unwrap();
        let response = exchange.into_response().unwrap();
        assert_eq!(response.expires_in, Some(3600));
        assert!(response.extra.is_empty());

        let exchange = TokenExchange::from_body(r#"{"access_token":"tok","expires_in":-1}"#).unwrap();
        let response = exchange.into_response().unwrap();
        assert_eq!(response.access_token, "tok");
        assert_eq!(response.expires_in, None);
        assert_eq!(response.extra.get("expires_in"), Some(&Value::from(-1)));

        let exchange =
            TokenExchange::from_body(r#"{"access_token":"tok","scope":["read","write"],"token_type":null}"#).unwrap();
        let response = exchange.into_response().unwrap();
        assert_eq!(response.scope, None);
        assert_eq!(response.token_type, None);
        assert_eq!(response.extra.get("scope"), Some(&serde_json::json!(["read", "write"])));
    }

    #[test]
    fn test_exchange_requires_string_access_token() {
        assert!(!TokenExchange::from_body(r#"{"access_token":123}"#).unwrap().is_issued());
        assert!(!TokenExchange::from_body(r#"["access_token"]"#).unwrap().is_issued());
    }

    #[test]
    fn test_exchange_rejects_non_json_body() {
        let result = TokenExchange::from_body("<html>oops</html>");
        assert!(matches!(result, Err(ApiError::Serialization(_))));
    }

    #[test]
    fn test_token_state_expiry() {
        let response = TokenExchange::from_body(r#"{"access_token":"t","expires_in":60,"refresh_token":"r"}"#)
            .unwrap()
            .into_response()
            .unwrap();

        let issued_at = Utc::now();
        let state = TokenState::from_response_at(&response, issued_at);

        assert_eq!(state.access_token(), Some("t"));
        assert_eq!(state.refresh_token(), Some("r"));
        assert!(!state.is_expired_at(issued_at + Duration::seconds(59)));
        assert!(state.is_expired_at(issued_at + Duration::seconds(60)));
    }

    #[test]
    fn test_token_state_without_expiry() {
        let state = TokenState::with_token("manual");
        assert!(state.is_authenticated());
        assert!(!state.is_expired());
        assert_eq!(state.refresh_token(), None);

        assert!(!TokenState::with_token("").is_authenticated());
        assert!(!TokenState::default().is_authenticated());
    }
}
