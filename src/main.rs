use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use popuparchive::client::api::ApiClient;
use popuparchive::client::request::{PostData, QueryParams, RequestOptions};
use popuparchive::config::env::{load_env_file, DEFAULT_DOMAIN};
use popuparchive::config::formats::{audio_mime_type, ResponseFormat};
use popuparchive::{ClientConfig, TokenExchange};
use serde_json::{json, Value};
use std::path::Path;

/// Pop Up Archive CLI - Interface de linha de comando para a API do Pop Up Archive
#[derive(Parser)]
#[command(name = "popuparchive")]
#[command(version)]
#[command(about = "CLI para a API do Pop Up Archive", long_about = None)]
struct Cli {
    /// Client ID da aplicação (ou use POPUPARCHIVE_CLIENT_ID env var)
    #[arg(long, env = "POPUPARCHIVE_CLIENT_ID", global = true, hide_env_values = true)]
    client_id: Option<String>,

    /// Client secret da aplicação
    #[arg(long, env = "POPUPARCHIVE_CLIENT_SECRET", global = true, hide_env_values = true)]
    client_secret: Option<String>,

    /// Redirect URI registrada para a aplicação
    #[arg(long, env = "POPUPARCHIVE_REDIRECT_URI", global = true)]
    redirect_uri: Option<String>,

    /// Domínio do serviço (sem esquema)
    #[arg(long, env = "POPUPARCHIVE_DOMAIN", default_value = DEFAULT_DOMAIN, global = true)]
    domain: String,

    /// Access token obtido previamente (nunca é salvo pelo CLI)
    #[arg(short = 't', long, env = "POPUPARCHIVE_ACCESS_TOKEN", global = true, hide_env_values = true)]
    token: Option<String>,

    /// Formato pedido à API no header Accept (*, json)
    #[arg(long, env = "POPUPARCHIVE_RESPONSE_FORMAT", global = true)]
    response_format: Option<String>,

    /// Parâmetros extras de query (formato: chave=valor, repetível)
    #[arg(short = 'p', long = "param", global = true)]
    params: Vec<String>,

    /// Formato de saída (json, pretty)
    #[arg(short = 'o', long, default_value = "pretty", global = true)]
    output: OutputFormat,

    /// Modo verbose para debug
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Comando a executar
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, PartialEq)]
enum OutputFormat {
    Json,
    Pretty,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "pretty" => Ok(OutputFormat::Pretty),
            _ => Err(format!("Formato desconhecido: {}", s)),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Mostra a URL de autorização OAuth2
    AuthorizeUrl {
        /// Valor de `state` repassado ao callback
        #[arg(long)]
        state: Option<String>,

        /// Escopos pedidos
        #[arg(long)]
        scope: Option<String>,
    },

    /// Obtém um token com usuário e senha (grant password)
    Login {
        #[arg(short = 'u', long)]
        username: String,

        #[arg(long, env = "POPUPARCHIVE_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Troca um authorization code por token
    ExchangeCode {
        /// Code recebido no callback
        #[arg(short = 'c', long)]
        code: String,
    },

    /// Renova o token a partir de um refresh token
    Refresh {
        #[arg(short = 'r', long)]
        refresh_token: String,
    },

    /// Lista as coleções públicas
    PublicCollections,

    /// Lista as coleções do usuário
    Collections,

    /// Obtém uma coleção
    Collection {
        /// ID da coleção
        #[arg(short = 'c', long)]
        collection_id: String,
    },

    /// Obtém um item de uma coleção
    Item {
        #[arg(short = 'c', long)]
        collection_id: String,

        #[arg(short = 'i', long)]
        item_id: String,
    },

    /// Lista os itens de uma coleção
    Items {
        #[arg(short = 'c', long)]
        collection_id: String,
    },

    /// Busca itens por filtro
    Search {
        /// Nome do filtro (ex.: tag)
        #[arg(short = 'k', long)]
        key: String,

        /// Valor do filtro
        #[arg(short = 'q', long)]
        value: String,
    },

    /// GET genérico em um caminho da API
    Get {
        /// Caminho relativo a /api/ (ex.: collections/public)
        path: String,
    },

    /// Mostra o MIME type de uma extensão de áudio
    MimeType {
        /// Extensão (aac, aiff, flac, mp3, ogg, wav)
        extension: String,
    },
}

/// Estrutura para resposta padronizada
#[derive(serde::Serialize)]
struct CliResponse {
    success: bool,
    data: Option<Value>,
    error: Option<String>,
}

impl CliResponse {
    fn success(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn error(msg: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg),
        }
    }
}

#[tokio::main]
async fn main() {
    // `.env` antes do parse: as flags leem as variáveis de ambiente
    if let Err(e) = load_env_file(Path::new(".")) {
        eprintln!("❌ Erro: {}", e);
        std::process::exit(1);
    }

    let cli = Cli::parse();

    // Configura logging
    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("error")).init();
    }

    match execute_command(&cli).await {
        Ok(response) => {
            let exit_code = if response.success { 0 } else { 1 };
            output_response(response, &cli.output);
            std::process::exit(exit_code);
        }
        Err(e) => {
            eprintln!("❌ Erro: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn execute_command(cli: &Cli) -> anyhow::Result<CliResponse> {
    if let Commands::MimeType { extension } = &cli.command {
        return Ok(match audio_mime_type(extension) {
            Ok(mime_type) => CliResponse::success(json!({
                "extension": extension,
                "mime_type": mime_type,
            })),
            Err(e) => CliResponse::error(e.to_string()),
        });
    }

    let client = build_client(cli)?;
    let params = parse_params(&cli.params)?;

    let result = match &cli.command {
        Commands::AuthorizeUrl { state, scope } => {
            let mut query = params.clone();
            if let Some(state) = state {
                query.insert("state".to_string(), state.clone());
            }
            if let Some(scope) = scope {
                query.insert("scope".to_string(), scope.clone());
            }
            return Ok(CliResponse::success(json!({
                "authorize_url": client.authorize_url(&query),
            })));
        }

        Commands::Login { username, password } => {
            let exchange = client.exchange_credentials(username, password).await;
            return Ok(token_response(exchange));
        }

        Commands::ExchangeCode { code } => {
            let exchange = client
                .exchange_authorization_code(code, &PostData::new(), RequestOptions::default())
                .await;
            return Ok(token_response(exchange));
        }

        Commands::Refresh { refresh_token } => {
            let exchange = client
                .refresh_access_token(refresh_token, &PostData::new(), RequestOptions::default())
                .await;
            return Ok(token_response(exchange));
        }

        Commands::PublicCollections => client.get_public_collections(&params).await,
        Commands::Collections => client.get_user_collections(&params).await,
        Commands::Collection { collection_id } => {
            client.get_collection_by_id(collection_id, &params).await
        }
        Commands::Item { collection_id, item_id } => {
            client.get_item_by_id(collection_id, item_id, &params).await
        }
        Commands::Items { collection_id } => {
            client.get_items_by_collection_id(collection_id, &params).await
        }
        Commands::Search { key, value } => client.search_by_filter(key, value, &params).await,
        Commands::Get { path } => client.get(path, &params, RequestOptions::default()).await,
        Commands::MimeType { .. } => return Err(anyhow!("mime-type não usa o cliente")),
    };

    Ok(match result {
        Ok(body) => CliResponse::success(body_to_value(body)),
        Err(e) => CliResponse::error(describe_error(&e)),
    })
}

fn build_client(cli: &Cli) -> anyhow::Result<ApiClient> {
    let client_id = cli
        .client_id
        .clone()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| anyhow!("Forneça --client-id ou defina POPUPARCHIVE_CLIENT_ID"))?;

    let mut config = ClientConfig::new(client_id, cli.client_secret.clone().unwrap_or_default())
        .with_domain(cli.domain.clone());
    config.redirect_uri = cli.redirect_uri.clone();

    if let Some(token) = cli.token.clone().filter(|token| !token.is_empty()) {
        config = config.with_access_token(token);
    }

    if let Some(key) = &cli.response_format {
        config = config.with_response_format(Some(ResponseFormat::from_key(key)?));
    }

    ApiClient::from_config(config).context("Falha ao criar o cliente")
}

/// Converte `chave=valor` em parâmetros de query, na ordem recebida
fn parse_params(raw: &[String]) -> anyhow::Result<QueryParams> {
    raw.iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(key, value)| (key.trim().to_string(), value.to_string()))
                .ok_or_else(|| anyhow!("Parâmetro inválido (use chave=valor): {}", pair))
        })
        .collect()
}

fn token_response(exchange: popuparchive::ApiResult<TokenExchange>) -> CliResponse {
    match exchange {
        Ok(TokenExchange::Issued(response)) => match serde_json::to_value(&response) {
            Ok(data) => CliResponse::success(data),
            Err(e) => CliResponse::error(e.to_string()),
        },
        Ok(TokenExchange::NotIssued { response }) => {
            CliResponse::error(format!("Nenhum access token emitido: {}", response))
        }
        Err(e) => CliResponse::error(describe_error(&e)),
    }
}

fn describe_error(error: &popuparchive::ApiError) -> String {
    match error.http_body() {
        Some(body) if !body.is_empty() => format!("{} {}", error, body),
        _ => error.to_string(),
    }
}

/// Respostas JSON são repassadas como estão; o resto vira string
fn body_to_value(body: String) -> Value {
    serde_json::from_str(&body).unwrap_or(Value::String(body))
}

fn output_response(response: CliResponse, format: &OutputFormat) {
    match format {
        OutputFormat::Json => match serde_json::to_string(&response) {
            Ok(line) => println!("{}", line),
            Err(e) => eprintln!("❌ Erro ao serializar resposta: {}", e),
        },
        OutputFormat::Pretty => {
            if response.success {
                if let Some(data) = response.data {
                    println!("✅ Sucesso!");
                    match serde_json::to_string_pretty(&data) {
                        Ok(pretty) => println!("{}", pretty),
                        Err(_) => println!("{}", data),
                    }
                }
            } else if let Some(error) = response.error {
                eprintln!("❌ Erro: {}", error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_params_keeps_order() {
        let params = parse_params(&["page=2".to_string(), "q=a=b".to_string()]).unwrap();
        let pairs: Vec<_> = params.iter().collect();
        assert_eq!(pairs.len(), 2);
        assert_eq!(params.get_index(0).map(|(k, v)| (k.as_str(), v.as_str())), Some(("page", "2")));
        assert_eq!(params.get("q").map(String::as_str), Some("a=b"));

        assert!(parse_params(&["sem-igual".to_string()]).is_err());
    }

    #[test]
    fn test_body_to_value() {
        assert_eq!(body_to_value("{\"a\":1}".to_string()), json!({"a": 1}));
        assert_eq!(body_to_value("plain".to_string()), json!("plain"));
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_cli_reads_flags_from_env_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(".env"),
            "POPUPARCHIVE_CLIENT_ID=from-file\nPOPUPARCHIVE_ACCESS_TOKEN=tok-file\n",
        )
        .unwrap();

        temp_env::with_vars_unset(["POPUPARCHIVE_CLIENT_ID", "POPUPARCHIVE_ACCESS_TOKEN"], || {
            assert!(load_env_file(dir.path()).unwrap());

            let cli = Cli::try_parse_from(["popuparchive", "collections"]).unwrap();
            assert_eq!(cli.client_id.as_deref(), Some("from-file"));
            assert_eq!(cli.token.as_deref(), Some("tok-file"));

            let client = build_client(&cli).unwrap();
            assert_eq!(client.current_access_token().as_deref(), Some("tok-file"));
        });
    }

    #[test]
    fn test_cli_parses_resource_command() {
        let cli = Cli::try_parse_from([
            "popuparchive",
            "--client-id",
            "abc",
            "-p",
            "page=2",
            "item",
            "-c",
            "7",
            "-i",
            "99",
        ])
        .unwrap();

        assert_eq!(cli.client_id.as_deref(), Some("abc"));
        assert_eq!(cli.params, vec!["page=2"]);
        assert!(matches!(cli.command, Commands::Item { .. }));
    }
}
