//! Tabelas fixas de formatos: `Accept` da resposta e MIME types de áudio

use std::fmt;
use std::str::FromStr;

use crate::error::{ApiError, ApiResult};

/// Formato de resposta solicitado via header `Accept`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseFormat {
    /// `*` => `*/*`
    Any,
    /// `json` => `application/json`
    Json,
}

impl ResponseFormat {
    pub const ALL: [ResponseFormat; 2] = [ResponseFormat::Any, ResponseFormat::Json];

    /// Resolve a chave da tabela (`*` ou `json`)
    pub fn from_key(key: &str) -> ApiResult<Self> {
        Self::ALL
            .into_iter()
            .find(|format| format.key() == key)
            .ok_or_else(|| ApiError::UnsupportedResponseFormat(key.to_string()))
    }

    pub fn key(&self) -> &'static str {
        match self {
            Self::Any => "*",
            Self::Json => "json",
        }
    }

    /// Valor enviado no header `Accept`
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Any => "*/*",
            Self::Json => "application/json",
        }
    }
}

impl Default for ResponseFormat {
    fn default() -> Self {
        Self::Json
    }
}

impl FromStr for ResponseFormat {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_key(s)
    }
}

impl fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_type())
    }
}

/// Formatos de áudio aceitos pelo serviço, indexados pela extensão do arquivo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioFormat {
    Aac,
    Aiff,
    Flac,
    Mp3,
    Ogg,
    Wav,
}

impl AudioFormat {
    pub const ALL: [AudioFormat; 6] = [
        AudioFormat::Aac,
        AudioFormat::Aiff,
        AudioFormat::Flac,
        AudioFormat::Mp3,
        AudioFormat::Ogg,
        AudioFormat::Wav,
    ];

    pub fn from_extension(extension: &str) -> ApiResult<Self> {
        Self::ALL
            .into_iter()
            .find(|format| format.extension() == extension)
            .ok_or_else(|| ApiError::UnsupportedAudioFormat(extension.to_string()))
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Aac => "aac",
            Self::Aiff => "aiff",
            Self::Flac => "flac",
            Self::Mp3 => "mp3",
            Self::Ogg => "ogg",
            Self::Wav => "wav",
        }
    }

    // aac é servido como container mp4 pelo serviço
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Aac => "video/mp4",
            Self::Aiff => "audio/x-aiff",
            Self::Flac => "audio/flac",
            Self::Mp3 => "audio/mpeg",
            Self::Ogg => "audio/ogg",
            Self::Wav => "audio/x-wav",
        }
    }
}

/// Obtém o MIME type para uma extensão de arquivo de áudio
///
/// # Retorno
/// - `Ok(&str)`: MIME type da extensão
/// - `Err(ApiError::UnsupportedAudioFormat)`: extensão desconhecida
pub fn audio_mime_type(extension: &str) -> ApiResult<&'static str> {
    AudioFormat::from_extension(extension).map(|format| format.mime_type())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_format_table() {
        assert_eq!(ResponseFormat::from_key("*").unwrap().mime_type(), "*/*");
        assert_eq!(ResponseFormat::from_key("json").unwrap().mime_type(), "application/json");
        assert_eq!(ResponseFormat::default(), ResponseFormat::Json);
    }

    #[test]
    fn test_unsupported_response_format() {
        let result = "xml".parse::<ResponseFormat>();
        assert!(matches!(result, Err(ApiError::UnsupportedResponseFormat(key)) if key == "xml"));

        // As chaves são os nomes curtos, não os MIME types
        assert!(ResponseFormat::from_key("application/json").is_err());
    }

    #[test]
    fn test_audio_mime_types() {
        assert_eq!(audio_mime_type("mp3").unwrap(), "audio/mpeg");
        assert_eq!(audio_mime_type("wav").unwrap(), "audio/x-wav");
        assert_eq!(audio_mime_type("aac").unwrap(), "video/mp4");
        assert_eq!(audio_mime_type("flac").unwrap(), "audio/flac");
    }

    #[test]
    fn test_unsupported_audio_format() {
        let result = audio_mime_type("xyz");
        assert!(matches!(result, Err(ApiError::UnsupportedAudioFormat(ext)) if ext == "xyz"));

        // Lookup é sensível a maiúsculas
        assert!(audio_mime_type("MP3").is_err());
    }
}
