pub mod env;
pub mod formats;

pub use env::{load_env_file, ClientConfig};
pub use formats::{audio_mime_type, AudioFormat, ResponseFormat};
