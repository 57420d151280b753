pub mod http;

pub use http::{CarrierHttpClient, FilesystemWavStore, KokoroTtsClient, LlmHttpClient, WhisperSttTransport};
