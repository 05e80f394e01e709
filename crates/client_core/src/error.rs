use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("voice agent endpoint is empty")]
    EmptyEndpoint,
    #[error("invalid voice agent endpoint {endpoint:?}: {source}")]
    InvalidEndpoint {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },
    #[error("endpoint scheme {0:?} is not supported; use ws://, wss://, http:// or https://")]
    UnsupportedScheme(String),
    #[error("unknown field policy {0:?}; expected store, ignore or reject")]
    UnknownPolicy(String),
}
