/// Failures on a single chat connection.
///
/// None of these are fatal to the relay: each one ends with the affected
/// connection being evicted from the registry.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed message: {0}")]
    Decode(String),
    #[error("failed to encode message: {0}")]
    Encode(String),
    #[error("connection closed")]
    Closed,
}

impl RelayError {
    /// Short classification string for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Decode(_) => "decode",
            Self::Encode(_) => "encode",
            Self::Closed => "closed",
        }
    }
}
