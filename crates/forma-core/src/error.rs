use thiserror::Error;

/// Top-level error type for Forma.
#[derive(Debug, Error)]
pub enum FormaError {
    /// Error from an AI provider.
    #[error("provider error: {0}")]
    Provider(String),

    /// Quota or rate-limit rejection from a provider. Distinguished from
    /// [`FormaError::Provider`] because the classifier cascade retries the
    /// same model on this variant and advances on everything else.
    #[error("provider rate limited: {0}")]
    RateLimited(String),

    /// Error from a messaging channel.
    #[error("channel error: {0}")]
    Channel(String),

    /// Memory/storage error.
    #[error("memory error: {0}")]
    Memory(String),

    /// An inbound event could not be matched to an identity and carried no
    /// durable id to create one. Surfaced at the ingress boundary.
    #[error("identity resolution failed: {0}")]
    Identity(String),

    /// A call to an external action collaborator (e.g. the program
    /// management service) failed. Reported to the user as a deferred
    /// follow-up, never left silent.
    #[error("external action failed: {0}")]
    ExternalAction(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
