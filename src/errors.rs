/// Domain-specific error types for the query pipeline.
/// Every stage fails fast with one of these. The pipeline must:
/// - Never hand a simulation result back for inputs it could not validate
/// - Never surface a raw error chain to the end user (see `user_message`)
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("could not extract symbol, strike and target date from the question")]
    Unparseable,

    #[error("malformed language service response: {0}")]
    MalformedResponse(String),

    #[error("market data unavailable: {0}")]
    DataUnavailable(String),

    #[error("target date must be in the future (got {days} calendar days)")]
    InvalidHorizon { days: i64 },

    #[error("invalid simulation input: {0}")]
    InvalidInput(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("upstream API error: {status} {body}")]
    UpstreamApi { status: u16, body: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("simulation task failed: {0}")]
    Task(String),
}

/// Shown whenever the question itself could not be turned into parameters.
pub const CANNOT_UNDERSTAND: &str =
    "Could not understand your question. Try naming the asset, the target price and the date.";

impl AgentError {
    /// Transient failures worth another attempt: transport errors, throttling
    /// and upstream 5xx.
    pub fn is_retryable(&self) -> bool {
        match self {
            AgentError::Network(_) => true,
            AgentError::UpstreamApi { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Single human-readable line for the end user.
    pub fn user_message(&self) -> String {
        match self {
            AgentError::Unparseable | AgentError::MalformedResponse(_) => {
                CANNOT_UNDERSTAND.to_string()
            }
            AgentError::DataUnavailable(_) | AgentError::InvalidHorizon { .. } => {
                format!("Error: {self}")
            }
            AgentError::Network(_) | AgentError::UpstreamApi { .. } => {
                "Error: an upstream service is unavailable, please try again later.".to_string()
            }
            _ => "Error: the calculation could not be completed.".to_string(),
        }
    }
}

impl From<reqwest::Error> for AgentError {
    fn from(e: reqwest::Error) -> Self {
        AgentError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(e: serde_json::Error) -> Self {
        AgentError::Parse(e.to_string())
    }
}

pub type AgentResult<T> = Result<T, AgentError>;
