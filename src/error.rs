use thiserror::Error;

#[derive(Debug, Error)]
pub enum DigestError {
   #[error("Git command failed: {0}")]
   GitError(String),

   #[error("API request failed (HTTP {status}): {body}")]
   ApiError { status: u16, body: String },

   #[error("API call failed after {retries} retries: {source}")]
   ApiRetryExhausted {
      retries: u32,
      #[source]
      source:  Box<Self>,
   },

   #[error("Missing required credential: set {0}")]
   MissingCredential(&'static str),

   #[error("Repository path {path} is not usable: {reason}")]
   InvalidRepository { path: String, reason: String },

   #[error("Invalid configuration: {0}")]
   ConfigError(String),

   #[error("Failed to render prompt template '{name}': {reason}")]
   TemplateError { name: String, reason: String },

   #[error("Webhook delivery failed (HTTP {status})")]
   DeliveryError { status: u16 },

   #[error("JSON error: {0}")]
   JsonError(#[from] serde_json::Error),

   #[error("HTTP error: {0}")]
   HttpError(#[from] reqwest::Error),

   #[error("{0}")]
   Other(String),
}

impl DigestError {
   /// Errors that abort the run before any work starts.
   pub const fn is_fatal(&self) -> bool {
      matches!(self, Self::MissingCredential(_) | Self::InvalidRepository { .. } | Self::ConfigError(_))
   }
}

pub type Result<T> = std::result::Result<T, DigestError>;
