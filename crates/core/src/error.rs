use nexus_model::ModelProviderError;
use thiserror::Error;

/// Errors surfaced by the model client and the agent loop.
#[derive(Debug, Error)]
pub enum Error {
    /// The provider failed to answer, or the response stream broke.
    #[error("model request failed: {0}")]
    Model(Box<dyn ModelProviderError>),

    /// The model answered, but not with a value of the requested shape.
    #[error("reply does not match `{name}`: {reason}")]
    Schema {
        /// Name of the expected structure.
        name: &'static str,
        /// Why the reply was rejected.
        reason: String,
        /// The raw reply text.
        reply: String,
    },

    /// The agent kept calling tools until its iteration budget ran out.
    #[error("no final answer after {0} model turns")]
    IterationsExhausted(usize),
}

impl Error {
    /// Returns `true` if repeating the failed call may succeed.
    ///
    /// Models are sampled, so a reply that failed to parse is worth asking
    /// for again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Model(err) => err.kind().is_transient(),
            Error::Schema { .. } => true,
            Error::IterationsExhausted(_) => false,
        }
    }
}
