//! Core logic shared by every role: the model client, structured replies,
//! retries, tool execution and the tool-calling agent loop.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod agent;
mod error;
mod model_client;
pub mod retry;
mod structured;
pub mod tool;

pub use agent::{
    Agent, AgentBuilder, AgentEvent, AgentOutput, DEFAULT_MAX_ITERATIONS,
};
pub use error::Error;
pub use model_client::{ModelClient, ModelClientResponse};
pub use retry::RetryPolicy;
pub use structured::StructuredOutput;
