//! A multi-agent pipeline that routes a question between role-specialized
//! models until an answer is approved.
//!
//! A supervisor dispatches the question to an enhancer, a researcher or a
//! coder; a validator judges every answer and either ends the run or sends
//! it back to the supervisor. The crate includes a CLI tool for using in the
//! terminal, and the [`Workflow`] can be embedded in host apps as well.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

pub mod config;
mod conversation;
mod graph;
mod roles;
pub mod tools;
mod workflow;

pub use conversation::{Conversation, Message, Origin};
pub use graph::{Node, RoutingDecision, Step, SupervisorRoute, ValidatorRoute};
pub use roles::{Enhancer, Router, Specialist, Supervisor, Validator, Worker};
pub use workflow::{
    Nodes, RunError, RunOutcome, Transition, Workflow, WorkflowBuilder,
};

/// Re-exports of [`nexus_core`] crate.
pub mod core {
    pub use nexus_core::*;
}
