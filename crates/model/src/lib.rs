//! The protocol spoken between the agents and the language models.
//!
//! This crate establishes an unified protocol for the pipeline to talk to
//! any supported chat model, so that roles can be wired to a different
//! backend without touching the routing code.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod error;
mod provider;
mod request;
mod response;

pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
