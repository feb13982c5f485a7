//! Operator commands: grammar, authorization and execution.
//!
//! A message whose first token is not one of the known commands is ignored
//! entirely. Known commands from operators outside the whitelist get a
//! fixed denial and nothing else happens.

mod parse;
mod router;

pub use parse::{Command, UsageError, Verb};
pub use router::{CommandRequest, CommandRouter, UNAUTHORIZED};
