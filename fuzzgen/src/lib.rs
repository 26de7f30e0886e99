//! LLM-driven fuzz harness generator.
//!
//! For every source unit the harness makes sure a companion test artifact
//! exists, asks a generative service to add an invariant test to it, and keeps
//! feeding validator diagnostics back until the artifact compiles.
//!
//! - **[`core`]**: Pure logic (artifact naming, conversation history, plain types).
//! - **[`io`]**: Side-effecting operations (filesystem, HTTP, validator processes).
//!
//! [`harness`] coordinates the two to implement the generate, validate, repair loop.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod harness;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
