//! I/O helpers for the generation loop.

pub mod artifact;
pub mod client;
pub mod config;
pub mod process;
pub mod prompt;
pub mod validator;
