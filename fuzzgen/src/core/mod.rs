//! Deterministic, pure logic shared by the generation loop.
//!
//! Core modules must be free of I/O side effects.

pub mod conversation;
pub mod naming;
pub mod types;
