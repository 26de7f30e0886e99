//! Stable exit codes for fuzzgen CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid configuration, or the run aborted on a fatal error.
pub const INVALID: i32 = 1;
/// A unit still failed validation after its repair budget was spent.
pub const EXHAUSTED: i32 = 3;
