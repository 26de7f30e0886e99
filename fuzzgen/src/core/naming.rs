//! Naming conventions for companion test artifacts.

use std::path::{Path, PathBuf};

pub const DEFAULT_ARTIFACT_SUFFIX: &str = "_fuzz";
pub const DEFAULT_TEST_UNIT_SUFFIX: &str = "Test";

/// Return the companion artifact path for `source`.
///
/// The companion lives in the same directory and keeps the extension; only the
/// file stem gains `suffix` (`dir/Foo.sol` -> `dir/Foo_fuzz.sol`). Only the last
/// extension counts, and a leading-dot name like `.env` has no extension.
pub fn companion_path(source: &Path, suffix: &str) -> PathBuf {
    let Some(file_name) = source.file_name() else {
        return source.to_path_buf();
    };
    let stem = source.file_stem().unwrap_or(file_name).to_string_lossy();
    let companion = match source.extension() {
        Some(ext) => format!("{stem}{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}{suffix}"),
    };
    source.with_file_name(companion)
}

/// Name of the test construct generated for `unit_name` (`Deposit` -> `DepositTest`).
pub fn test_unit_name(unit_name: &str, suffix: &str) -> String {
    format!("{unit_name}{suffix}")
}
