//! Shared plain-data types for the generation loop.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A named source file to generate a test harness for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceUnit {
    pub name: String,
    pub source_path: PathBuf,
}

impl SourceUnit {
    pub fn new(name: impl Into<String>, source_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source_path: source_path.into(),
        }
    }
}

/// Result of validating a persisted artifact.
///
/// `Fail` means the validator ran and reported a problem; a validator that
/// could not run at all is an error, not an outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Pass,
    Fail { diagnostic: String },
}

/// Summary of one unit driven to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitOutcome {
    pub name: String,
    pub artifact_path: PathBuf,
    /// Whether the artifact file was created empty for this unit.
    pub created: bool,
    /// Repair cycles needed before validation passed.
    pub repairs: u32,
}

/// Summary of a full run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub units: Vec<UnitOutcome>,
    /// Conversation length when the run finished.
    pub history_len: usize,
}

impl RunOutcome {
    pub fn total_repairs(&self) -> u32 {
        self.units.iter().map(|unit| unit.repairs).sum()
    }
}
