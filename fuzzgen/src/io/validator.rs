//! Validator abstraction for checking persisted artifacts.
//!
//! The [`Validator`] trait keeps the orchestrator independent of how artifacts
//! are checked. [`CommandValidator`] spawns an external compiler front end;
//! tests use scripted validators that never spawn processes.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use anyhow::{Result, anyhow};
use tracing::{debug, instrument, warn};

use crate::core::types::ValidationOutcome;
use crate::io::config::ValidatorConfig;
use crate::io::process::run_command_with_timeout;

/// Placeholder replaced by the artifact path in a validator command.
pub const ARTIFACT_PLACEHOLDER: &str = "{artifact}";

pub trait Validator {
    /// Check the artifact at `artifact`.
    ///
    /// `Ok(Fail)` means the tool ran and reported a problem. `Err` means the
    /// tool itself could not run to completion.
    fn validate(&self, artifact: &Path) -> Result<ValidationOutcome>;
}

/// Validator that runs a configured command (`crytic-compile <artifact> --ignore-compile` by default).
#[derive(Debug, Clone)]
pub struct CommandValidator {
    command: Vec<String>,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl CommandValidator {
    pub fn new(command: Vec<String>, timeout: Duration, output_limit_bytes: usize) -> Self {
        Self {
            command,
            timeout,
            output_limit_bytes,
        }
    }

    pub fn from_config(config: &ValidatorConfig) -> Self {
        Self::new(
            config.command.clone(),
            Duration::from_secs(config.timeout_secs),
            config.output_limit_bytes,
        )
    }

    fn build_command(&self, artifact: &Path) -> Result<Command> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| anyhow!("validator command is empty"))?;
        let mut cmd = Command::new(program);
        let artifact_arg = artifact.to_string_lossy();
        let mut substituted = false;
        for arg in args {
            if arg.contains(ARTIFACT_PLACEHOLDER) {
                substituted = true;
                cmd.arg(arg.replace(ARTIFACT_PLACEHOLDER, &artifact_arg));
            } else {
                cmd.arg(arg);
            }
        }
        if !substituted {
            cmd.arg(artifact);
        }
        Ok(cmd)
    }
}

impl Validator for CommandValidator {
    #[instrument(skip_all, fields(artifact = %artifact.display()))]
    fn validate(&self, artifact: &Path) -> Result<ValidationOutcome> {
        let cmd = self.build_command(artifact)?;
        let output = run_command_with_timeout(cmd, self.timeout, self.output_limit_bytes)?;

        if output.timed_out {
            return Err(anyhow!("validator timed out after {:?}", self.timeout));
        }
        if output.status.success() {
            debug!("artifact passed validation");
            return Ok(ValidationOutcome::Pass);
        }
        let Some(code) = output.status.code() else {
            return Err(anyhow!("validator terminated by signal"));
        };

        let stderr = output.stderr_lossy();
        let diagnostic = if stderr.trim().is_empty() {
            output.stdout_lossy()
        } else {
            stderr
        };
        warn!(exit_code = code, "artifact failed validation");
        Ok(ValidationOutcome::Fail { diagnostic })
    }
}
