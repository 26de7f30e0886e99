//! Test-only doubles for the generative service and the validator.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use crate::core::conversation::Message;
use crate::core::types::{SourceUnit, ValidationOutcome};
use crate::io::client::GenerativeClient;
use crate::io::validator::Validator;

/// One scripted client reply.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Content(String),
    Error(String),
}

/// Client that returns queued replies and records every history it was sent.
///
/// Once the script is exhausted every call fails.
#[derive(Debug, Default)]
pub struct ScriptedClient {
    replies: RefCell<VecDeque<ScriptedReply>>,
    requests: RefCell<Vec<Vec<Message>>>,
}

impl ScriptedClient {
    pub fn new(replies: Vec<ScriptedReply>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            requests: RefCell::new(Vec::new()),
        }
    }

    /// Client whose replies all succeed.
    pub fn replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            replies
                .into_iter()
                .map(|reply| ScriptedReply::Content(reply.into()))
                .collect(),
        )
    }

    pub fn calls(&self) -> usize {
        self.requests.borrow().len()
    }

    /// History snapshot sent with the `index`-th call.
    pub fn request(&self, index: usize) -> Option<Vec<Message>> {
        self.requests.borrow().get(index).cloned()
    }
}

impl GenerativeClient for ScriptedClient {
    fn complete(&self, history: &[Message]) -> Result<String> {
        self.requests.borrow_mut().push(history.to_vec());
        match self.replies.borrow_mut().pop_front() {
            Some(ScriptedReply::Content(content)) => Ok(content),
            Some(ScriptedReply::Error(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("scripted client has no reply left")),
        }
    }
}

/// Validator that returns queued outcomes, then passes.
#[derive(Debug, Default)]
pub struct ScriptedValidator {
    outcomes: RefCell<VecDeque<ValidationOutcome>>,
    tool_error: Option<String>,
    calls: RefCell<Vec<PathBuf>>,
}

impl ScriptedValidator {
    pub fn new(outcomes: Vec<ValidationOutcome>) -> Self {
        Self {
            outcomes: RefCell::new(outcomes.into()),
            ..Self::default()
        }
    }

    pub fn always_pass() -> Self {
        Self::default()
    }

    /// Fail `times` times with numbered diagnostics, then pass.
    pub fn fail_times(times: usize) -> Self {
        Self::new(
            (1..=times)
                .map(|n| ValidationOutcome::Fail {
                    diagnostic: format!("Error {n}: compilation failed"),
                })
                .collect(),
        )
    }

    /// Validator whose tool never runs.
    pub fn failing(message: &str) -> Self {
        Self {
            tool_error: Some(message.to_string()),
            ..Self::default()
        }
    }

    /// Artifact paths validated so far, in call order.
    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.borrow().clone()
    }
}

impl Validator for ScriptedValidator {
    fn validate(&self, artifact: &Path) -> Result<ValidationOutcome> {
        self.calls.borrow_mut().push(artifact.to_path_buf());
        if let Some(message) = &self.tool_error {
            return Err(anyhow!("{message}"));
        }
        Ok(self
            .outcomes
            .borrow_mut()
            .pop_front()
            .unwrap_or(ValidationOutcome::Pass))
    }
}

/// Temporary directory holding source units for a test.
pub struct TempProject {
    dir: tempfile::TempDir,
}

impl TempProject {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create temp project")?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a file relative to the project root.
    pub fn write(&self, relative: &str, contents: &str) -> Result<PathBuf> {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }

    pub fn read(&self, relative: &str) -> Result<String> {
        let path = self.dir.path().join(relative);
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
    }

    /// Write a source file and return the unit pointing at it.
    pub fn source(&self, name: &str, relative: &str, contents: &str) -> Result<SourceUnit> {
        let path = self.write(relative, contents)?;
        Ok(SourceUnit::new(name, path))
    }
}
