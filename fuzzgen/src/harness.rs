//! Generate, validate, repair loop over a list of source units.
//!
//! Each unit moves through [`UnitStage`]s in order:
//!
//! ```text
//! EnsureArtifact -> Generate -> Persist -> Validate -> Done
//!                                  ^           |
//!                                  +- Repair <-+
//! ```
//!
//! Units are driven strictly one after another. Any collaborator failure aborts
//! the whole run; a validation diagnostic only triggers the next repair.

use std::path::Path;

use tracing::{debug, info, trace, warn};

use crate::core::conversation::{Conversation, HistoryScope, Message};
use crate::core::naming::{
    DEFAULT_ARTIFACT_SUFFIX, DEFAULT_TEST_UNIT_SUFFIX, companion_path, test_unit_name,
};
use crate::core::types::{RunOutcome, SourceUnit, UnitOutcome, ValidationOutcome};
use crate::error::HarnessError;
use crate::io::artifact;
use crate::io::client::GenerativeClient;
use crate::io::prompt::{GenerationRequest, build_generation_request, build_repair_request};
use crate::io::validator::Validator;

/// Stages a unit passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitStage {
    EnsureArtifact,
    Generate,
    Persist,
    Validate,
    Repair,
    Done,
}

/// Knobs for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub artifact_suffix: String,
    pub test_unit_suffix: String,
    /// Repairs allowed per unit; validation failing after this many ends the run.
    pub max_repair_attempts: u32,
    pub history_scope: HistoryScope,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            artifact_suffix: DEFAULT_ARTIFACT_SUFFIX.to_string(),
            test_unit_suffix: DEFAULT_TEST_UNIT_SUFFIX.to_string(),
            max_repair_attempts: 10,
            history_scope: HistoryScope::Shared,
        }
    }
}

/// Drives source units through generation and repair, owning the conversation.
pub struct Harness<'a, C: GenerativeClient, V: Validator> {
    client: &'a C,
    validator: &'a V,
    settings: RunSettings,
    seed: Vec<Message>,
    conversation: Conversation,
}

impl<'a, C: GenerativeClient, V: Validator> Harness<'a, C, V> {
    pub fn new(client: &'a C, validator: &'a V, settings: RunSettings, seed: Vec<Message>) -> Self {
        let conversation = Conversation::new(seed.clone());
        Self {
            client,
            validator,
            settings,
            seed,
            conversation,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn into_conversation(self) -> Conversation {
        self.conversation
    }

    /// Drive every unit in order, calling `on_unit` after each one is done.
    ///
    /// Stops at the first error; units after the failing one are not touched.
    pub fn run<F: FnMut(&UnitOutcome)>(
        &mut self,
        units: &[SourceUnit],
        mut on_unit: F,
    ) -> Result<RunOutcome, HarnessError> {
        info!(units = units.len(), "generating fuzzing harnesses");
        let mut outcomes = Vec::with_capacity(units.len());
        for unit in units {
            let outcome = self.drive_unit(unit)?;
            on_unit(&outcome);
            outcomes.push(outcome);
        }
        Ok(RunOutcome {
            units: outcomes,
            history_len: self.conversation.len(),
        })
    }

    /// Drive a single unit until its artifact passes validation.
    pub fn drive_unit(&mut self, unit: &SourceUnit) -> Result<UnitOutcome, HarnessError> {
        if self.settings.history_scope == HistoryScope::PerUnit {
            self.conversation = Conversation::new(self.seed.clone());
        }
        let artifact_path = companion_path(&unit.source_path, &self.settings.artifact_suffix);
        info!(unit = %unit.name, artifact = %artifact_path.display(), "generating fuzzing harness");

        self.enter(unit, UnitStage::EnsureArtifact);
        let created = artifact::ensure_exists(&artifact_path)?;

        self.enter(unit, UnitStage::Generate);
        let source_content = artifact::read(&unit.source_path)?;
        let artifact_content = artifact::read(&artifact_path)?;
        let test_unit = test_unit_name(&unit.name, &self.settings.test_unit_suffix);
        let prompt = build_generation_request(&GenerationRequest {
            source_path: &unit.source_path,
            artifact_path: &artifact_path,
            source_content: &source_content,
            artifact_content: &artifact_content,
            source_unit_name: &unit.name,
            test_unit_name: &test_unit,
        });
        let mut response = self.exchange(prompt)?;

        let mut repairs = 0u32;
        loop {
            self.enter(unit, UnitStage::Persist);
            artifact::write(&artifact_path, &response)?;

            self.enter(unit, UnitStage::Validate);
            let diagnostic = match self.validate(&artifact_path)? {
                ValidationOutcome::Pass => break,
                ValidationOutcome::Fail { diagnostic } => diagnostic,
            };
            if repairs >= self.settings.max_repair_attempts {
                warn!(unit = %unit.name, repairs, "repair budget exhausted");
                return Err(HarnessError::RepairBudgetExhausted {
                    unit: unit.name.clone(),
                    attempts: repairs,
                    diagnostic,
                });
            }

            repairs += 1;
            warn!(
                unit = %unit.name,
                attempt = repairs,
                %diagnostic,
                "regenerating harness due to validation error"
            );
            self.enter(unit, UnitStage::Repair);
            response = self.exchange(build_repair_request(&diagnostic))?;
        }

        self.enter(unit, UnitStage::Done);
        info!(unit = %unit.name, repairs, "generated fuzzing harness");
        Ok(UnitOutcome {
            name: unit.name.clone(),
            artifact_path,
            created,
            repairs,
        })
    }

    /// Append `prompt`, ask the client with the full history, append its reply.
    fn exchange(&mut self, prompt: String) -> Result<String, HarnessError> {
        self.conversation.append(Message::user(prompt));
        let response = self
            .client
            .complete(self.conversation.snapshot())
            .map_err(|err| HarnessError::Service(err.into()))?;
        debug!(bytes = response.len(), history = self.conversation.len() + 1, "received response");
        trace!(%response, "response body");
        self.conversation.append(Message::system(response.clone()));
        Ok(response)
    }

    fn validate(&self, artifact_path: &Path) -> Result<ValidationOutcome, HarnessError> {
        self.validator
            .validate(artifact_path)
            .map_err(|err| HarnessError::ToolExecution {
                path: artifact_path.to_path_buf(),
                source: err.into(),
            })
    }

    fn enter(&self, unit: &SourceUnit, stage: UnitStage) {
        debug!(unit = %unit.name, ?stage, "entering stage");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::conversation::Role;
    use crate::test_support::{ScriptedClient, ScriptedValidator, TempProject};

    fn seed() -> Vec<Message> {
        vec![Message::system("seed one"), Message::system("seed two")]
    }

    #[test]
    fn first_pass_success_makes_one_call_each() {
        let project = TempProject::new().expect("project");
        let unit = project
            .source("Deposit", "Deposit.sol", "contract Deposit {}")
            .expect("source");
        let client = ScriptedClient::replies(["contract DepositTest {}"]);
        let validator = ScriptedValidator::always_pass();

        let mut harness = Harness::new(&client, &validator, RunSettings::default(), seed());
        let outcome = harness.drive_unit(&unit).expect("drive");

        assert_eq!(outcome.repairs, 0);
        assert!(outcome.created);
        assert_eq!(client.calls(), 1);
        assert_eq!(validator.calls(), vec![project.path().join("Deposit_fuzz.sol")]);
        assert_eq!(
            project.read("Deposit_fuzz.sol").expect("read"),
            "contract DepositTest {}"
        );
    }

    #[test]
    fn generation_prompt_sees_existing_artifact_content() {
        let project = TempProject::new().expect("project");
        let unit = project
            .source("Vault", "Vault.sol", "contract Vault {}")
            .expect("source");
        project
            .write("Vault_fuzz.sol", "contract VaultTest { function testA() public {} }")
            .expect("existing artifact");
        let client = ScriptedClient::replies(["contract VaultTest {}"]);
        let validator = ScriptedValidator::always_pass();

        let mut harness = Harness::new(&client, &validator, RunSettings::default(), seed());
        let outcome = harness.drive_unit(&unit).expect("drive");

        assert!(!outcome.created);
        let request = client.request(0).expect("first request");
        let prompt = &request.last().expect("prompt").content;
        assert!(prompt.contains("contract VaultTest { function testA() public {} }"));
        assert!(prompt.contains("contract Vault {}"));
    }

    #[test]
    fn repair_requests_carry_diagnostic_and_replace_artifact() {
        let project = TempProject::new().expect("project");
        let unit = project
            .source("Deposit", "Deposit.sol", "contract Deposit {}")
            .expect("source");
        let client = ScriptedClient::replies(["broken", "fixed"]);
        let validator = ScriptedValidator::new(vec![ValidationOutcome::Fail {
            diagnostic: "ParserError: Expected ';'".to_string(),
        }]);

        let mut harness = Harness::new(&client, &validator, RunSettings::default(), seed());
        let outcome = harness.drive_unit(&unit).expect("drive");

        assert_eq!(outcome.repairs, 1);
        assert_eq!(project.read("Deposit_fuzz.sol").expect("read"), "fixed");
        let repair = client.request(1).expect("repair request");
        let prompt = repair.last().expect("prompt");
        assert_eq!(prompt.role, Role::User);
        assert!(prompt.content.contains("'''ParserError: Expected ';''''"));
        assert!(!prompt.content.contains("contract Deposit {}"));
    }

    #[test]
    fn responses_are_appended_as_system_messages() {
        let project = TempProject::new().expect("project");
        let unit = project
            .source("Deposit", "Deposit.sol", "contract Deposit {}")
            .expect("source");
        let client = ScriptedClient::replies(["contract DepositTest {}"]);
        let validator = ScriptedValidator::always_pass();

        let mut harness = Harness::new(&client, &validator, RunSettings::default(), seed());
        harness.drive_unit(&unit).expect("drive");

        let history = harness.conversation().snapshot();
        assert_eq!(history.len(), 4);
        assert_eq!(history[2].role, Role::User);
        assert_eq!(history[3], Message::system("contract DepositTest {}"));
    }

    #[test]
    fn exhausted_repair_budget_is_a_typed_error() {
        let project = TempProject::new().expect("project");
        let unit = project
            .source("Deposit", "Deposit.sol", "contract Deposit {}")
            .expect("source");
        let client = ScriptedClient::replies(["bad", "still bad"]);
        let validator = ScriptedValidator::new(vec![
            ValidationOutcome::Fail {
                diagnostic: "first".to_string(),
            },
            ValidationOutcome::Fail {
                diagnostic: "second".to_string(),
            },
        ]);
        let settings = RunSettings {
            max_repair_attempts: 1,
            ..RunSettings::default()
        };

        let mut harness = Harness::new(&client, &validator, settings, seed());
        let err = harness.drive_unit(&unit).unwrap_err();

        match err {
            HarnessError::RepairBudgetExhausted {
                unit,
                attempts,
                diagnostic,
            } => {
                assert_eq!(unit, "Deposit");
                assert_eq!(attempts, 1);
                assert_eq!(diagnostic, "second");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(client.calls(), 2);
        assert_eq!(validator.calls().len(), 2);
        assert_eq!(project.read("Deposit_fuzz.sol").expect("read"), "still bad");
    }

    #[test]
    fn validator_failure_to_run_aborts() {
        let project = TempProject::new().expect("project");
        let unit = project
            .source("Deposit", "Deposit.sol", "contract Deposit {}")
            .expect("source");
        let client = ScriptedClient::replies(["contract DepositTest {}"]);
        let validator = ScriptedValidator::failing("crytic-compile: command not found");

        let mut harness = Harness::new(&client, &validator, RunSettings::default(), seed());
        let err = harness.drive_unit(&unit).unwrap_err();

        assert!(matches!(err, HarnessError::ToolExecution { .. }));
        assert_eq!(client.calls(), 1);
    }

    #[test]
    fn missing_source_is_not_found_after_artifact_is_ensured() {
        let project = TempProject::new().expect("project");
        let unit = SourceUnit::new("Ghost", project.path().join("Ghost.sol"));
        let client = ScriptedClient::replies(Vec::<String>::new());
        let validator = ScriptedValidator::always_pass();

        let mut harness = Harness::new(&client, &validator, RunSettings::default(), seed());
        let err = harness.drive_unit(&unit).unwrap_err();

        assert!(matches!(err, HarnessError::NotFound { .. }));
        assert!(project.path().join("Ghost_fuzz.sol").exists());
        assert_eq!(client.calls(), 0);
    }

    #[test]
    fn per_unit_scope_starts_each_unit_from_seed() {
        let project = TempProject::new().expect("project");
        let units = vec![
            project
                .source("A", "A.sol", "contract A {}")
                .expect("source a"),
            project
                .source("B", "B.sol", "contract B {}")
                .expect("source b"),
        ];
        let client = ScriptedClient::replies(["contract ATest {}", "contract BTest {}"]);
        let validator = ScriptedValidator::always_pass();
        let settings = RunSettings {
            history_scope: HistoryScope::PerUnit,
            ..RunSettings::default()
        };

        let mut harness = Harness::new(&client, &validator, settings, seed());
        let outcome = harness.run(&units, |_| {}).expect("run");

        assert_eq!(client.request(1).expect("second request").len(), 3);
        assert_eq!(outcome.history_len, 4);
    }
}
