//! Request text for the generative service.
//!
//! Generation and repair requests are rendered from embedded markdown templates.
//! Field values are interpolated verbatim; nothing is validated or trimmed.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use tracing::debug;

use crate::core::conversation::Message;

const GENERATE_TEMPLATE: &str = include_str!("prompts/generate.md");
const REPAIR_TEMPLATE: &str = include_str!("prompts/repair.md");

const SEED_FUZZER: &str = include_str!("prompts/seed_fuzzer.md");
const SEED_ROLE: &str = include_str!("prompts/seed_role.md");
const SEED_EXAMINE: &str = include_str!("prompts/seed_examine.md");
const SEED_NOTES: &str = include_str!("prompts/seed_notes.md");

/// Everything a generation request embeds.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub source_path: &'a Path,
    pub artifact_path: &'a Path,
    pub source_content: &'a str,
    pub artifact_content: &'a str,
    pub source_unit_name: &'a str,
    pub test_unit_name: &'a str,
}

/// Template engine wrapper around minijinja.
struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("generate", GENERATE_TEMPLATE)
            .expect("generate template should be valid");
        env.add_template("repair", REPAIR_TEMPLATE)
            .expect("repair template should be valid");
        Self { env }
    }

    fn render_generate(&self, request: &GenerationRequest<'_>) -> Result<String> {
        let template = self.env.get_template("generate")?;
        let rendered = template.render(context! {
            source_path => request.source_path.display().to_string(),
            artifact_path => request.artifact_path.display().to_string(),
            source_content => request.source_content,
            artifact_content => request.artifact_content,
            source_unit_name => request.source_unit_name,
            test_unit_name => request.test_unit_name,
        })?;
        Ok(rendered)
    }

    fn render_repair(&self, diagnostic: &str) -> Result<String> {
        let template = self.env.get_template("repair")?;
        let rendered = template.render(context! { diagnostic => diagnostic })?;
        Ok(rendered)
    }
}

/// Build the request asking for a harness with one more invariant test.
pub fn build_generation_request(request: &GenerationRequest<'_>) -> String {
    PromptEngine::new()
        .render_generate(request)
        .expect("generate template rendering should not fail")
}

/// Build the request asking to fix `diagnostic` without changing the set of tests.
pub fn build_repair_request(diagnostic: &str) -> String {
    PromptEngine::new()
        .render_repair(diagnostic)
        .expect("repair template rendering should not fail")
}

/// Fixed instructional messages every conversation starts from.
pub fn builtin_seed() -> Vec<Message> {
    [SEED_FUZZER, SEED_ROLE, SEED_EXAMINE, SEED_NOTES]
        .into_iter()
        .map(|content| Message::system(content.trim()))
        .collect()
}

/// Read each file as one additional system message, in order.
pub fn load_seed_files(paths: &[PathBuf]) -> Result<Vec<Message>> {
    paths
        .iter()
        .map(|path| {
            debug!(path = %path.display(), "loading seed message");
            fs::read_to_string(path)
                .map(Message::system)
                .with_context(|| format!("read seed file {}", path.display()))
        })
        .collect()
}
