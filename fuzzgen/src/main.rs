//! Generate medusa fuzz harnesses for Solidity contracts with an LLM.
//!
//! `fuzzgen generate` drives every configured contract through the generate,
//! validate, repair loop and leaves a `<Name>_fuzz.sol` harness next to it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use fuzzgen::core::types::{SourceUnit, UnitOutcome};
use fuzzgen::error::HarnessError;
use fuzzgen::exit_codes;
use fuzzgen::harness::Harness;
use fuzzgen::io::client::OpenAiClient;
use fuzzgen::io::config::{DEFAULT_CONFIG_FILE, HarnessConfig, load_config, write_config};
use fuzzgen::io::prompt::{builtin_seed, load_seed_files};
use fuzzgen::io::validator::CommandValidator;
use fuzzgen::logging;

#[derive(Parser)]
#[command(
    name = "fuzzgen",
    version,
    about = "Generate and repair fuzz test harnesses with a language model"
)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default config file if missing.
    Init {
        /// Overwrite an existing config file.
        #[arg(short, long)]
        force: bool,
    },
    /// Generate a harness for each unit, repairing until it validates.
    Generate {
        /// Units as `NAME=PATH` (or just `PATH`, named after the file stem).
        /// Defaults to `[[units]]` from the config file.
        #[arg(value_parser = parse_unit)]
        units: Vec<SourceUnit>,

        /// Override `max_repair_attempts` from the config file.
        #[arg(long)]
        max_repair_attempts: Option<u32>,
    },
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(()) => exit_codes::OK,
        Err(err) => {
            eprintln!("{:#}", err);
            match err.downcast_ref::<HarnessError>() {
                Some(HarnessError::RepairBudgetExhausted { .. }) => exit_codes::EXHAUSTED,
                _ => exit_codes::INVALID,
            }
        }
    };
    std::process::exit(code);
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { force } => cmd_init(&cli.config, force),
        Command::Generate {
            units,
            max_repair_attempts,
        } => cmd_generate(&cli.config, units, max_repair_attempts),
    }
}

fn cmd_init(config_path: &Path, force: bool) -> Result<()> {
    if !force && config_path.exists() {
        println!("{} already exists", config_path.display());
        return Ok(());
    }
    write_config(config_path, &HarnessConfig::default())
        .with_context(|| format!("write {}", config_path.display()))?;
    println!("wrote {}", config_path.display());
    Ok(())
}

fn cmd_generate(
    config_path: &Path,
    units: Vec<SourceUnit>,
    max_repair_attempts: Option<u32>,
) -> Result<()> {
    let mut cfg = load_config(config_path)?;
    if let Some(max) = max_repair_attempts {
        cfg.max_repair_attempts = max;
        cfg.validate()?;
    }
    let units = if units.is_empty() { cfg.units.clone() } else { units };
    if units.is_empty() {
        bail!(
            "no units to process (pass NAME=PATH arguments or add [[units]] to {})",
            config_path.display()
        );
    }

    let mut seed = builtin_seed();
    seed.extend(load_seed_files(&cfg.seed_files)?);

    let client = OpenAiClient::from_env(&cfg.model)?;
    let validator = CommandValidator::from_config(&cfg.validator);
    let mut harness = Harness::new(&client, &validator, cfg.run_settings(), seed);

    let outcome = harness.run(&units, print_unit)?;
    println!(
        "generated {} harness(es) with {} repair(s)",
        outcome.units.len(),
        outcome.total_repairs()
    );
    Ok(())
}

fn print_unit(unit: &UnitOutcome) {
    println!(
        "{}\t{}\trepairs={}",
        unit.name,
        unit.artifact_path.display(),
        unit.repairs
    );
}

fn parse_unit(raw: &str) -> Result<SourceUnit, String> {
    match raw.split_once('=') {
        Some((name, path)) if !name.trim().is_empty() && !path.is_empty() => {
            Ok(SourceUnit::new(name.trim(), path))
        }
        Some(_) => Err(format!("expected NAME=PATH, got {raw:?}")),
        None => {
            let path = PathBuf::from(raw);
            let name = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .filter(|stem| !stem.is_empty())
                .ok_or_else(|| format!("cannot derive a unit name from {raw:?}"))?;
            Ok(SourceUnit::new(name, path))
        }
    }
}
