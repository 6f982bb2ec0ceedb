//! CLI command definitions for persona-forge.
//!
//! `run` submits one batch and follows it to completion, `edit-persona`
//! records a persona edit, and `prompts` prints the built-in prompt set.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};

use crate::llm::{OpenAiClient, DEFAULT_API_BASE};
use crate::metrics::{export_metrics, init_metrics};
use crate::pipeline::{
    AgentResult, BatchRequest, BatchStatus, DecisionSummary, ResultsQuery, SimulationConfig,
    SimulationService,
};
use crate::storage::PersonaEdit;
use crate::template::PromptSet;

/// Fan out LLM persona and decision simulations across demographic attributes.
#[derive(Parser)]
#[command(name = "persona-forge")]
#[command(about = "Simulate how generated personas decide in a scenario")]
#[command(version)]
#[command(
    long_about = "persona-forge generates personas for each demographic attribute, asks every persona to pick an action for a scenario, and reports the distribution of decisions.\n\nEach successful persona/decision pair is appended to a JSONL simulation log.\n\nExample usage:\n  persona-forge run --scenario \"A hurricane is approaching\" --context \"where they live\" \\\n    --demographic-group \"Coastal residents\" -a renter -a homeowner --action-space \"Evacuate, Stay\""
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Submit a simulation batch and wait for its results.
    Run(RunArgs),

    /// Record an edit to a generated persona.
    EditPersona(EditPersonaArgs),

    /// Print the built-in prompt set as YAML.
    Prompts(PromptsArgs),
}

/// Provider and storage settings shared by commands.
#[derive(Parser, Debug)]
pub struct CommonArgs {
    /// OpenAI-compatible API key.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API.
    #[arg(long, env = "OPENAI_API_BASE", default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// Model used for both stages (overrides PERSONA_FORGE_MODEL / OPENAI_MODEL).
    #[arg(short = 'm', long)]
    pub model: Option<String>,

    /// Path of the simulation log (JSONL).
    #[arg(long)]
    pub simulation_log: Option<PathBuf>,

    /// Path of the persona edit log (JSONL).
    #[arg(long)]
    pub persona_edit_log: Option<PathBuf>,
}

/// Arguments for `persona-forge run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// JSON file with a batch request (scenario, context, demographicGroup,
    /// attributesList, actionSpace). Individual flags override its fields.
    #[arg(short = 'r', long)]
    pub request: Option<PathBuf>,

    /// Scenario every persona faces.
    #[arg(long)]
    pub scenario: Option<String>,

    /// What each persona description should cover.
    #[arg(long)]
    pub context: Option<String>,

    /// Demographic group the attributes belong to.
    #[arg(long)]
    pub demographic_group: Option<String>,

    /// Attribute to simulate (repeatable).
    #[arg(short = 'a', long = "attribute")]
    pub attributes: Vec<String>,

    /// Comma-separated list of allowed decisions.
    #[arg(long)]
    pub action_space: Option<String>,

    /// Tasks per attribute.
    #[arg(long)]
    pub replicas: Option<usize>,

    /// Attempts per stage before a task fails.
    #[arg(long)]
    pub max_attempts: Option<usize>,

    /// YAML prompt file overriding the built-in prompts.
    #[arg(long)]
    pub prompts: Option<PathBuf>,

    /// Seconds between progress reports.
    #[arg(long, default_value = "2")]
    pub poll_interval: u64,

    /// Write the results as JSON to this file.
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Write Prometheus metrics to this file when the batch finishes.
    #[arg(long)]
    pub metrics_out: Option<PathBuf>,

    /// Output JSON summary to stdout.
    #[arg(short = 'j', long)]
    pub json: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// Arguments for `persona-forge edit-persona`.
#[derive(Parser, Debug)]
pub struct EditPersonaArgs {
    /// Identifier of the persona being edited.
    #[arg(long)]
    pub id: String,

    /// New name.
    #[arg(long)]
    pub name: String,

    /// New description.
    #[arg(long)]
    pub description: String,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// Arguments for `persona-forge prompts`.
#[derive(Parser, Debug)]
pub struct PromptsArgs {
    /// Write the YAML to this file instead of stdout.
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_batch_command(args).await,
        Commands::EditPersona(args) => run_edit_persona_command(args).await,
        Commands::Prompts(args) => run_prompts_command(args),
    }
}

// ============================================================================
// Run Command Implementation
// ============================================================================

#[derive(Debug, Serialize)]
struct RunOutput<'a> {
    batch_id: String,
    total: usize,
    succeeded: usize,
    failed: usize,
    summary: &'a DecisionSummary,
}

/// Results file layout, matching what the web client consumed.
#[derive(Debug, Serialize)]
struct ResultsFile<'a> {
    agents: &'a [AgentResult],
}

async fn run_batch_command(args: RunArgs) -> anyhow::Result<()> {
    let request = build_request(&args)?;

    let mut config = apply_common(SimulationConfig::from_env()?, &args.common);
    if let Some(replicas) = args.replicas {
        config = config.with_replicas_per_attribute(replicas);
    }
    if let Some(max_attempts) = args.max_attempts {
        config = config.with_max_attempts(max_attempts);
    }
    if let Some(ref prompts) = args.prompts {
        config = config.with_prompts_path(prompts);
    }
    config.validate()?;

    if args.metrics_out.is_some() {
        init_metrics().context("Failed to initialize metrics")?;
    }

    let provider = OpenAiClient::new(
        args.common.api_base.clone(),
        args.common.api_key.clone(),
        config.model.clone(),
    )?;
    if !provider.has_api_key() && provider.api_base() == DEFAULT_API_BASE {
        anyhow::bail!(
            "OPENAI_API_KEY is required but not set.\n\
             Provide it via --api-key <KEY> or set the OPENAI_API_KEY environment variable."
        );
    }
    info!(model = %config.model, api_base = %provider.api_base(), "Using OpenAI-compatible provider");

    let service = SimulationService::from_config(&config, Arc::new(provider)).await?;
    let batch_id = service.submit_batch(request).await?;
    info!(batch_id = %batch_id, "Simulation started");

    let poll_interval = Duration::from_secs(args.poll_interval.max(1));
    loop {
        let Some(view) = service.progress(&batch_id).await else {
            anyhow::bail!("Batch {} disappeared from the progress store", batch_id);
        };
        if !args.json {
            println!(
                "  Progress: {}/{} ({:.0}%)",
                view.completed,
                view.total,
                view.fraction() * 100.0
            );
        }
        if view.status == BatchStatus::Completed {
            break;
        }
        tokio::time::sleep(poll_interval).await;
    }

    let outcome = service.wait(&batch_id).await?;

    let results = match service.results(&batch_id).await {
        ResultsQuery::Ready(results) => results,
        ResultsQuery::StillRunning => anyhow::bail!("Batch {} is still running", batch_id),
        ResultsQuery::NotFound => anyhow::bail!("Batch {} not found", batch_id),
    };
    let summary = DecisionSummary::from_results(&results);

    if let Some(ref path) = args.output {
        write_json(path, &ResultsFile { agents: &results })?;
        info!(path = %path.display(), results = results.len(), "Results written");
    }

    if let Some(ref path) = args.metrics_out {
        fs::write(path, export_metrics())
            .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
    }

    if outcome.failed > 0 {
        warn!(
            failed = outcome.failed,
            total = outcome.total,
            "Some tasks produced no result"
        );
    }

    if args.json {
        let output = RunOutput {
            batch_id: batch_id.to_string(),
            total: outcome.total,
            succeeded: outcome.succeeded,
            failed: outcome.failed,
            summary: &summary,
        };
        let json_output = serde_json::to_string_pretty(&output)
            .map_err(|e| anyhow::anyhow!("Failed to serialize JSON output: {}", e))?;
        println!("{}", json_output);
    } else {
        println!("✓ Simulation {} completed", batch_id);
        println!(
            "  Tasks: {} total, {} succeeded, {} failed",
            outcome.total, outcome.succeeded, outcome.failed
        );
        for attribute in &summary.attributes {
            println!("  {} ({} personas):", attribute.attribute, attribute.total);
            for (decision, count) in &attribute.decisions {
                println!(
                    "    {}: {} ({:.1}%)",
                    decision,
                    count,
                    attribute.percentage(decision)
                );
            }
        }
        println!(
            "  Simulation log: {}",
            config.simulation_log_path.display()
        );
    }

    Ok(())
}

/// Builds the batch request from `--request` and the individual flags.
fn build_request(args: &RunArgs) -> anyhow::Result<BatchRequest> {
    let mut request = match args.request {
        Some(ref path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read request file {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid request file {}", path.display()))?
        }
        None => BatchRequest::default(),
    };

    if let Some(ref scenario) = args.scenario {
        request.scenario = scenario.clone();
    }
    if let Some(ref context) = args.context {
        request.context = context.clone();
    }
    if let Some(ref group) = args.demographic_group {
        request.demographic_group = group.clone();
    }
    if !args.attributes.is_empty() {
        request.attributes_list = args.attributes.clone();
    }
    if let Some(ref action_space) = args.action_space {
        request.action_space = action_space.clone();
    }

    Ok(request)
}

fn apply_common(mut config: SimulationConfig, common: &CommonArgs) -> SimulationConfig {
    if let Some(ref model) = common.model {
        config = config.with_model(model.clone());
    }
    if let Some(ref path) = common.simulation_log {
        config = config.with_simulation_log_path(path);
    }
    if let Some(ref path) = common.persona_edit_log {
        config = config.with_persona_edit_log_path(path);
    }
    config
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

// ============================================================================
// Edit Persona Command Implementation
// ============================================================================

#[derive(Debug, Serialize)]
struct EditOutput {
    status: &'static str,
    updated: PersonaEdit,
}

async fn run_edit_persona_command(args: EditPersonaArgs) -> anyhow::Result<()> {
    let config = apply_common(SimulationConfig::from_env()?, &args.common);

    // Recording an edit never calls the model, so no key is required here.
    let provider = OpenAiClient::new(
        args.common.api_base.clone(),
        args.common.api_key.clone(),
        config.model.clone(),
    )?;
    let service = SimulationService::from_config(&config, Arc::new(provider)).await?;

    let edit = service
        .record_persona_edit(&args.id, &args.name, &args.description)
        .await?;

    let output = EditOutput {
        status: "success",
        updated: edit,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

// ============================================================================
// Prompts Command Implementation
// ============================================================================

fn run_prompts_command(args: PromptsArgs) -> anyhow::Result<()> {
    let yaml = PromptSet::default().to_yaml()?;

    match args.output {
        Some(path) => {
            fs::write(&path, yaml)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("✓ Prompts written to {}", path.display());
        }
        None => print!("{}", yaml),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::try_parse_from([
            "persona-forge",
            "run",
            "--scenario",
            "A hurricane is approaching",
            "--context",
            "their home",
            "--demographic-group",
            "Coastal residents",
            "-a",
            "renter",
            "-a",
            "homeowner",
            "--action-space",
            "Evacuate, Stay",
            "--replicas",
            "5",
        ])
        .expect("arguments should parse");

        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.attributes, vec!["renter", "homeowner"]);
        assert_eq!(args.replicas, Some(5));

        let request = build_request(&args).expect("request builds");
        assert_eq!(request.demographic_group, "Coastal residents");
        assert_eq!(request.attributes_list.len(), 2);
        assert_eq!(request.action_space, "Evacuate, Stay");
    }

    #[test]
    fn test_request_file_with_flag_override() {
        let mut file = NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{"scenario": "Fire drill", "context": "their office", "demographicGroup": "Workers", "attributesList": ["manager"], "actionSpace": "Leave, Stay"}}"#
        )
        .expect("write request");

        let path = file.path().to_string_lossy().to_string();
        let cli = Cli::try_parse_from(["persona-forge", "run", "-r", &path, "--scenario", "Flood"])
            .expect("arguments should parse");
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };

        let request = build_request(&args).expect("request builds");
        assert_eq!(request.scenario, "Flood");
        assert_eq!(request.context, "their office");
        assert_eq!(request.attributes_list, vec!["manager".to_string()]);
    }

    #[test]
    fn test_parse_edit_persona() {
        let cli = Cli::try_parse_from([
            "persona-forge",
            "edit-persona",
            "--id",
            "agent-1",
            "--name",
            "Maya",
            "--description",
            "A nurse",
            "--persona-edit-log",
            "edits.jsonl",
        ])
        .expect("arguments should parse");

        let Commands::EditPersona(args) = cli.command else {
            panic!("expected edit-persona command");
        };
        assert_eq!(args.id, "agent-1");
        assert_eq!(args.common.persona_edit_log, Some(PathBuf::from("edits.jsonl")));
    }

    #[test]
    fn test_apply_common_overrides() {
        let common = CommonArgs {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            model: Some("gpt-4o-mini".to_string()),
            simulation_log: Some(PathBuf::from("out/sim.jsonl")),
            persona_edit_log: None,
        };
        let config = apply_common(SimulationConfig::default(), &common);
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.simulation_log_path, PathBuf::from("out/sim.jsonl"));
        assert_eq!(
            config.persona_edit_log_path,
            PathBuf::from("updated_personas.jsonl")
        );
    }

    #[test]
    fn test_prompts_command_writes_yaml() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let path = dir.path().join("prompts.yaml");
        run_prompts_command(PromptsArgs {
            output: Some(path.clone()),
        })
        .expect("prompts written");

        let loaded = PromptSet::load_file(&path).expect("prompts load back");
        assert_eq!(loaded, PromptSet::default());
    }
}
