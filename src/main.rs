//! flowgate - workflow gate for spec-driven development.
//!
//! Checks whether a phase may run for a task and whether the compliance
//! rules that apply to it pass.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use flowgate::core::Config;
use flowgate::policy::PolicyEngine;
use flowgate::task::{FileTaskStore, StoreError, TaskRecord, TaskStore};
use flowgate::workflow::{self, LoadError, LoadedWorkflow, DEFAULT_WORKFLOW};
use flowgate::{exit, AdvanceError, GateOutcome, PhaseGate, PhaseRequest};

/// Workflow state machine and policy gate
#[derive(Parser)]
#[command(name = "flowgate")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Workflow document (defaults to the configured one)
    #[arg(long, global = true, env = "FLOWGATE_WORKFLOW")]
    workflow: Option<PathBuf>,

    /// Config file (defaults to .flowgate.toml, then the user config)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a phase may run, without changing anything
    Check {
        /// Phase to check
        phase: String,

        /// Current state of the task
        #[arg(long, required_unless_present = "task", conflicts_with = "task")]
        state: Option<String>,

        /// Read the current state (and checklist, labels) from the task store
        #[arg(long)]
        task: Option<String>,

        #[command(flatten)]
        gate: GateArgs,
    },

    /// Gate a phase and record the task's new state when it may proceed
    Advance {
        /// Phase to run
        phase: String,

        /// Task id in the task store
        #[arg(long)]
        task: String,

        #[command(flatten)]
        gate: GateArgs,
    },

    /// Validate the workflow document
    Validate {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Print the workflow graph
    Graph {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = GraphFormat::Text)]
        format: GraphFormat,
    },

    /// List the rule catalog
    Rules {
        /// Only rules that apply to this phase, with their resolved mode
        #[arg(long)]
        phase: Option<String>,
    },

    /// Inspect or seed the task store
    Task {
        #[command(subcommand)]
        action: TaskCommand,
    },

    /// Write a default workflow document
    Init {
        /// Overwrite an existing workflow file
        #[arg(short, long)]
        force: bool,
    },

    /// Show configuration
    Config {
        /// Show config directory path
        #[arg(long)]
        path: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[derive(Args)]
struct GateArgs {
    /// Bypass a guard denial along a declared emergency path
    #[arg(long)]
    force: bool,

    /// Treat enforce-mode rules as warnings for this invocation only
    #[arg(long)]
    warn_only: bool,

    /// Project root that rule checks look at
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Subcommand)]
enum TaskCommand {
    /// Show a task
    Show {
        /// Task id
        id: String,
    },

    /// Create or replace a task
    Add {
        /// Task id
        id: String,

        /// Current state
        #[arg(long)]
        state: String,

        /// Label (repeatable)
        #[arg(long = "label")]
        labels: Vec<String>,

        /// Open checklist item (repeatable); prefix with `[x] ` to mark it done
        #[arg(long = "item")]
        items: Vec<String>,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum GraphFormat {
    Text,
    Json,
    Dot,
}

fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(exit::CONFIG);
        }
    };

    init_logging(cli.verbose, &config.logging.level);

    let code = match run(cli, &config) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            exit_code_for(&e)
        }
    };
    std::process::exit(code);
}

/// `RUST_LOG` wins, then `-v`, then the configured level. Logs go to stderr
/// so JSON output stays clean.
fn init_logging(verbose: bool, level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"))
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from_file(path),
        None => Config::load(),
    }
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<LoadError>().is_some() {
        return exit::CONFIG;
    }
    if let Some(e) = err.downcast_ref::<AdvanceError>() {
        return e.exit_code();
    }
    if err.downcast_ref::<StoreError>().is_some_and(StoreError::is_conflict) {
        return exit::STATE_CONFLICT;
    }
    exit::FAILURE
}

fn run(cli: Cli, config: &Config) -> Result<i32> {
    let workflow_path = cli.workflow.clone().unwrap_or_else(|| config.workflow_path(Path::new(".")));

    match cli.command {
        Commands::Check { phase, state, task, gate } => {
            cmd_check(&workflow_path, config, &phase, state, task.as_deref(), &gate)
        }
        Commands::Advance { phase, task, gate } => {
            cmd_advance(&workflow_path, config, &phase, &task, &gate)
        }
        Commands::Validate { format } => cmd_validate(&workflow_path, format),
        Commands::Graph { format } => cmd_graph(&workflow_path, format).map(|()| exit::SUCCESS),
        Commands::Rules { phase } => cmd_rules(&workflow_path, phase.as_deref()).map(|()| exit::SUCCESS),
        Commands::Task { action } => cmd_task(config, action).map(|()| exit::SUCCESS),
        Commands::Init { force } => cmd_init(&workflow_path, force).map(|()| exit::SUCCESS),
        Commands::Config { path } => cmd_config(config, path).map(|()| exit::SUCCESS),
        Commands::Completions { shell } => {
            cmd_completions(shell);
            Ok(exit::SUCCESS)
        }
    }
}

fn open_workflow(path: &Path) -> Result<LoadedWorkflow> {
    Ok(workflow::load_workflow(path)?)
}

fn task_store(config: &Config) -> FileTaskStore {
    FileTaskStore::new(config.task_store_path(Path::new(".")))
}

/// Check a phase without touching the task store.
fn cmd_check(
    workflow_path: &Path,
    config: &Config,
    phase: &str,
    state: Option<String>,
    task_id: Option<&str>,
    args: &GateArgs,
) -> Result<i32> {
    let workflow = open_workflow(workflow_path)?;
    let engine = workflow.engine();
    let mut ctx = config.policy_context(&args.root);

    let current_state = match (state, task_id) {
        (Some(state), _) => state,
        (None, Some(id)) => {
            let task = task_store(config).read(id)?;
            let state = task.state.clone();
            ctx = ctx.with_task(task);
            state
        }
        (None, None) => anyhow::bail!("either --state or --task is required"),
    };

    let request = PhaseRequest::new(phase, current_state).force(args.force).warn_only(args.warn_only);
    let outcome = PhaseGate::new(&workflow.graph, &engine).run(&request, &ctx)?;
    print_outcome(&outcome, args.format)?;
    Ok(outcome.exit_code())
}

/// Gate a phase and move the stored task on success.
fn cmd_advance(
    workflow_path: &Path,
    config: &Config,
    phase: &str,
    task_id: &str,
    args: &GateArgs,
) -> Result<i32> {
    let workflow = open_workflow(workflow_path)?;
    let engine = workflow.engine();
    let store = task_store(config);
    let ctx = config.policy_context(&args.root);

    let request = PhaseRequest::new(phase, "").force(args.force).warn_only(args.warn_only);
    let outcome = PhaseGate::new(&workflow.graph, &engine).advance(&store, task_id, request, ctx)?;
    print_outcome(&outcome, args.format)?;

    if let (GateOutcome::Proceed { next_state, .. }, OutputFormat::Text) = (&outcome, args.format) {
        println!("Task '{task_id}' is now in '{next_state}'");
    }
    Ok(outcome.exit_code())
}

fn print_outcome(outcome: &GateOutcome, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(outcome)?),
        OutputFormat::Text => println!("{outcome}"),
    }

    if let Some(report) = outcome.report() {
        for entry in report.warnings() {
            eprintln!("warning: {} failed: {}", entry.code, entry.message);
            if let Some(remediation) = &entry.remediation {
                eprintln!("  fix: {remediation}");
            }
        }
    }
    if outcome.override_used() {
        eprintln!("warning: transition guard bypassed with --force");
    }
    Ok(())
}

/// Validate the workflow document and report every graph issue.
fn cmd_validate(workflow_path: &Path, format: OutputFormat) -> Result<i32> {
    let content = std::fs::read_to_string(workflow_path)
        .map_err(|source| LoadError::Read { path: workflow_path.to_path_buf(), source })?;
    let loaded = workflow::parse_workflow_str(&content, workflow::Format::from_path(workflow_path))
        .map_err(LoadError::from)?;
    let issues = workflow::validate(&loaded.graph);

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "valid": issues.is_empty(),
                "states": loaded.graph.states().len(),
                "phases": loaded.graph.phases().len(),
                "rules": loaded.catalog.len(),
                "issues": issues,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text if issues.is_empty() => {
            println!(
                "{}: valid ({} states, {} phases, {} rules)",
                workflow_path.display(),
                loaded.graph.states().len(),
                loaded.graph.phases().len(),
                loaded.catalog.len()
            );
        }
        OutputFormat::Text => {
            println!("{}: {} issue(s)", workflow_path.display(), issues.len());
            for issue in &issues {
                println!("  - {issue}");
            }
        }
    }

    Ok(if issues.is_empty() { exit::SUCCESS } else { exit::CONFIG })
}

fn cmd_graph(workflow_path: &Path, format: GraphFormat) -> Result<()> {
    let workflow = open_workflow(workflow_path)?;
    let graph = &workflow.graph;

    match format {
        GraphFormat::Text => print!("{graph}"),
        GraphFormat::Dot => print!("{}", graph.to_dot()),
        GraphFormat::Json => {
            let phases: Vec<_> = graph
                .phases()
                .iter()
                .map(|p| {
                    serde_json::json!({
                        "name": p.name,
                        "inputStates": p.inputs.iter().map(|&s| graph.state_name(s)).collect::<Vec<_>>(),
                        "outputState": graph.state_name(p.output),
                        "roles": p.roles,
                        "advisoryOnly": p.advisory_only,
                    })
                })
                .collect();
            let terminal: Vec<&str> =
                graph.terminal_states().into_iter().map(|id| graph.state_name(id)).collect();
            let json = serde_json::json!({
                "initialState": graph.initial().map(|id| graph.state_name(id)),
                "terminalStates": terminal,
                "states": graph.states(),
                "phases": phases,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }
    Ok(())
}

fn cmd_rules(workflow_path: &Path, phase: Option<&str>) -> Result<()> {
    let workflow = open_workflow(workflow_path)?;
    let engine: PolicyEngine = workflow.engine();

    if let Some(phase) = phase {
        if workflow.graph.find_phase(phase).is_none() {
            anyhow::bail!("unknown phase '{phase}'");
        }
    }

    let rules: Vec<_> = match phase {
        Some(phase) => engine.catalog().applicable(phase).collect(),
        None => engine.catalog().rules().iter().collect(),
    };
    if rules.is_empty() {
        println!("No rules");
        return Ok(());
    }

    for rule in rules {
        let mode = phase.map_or_else(|| rule.builtin_mode(), |p| engine.mode_for(rule, p));
        println!(
            "{:<12} {:<9} {:<8} [{}] {}",
            rule.code,
            rule.severity.as_str(),
            mode.as_str(),
            rule.scope,
            rule.predicate.describe()
        );
        if let Some(description) = &rule.description {
            println!("             {description}");
        }
    }
    Ok(())
}

fn cmd_task(config: &Config, action: TaskCommand) -> Result<()> {
    let store = task_store(config);
    match action {
        TaskCommand::Show { id } => {
            let task = store.read(&id)?;
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        TaskCommand::Add { id, state, labels, items } => {
            let mut task = TaskRecord::new(id, state);
            for label in labels {
                task = task.with_label(label);
            }
            for item in items {
                task = match item.strip_prefix("[x] ") {
                    Some(text) => task.with_item(text, true),
                    None => task.with_item(item, false),
                };
            }
            let summary = format!("Saved task '{}' in '{}'", task.id, task.state);
            store
                .upsert(task)
                .with_context(|| format!("Failed to write {}", store.path().display()))?;
            println!("{summary}");
        }
    }
    Ok(())
}

/// Write the default workflow document.
fn cmd_init(workflow_path: &Path, force: bool) -> Result<()> {
    if workflow_path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", workflow_path.display());
    }
    if let Some(parent) = workflow_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(workflow_path, DEFAULT_WORKFLOW)
        .with_context(|| format!("Failed to write {}", workflow_path.display()))?;
    println!("Created {}", workflow_path.display());
    Ok(())
}

/// Show configuration.
fn cmd_config(config: &Config, show_path: bool) -> Result<()> {
    if show_path {
        if let Some(path) = Config::config_dir() {
            println!("{}", path.display());
        }
        return Ok(());
    }

    let toml = toml::to_string_pretty(config)?;
    println!("{toml}");
    Ok(())
}

/// Generate shell completions.
fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "flowgate", &mut io::stdout());
}
