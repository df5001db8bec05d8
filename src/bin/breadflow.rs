use anyhow::{Context as AnyhowContext, Result};
use breadflow::compiler::loader::{load_diagram_from_yaml, load_diagrams_from_dir};
use breadflow::config::Settings;
use breadflow::render::{dot_to_svg, record_as_dot, workflow_as_dot};
use breadflow::runtime::engine::Engine;
use breadflow::runtime::evaluator::Workflow;
use breadflow::runtime::record::{MemoryRecord, Record};
use breadflow::runtime::storage::JsonDirRecordStore;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file (YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Overrides the configured log level
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a diagram and print the resulting nodes and edges
    Check {
        /// Path to the diagram YAML file
        diagram: PathBuf,
    },

    /// Print a diagram in the dot language
    Dot {
        diagram: PathBuf,
        /// Colour the diagram with the progress of this record
        #[arg(long, short)]
        record: Option<PathBuf>,
    },

    /// Render a diagram to svg using graphviz
    Svg {
        diagram: PathBuf,
        #[arg(long, short)]
        record: Option<PathBuf>,
        /// Output file, stdout if omitted
        #[arg(long, short)]
        out: Option<PathBuf>,
    },

    /// Create a new record file for a diagram
    Init {
        diagram: PathBuf,
        record: PathBuf,
        /// Initial fields (key=value)
        #[arg(long, short = 'D', value_parser = parse_key_val)]
        vars: Vec<(String, serde_json::Value)>,
    },

    /// Show which steps of a record are done and which are waiting
    Status { diagram: PathBuf, record: PathBuf },

    /// Apply field values to a record and run the workflow update
    Advance {
        diagram: PathBuf,
        record: PathBuf,
        /// Field values to set before advancing (key=value)
        #[arg(long, short = 'D', value_parser = parse_key_val)]
        vars: Vec<(String, serde_json::Value)>,
    },

    /// Cancel the workflow of a record
    Cancel { diagram: PathBuf, record: PathBuf },

    /// Periodically update all open records in a directory
    Beat {
        /// Directory containing diagram YAML files
        #[arg(long)]
        workflows: PathBuf,

        /// Directory containing record JSON files
        #[arg(long)]
        records: PathBuf,

        /// Seconds between beats, overrides the settings file
        #[arg(long)]
        interval: Option<u64>,

        /// Run a single beat and exit
        #[arg(long)]
        once: bool,
    },
}

fn parse_key_val(s: &str) -> Result<(String, serde_json::Value), String> {
    let pos = s.find('=').ok_or_else(|| format!("invalid KEY=value: no `=` found in `{}`", s))?;
    let key = s[..pos].to_string();
    let val_str = &s[pos + 1..];
    // Try parsing as JSON, otherwise treat as string
    let val = serde_json::from_str(val_str).unwrap_or_else(|_| serde_json::Value::String(val_str.to_string()));
    Ok((key, val))
}

fn load_workflow(path: &Path) -> Result<Workflow> {
    let diagram = load_diagram_from_yaml(path)?;
    Workflow::from_diagram(&diagram).with_context(|| format!("Invalid diagram {}", path.display()))
}

fn read_record(path: &Path) -> Result<MemoryRecord> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read record from {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse record {}", path.display()))
}

fn write_record(path: &Path, record: &MemoryRecord) -> Result<()> {
    fs::write(path, serde_json::to_string_pretty(record)?)
        .with_context(|| format!("Failed to write record to {}", path.display()))
}

fn print_status(workflow: &Workflow, record: &MemoryRecord) {
    let graph = workflow.graph();
    println!("workflow: {} ({})", graph.name, graph.id);
    println!("record:   {}", record.id);
    let done_nodes = workflow.done_nodes(record);
    for node in graph.nodes.iter().filter(|n| !n.generated) {
        let state = if done_nodes[node.id.0] {
            "done"
        } else if workflow.has_incoming(node.id, record) {
            "waiting"
        } else {
            "-"
        };
        println!("  {:<24} {:<15} {}", node.name, node.kind.name(), state);
    }
    let active = workflow.active_fields(record);
    if !active.is_empty() {
        println!("active:   {}", active.join(", "));
    }
    let status = if record.cancelled().is_some() {
        "cancelled"
    } else if record.completed().is_some() {
        "completed"
    } else {
        "ongoing"
    };
    println!("status:   {}", status);
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if let Some(level) = cli.log_level {
        settings.log_level = level;
    }
    tracing_subscriber::fmt()
        .with_max_level(settings.level()?)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Check { diagram } => {
            let workflow = load_workflow(&diagram)?;
            let graph = workflow.graph();
            println!("{} nodes, {} edges", graph.nodes.len(), graph.edges.len());
            for node in &graph.nodes {
                println!("  {:<4} {:<24} {}", node.id.to_string(), node.name, node.kind.name());
            }
            for edge in &graph.edges {
                let choice = edge.choice.as_deref().map(|c| format!(" [{}]", c)).unwrap_or_default();
                println!(
                    "  {} -> {}{}",
                    graph.node(edge.source).name,
                    graph.node(edge.target).name,
                    choice
                );
            }
        }

        Commands::Dot { diagram, record } => {
            let workflow = load_workflow(&diagram)?;
            let dot = match record {
                Some(path) => record_as_dot(&workflow, &read_record(&path)?, &[]),
                None => workflow_as_dot(workflow.graph(), &[]),
            };
            println!("{}", dot);
        }

        Commands::Svg { diagram, record, out } => {
            let workflow = load_workflow(&diagram)?;
            let dot = match record {
                Some(path) => record_as_dot(&workflow, &read_record(&path)?, &[]),
                None => workflow_as_dot(workflow.graph(), &[]),
            };
            let svg = dot_to_svg(&dot, &settings.dot_binary);
            match out {
                Some(path) => fs::write(&path, svg.to_string())
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => println!("{}", svg),
            }
        }

        Commands::Init { diagram, record, vars } => {
            let workflow = load_workflow(&diagram)?;
            let mut new_record = MemoryRecord::new(workflow.id());
            new_record.fields.extend(vars);
            workflow.save(&mut new_record)?;
            write_record(&record, &new_record)?;
            info!(record = %new_record.id, "Record created");
            print_status(&workflow, &new_record);
        }

        Commands::Status { diagram, record } => {
            let workflow = load_workflow(&diagram)?;
            print_status(&workflow, &read_record(&record)?);
        }

        Commands::Advance { diagram, record, vars } => {
            let workflow = load_workflow(&diagram)?;
            let mut current = read_record(&record)?;
            for (key, value) in vars {
                current.set_field(&key, value)?;
            }
            workflow.save(&mut current)?;
            write_record(&record, &current)?;
            print_status(&workflow, &current);
        }

        Commands::Cancel { diagram, record } => {
            let workflow = load_workflow(&diagram)?;
            let mut current = read_record(&record)?;
            workflow.cancel(&mut current)?;
            write_record(&record, &current)?;
            print_status(&workflow, &current);
        }

        Commands::Beat { workflows, records, interval, once } => {
            let store = Arc::new(JsonDirRecordStore::open(&records).await?);
            let engine = Engine::new_with_store(store);

            info!("Loading workflows from: {:?}", workflows);
            for diagram in load_diagrams_from_dir(&workflows)? {
                match engine.register_diagram(&diagram) {
                    Ok(wf) => info!(workflow = %wf.id(), "Registered workflow"),
                    Err(e) => error!(diagram = %diagram.id, error = %e, "Failed to compile"),
                }
            }

            if once {
                let saved = engine.beat().await?;
                info!(saved, "Beat finished");
            } else {
                let every = interval.map(std::time::Duration::from_secs).unwrap_or(settings.beat());
                info!("Running beat every {:?} (Press Ctrl+C to stop)", every);
                tokio::select! {
                    result = engine.run_beat(every, None) => result?,
                    _ = tokio::signal::ctrl_c() => info!("Stopping beat"),
                }
            }
        }
    }

    Ok(())
}
