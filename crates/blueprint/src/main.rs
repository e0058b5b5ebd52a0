use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use blueprint_core::builder::{BuildOutput, GraphAssembler};
use blueprint_core::config::Config;
use blueprint_core::diff::DiffEngine;
use blueprint_core::parser::SourceParser;
use blueprint_git::GitNavigator;
use blueprint_go::GoParser;
use blueprint_python::PythonParser;
use blueprint_report::{json, mermaid, text};
use blueprint_typescript::TypeScriptParser;

#[derive(Parser)]
#[command(name = "blueprint")]
#[command(about = "Build architectural knowledge graphs and diff them across git history")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Mermaid,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a source tree and print its knowledge graph
    Analyze {
        /// Path to the repository root
        path: PathBuf,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
        /// Config file path (defaults to .blueprint.toml in the project root)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Compare architecture between two git refs
    Diff {
        /// Base ref (commit hash or branch)
        base: String,
        /// Target ref (commit hash or branch)
        target: String,
        /// Path to the git repository
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// List recent commits
    Commits {
        /// Path to the git repository
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        #[arg(long, default_value_t = 50)]
        max: usize,
        /// Branch to list (defaults to the current branch)
        #[arg(long)]
        branch: Option<String>,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// List branches
    Branches {
        /// Path to the git repository
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        /// Include remote-tracking branches
        #[arg(long)]
        remote: bool,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Create a default .blueprint.toml configuration file
    Init {
        /// Overwrite existing config
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Analyze {
            path,
            format,
            config,
        } => cmd_analyze(&path, format, config.as_deref()),
        Commands::Diff {
            base,
            target,
            repo,
            format,
        } => cmd_diff(&repo, &base, &target, format).await,
        Commands::Commits {
            repo,
            max,
            branch,
            format,
        } => cmd_commits(&repo, max, branch.as_deref(), format),
        Commands::Branches {
            repo,
            remote,
            format,
        } => cmd_branches(&repo, remote, format),
        Commands::Init { force } => cmd_init(force),
    };

    if let Err(e) = result {
        eprintln!("{} {e:#}", "Error:".red().bold());
        process::exit(2);
    }
}

fn cmd_analyze(path: &Path, format: OutputFormat, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(path, config_path)?;
    let output = build_graph(path, config)?;

    match format {
        OutputFormat::Text => print!("{}", text::graph_summary(&output.graph, &output.stats)),
        OutputFormat::Json => println!("{}", json::graph_to_json(&output.graph, true)?),
        OutputFormat::Mermaid => println!("{}", mermaid::graph_flowchart(&output.graph)),
    }
    Ok(())
}

async fn cmd_diff(repo: &Path, base: &str, target: &str, format: OutputFormat) -> Result<()> {
    let navigator = GitNavigator::open(repo)?;
    let base_hash = navigator.resolve_ref(base)?;
    let target_hash = navigator.resolve_ref(target)?;

    let (base_dir, target_dir) = tokio::join!(
        navigator.checkout_to_temp(&base_hash),
        navigator.checkout_to_temp(&target_hash)
    );
    let base_dir = base_dir?;
    let target_dir = target_dir?;
    tracing::debug!(base = %base_hash, target = %target_hash, "checked out snapshots");

    let repo_name = repo
        .canonicalize()
        .unwrap_or_else(|_| repo.to_path_buf())
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "repo".to_string());
    let short = |hash: &str| hash.chars().take(8).collect::<String>();

    let base_output = build_snapshot(&base_dir, &format!("{repo_name}@{}", short(&base_hash)))?;
    let target_output =
        build_snapshot(&target_dir, &format!("{repo_name}@{}", short(&target_hash)))?;

    let diff = DiffEngine::new().compare(&base_output.graph, &target_output.graph, base, target);

    match format {
        OutputFormat::Text => {
            print!("{}", text::diff_report(&diff));
            let changed = navigator.changed_files(&base_hash, &target_hash)?;
            println!(
                "\nfiles: {} added, {} modified, {} deleted, {} renamed",
                changed.added.len(),
                changed.modified.len(),
                changed.deleted.len(),
                changed.renamed.len()
            );
        }
        OutputFormat::Json => println!("{}", json::diff_to_json(&diff, true)?),
        OutputFormat::Mermaid => println!("{}", mermaid::diff_flowchart(&diff)),
    }

    navigator.close();
    Ok(())
}

fn cmd_commits(
    repo: &Path,
    max: usize,
    branch: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let navigator = GitNavigator::open(repo)?;
    let commits = navigator.list_commits(max, branch)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&commits)?),
        _ => {
            for commit in &commits {
                println!(
                    "{} {} {} {}",
                    commit.short_hash.yellow(),
                    commit.date.format("%Y-%m-%d"),
                    commit.author.dimmed(),
                    commit.message
                );
            }
        }
    }
    Ok(())
}

fn cmd_branches(repo: &Path, remote: bool, format: OutputFormat) -> Result<()> {
    let navigator = GitNavigator::open(repo)?;
    let branches = navigator.list_branches(remote)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&branches)?),
        _ => {
            for branch in &branches {
                let marker = if branch.is_remote { "remote" } else { "local" };
                println!(
                    "{} {} {}",
                    branch.head_commit.yellow(),
                    branch.name,
                    marker.dimmed()
                );
            }
        }
    }
    Ok(())
}

fn cmd_init(force: bool) -> Result<()> {
    let target = PathBuf::from(".blueprint.toml");
    if target.exists() && !force {
        anyhow::bail!(".blueprint.toml already exists. Use --force to overwrite.");
    }
    std::fs::write(&target, Config::default_toml())?;
    println!("Created .blueprint.toml with default configuration.");
    Ok(())
}

fn load_config(project_path: &Path, config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(p) => Config::load(p),
        None => Ok(Config::load_or_default(project_path)),
    }
}

fn parsers() -> Result<Vec<Box<dyn SourceParser>>> {
    Ok(vec![
        Box::new(PythonParser::new().context("failed to initialize Python parser")?),
        Box::new(TypeScriptParser::new().context("failed to initialize TypeScript parser")?),
        Box::new(GoParser::new().context("failed to initialize Go parser")?),
    ])
}

fn build_graph(path: &Path, config: Config) -> Result<BuildOutput> {
    GraphAssembler::new(parsers()?, config).build(path)
}

/// Build a snapshot graph for a scratch checkout, naming it after the ref.
/// Only a config inside the checkout itself applies; the scratch directory's
/// ancestors are unrelated.
fn build_snapshot(path: &Path, name: &str) -> Result<BuildOutput> {
    let config_path = path.join(".blueprint.toml");
    let mut config = if config_path.exists() {
        Config::load(&config_path).unwrap_or_default()
    } else {
        Config::default()
    };
    config.project.name = Some(name.to_string());
    build_graph(path, config)
}
