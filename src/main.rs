use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docloom::cli::commands::generate::GenerateOptions;
use docloom::types::Stage;

/// Parse a pipeline stage name
fn parse_stage(s: &str) -> Result<Stage, String> {
    Stage::parse(&s.to_lowercase()).ok_or_else(|| {
        format!(
            "Invalid stage '{}'. Valid values: prepare, explore, document",
            s
        )
    })
}

#[derive(Parser)]
#[command(name = "docloom")]
#[command(
    version,
    about = "AI-driven documentation generator with iterative exploration and hierarchical aggregation"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate documentation for a project
    Generate {
        #[arg(help = "Project root (default: current directory)")]
        path: Option<PathBuf>,
        #[arg(long, value_parser = parse_stage, help = "Last stage to run: prepare, explore, document")]
        until: Option<Stage>,
        #[arg(long, short, help = "Write the documentation as JSON to this file")]
        output: Option<PathBuf>,
        #[arg(long, help = "Print the run report as JSON")]
        json: bool,
        #[arg(long, help = "Model to use")]
        model: Option<String>,
        #[arg(long, env = "DOCLOOM_API_BASE", help = "OpenAI-compatible API base URL")]
        api_base: Option<String>,
        #[arg(long, help = "Maximum exploration rounds")]
        max_iterations: Option<usize>,
        #[arg(long, help = "Maximum concurrent oracle calls")]
        concurrency: Option<usize>,
        #[arg(long, help = "Keep artifacts in memory instead of SQLite")]
        ephemeral: bool,
    },

    /// Show the file tree the pipeline would document
    Tree {
        #[arg(help = "Project root (default: current directory)")]
        path: Option<PathBuf>,
        #[arg(long, help = "Show samples of large or encoded files")]
        stats: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(help = "Project root (default: current directory)")]
        path: Option<PathBuf>,
        #[arg(
            short = 'f',
            long,
            default_value = "toml",
            help = "Output format: toml, json"
        )]
        format: String,
    },
    /// Show configuration file paths
    Path {
        #[arg(help = "Project root (default: current directory)")]
        path: Option<PathBuf>,
    },
    /// Write a default project configuration
    Init {
        #[arg(help = "Project root (default: current directory)")]
        path: Option<PathBuf>,
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

fn main() -> ExitCode {
    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", console::style("Error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Generate {
            path,
            until,
            output,
            json,
            model,
            api_base,
            max_iterations,
            concurrency,
            ephemeral,
        } => {
            let rt = Runtime::new()?;
            rt.block_on(docloom::cli::commands::generate::run(GenerateOptions {
                path,
                until,
                output,
                json,
                model,
                api_base,
                max_iterations,
                concurrency,
                ephemeral,
                quiet: cli.quiet,
            }))?;
        }
        Commands::Tree { path, stats } => {
            docloom::cli::commands::tree::run(path, stats)?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { path, format } => {
                docloom::cli::commands::config::show(path, &format)?;
            }
            ConfigAction::Path { path } => {
                docloom::cli::commands::config::path(path)?;
            }
            ConfigAction::Init { path, force } => {
                docloom::cli::commands::config::init(path, force)?;
            }
        },
    }

    Ok(())
}
