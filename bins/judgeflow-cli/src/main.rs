mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "judgeflow-cli")]
#[command(about = "Judgeflow CLI - Inspect languages, load problems, judge code locally", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List supported languages and their engine ids
    Languages {
        /// Language table JSON (defaults to JUDGEFLOW_LANGUAGES, then the built-in table)
        #[arg(short, long)]
        table: Option<PathBuf>,
    },

    /// Resolve a language name to its engine id
    Resolve {
        /// Language name or alias (e.g., cpp, c++, js)
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        table: Option<PathBuf>,
    },

    /// Validate a problem file and store it in Redis
    LoadProblem {
        /// Problem JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Redis URL (defaults to REDIS_URL)
        #[arg(long)]
        redis_url: Option<String>,
    },

    /// Judge a source file against a problem file using the configured engine
    Judge {
        /// Problem JSON file
        #[arg(short, long)]
        problem: PathBuf,

        /// Source code file
        #[arg(short, long)]
        source: PathBuf,

        /// Language name (e.g., cpp, java, javascript)
        #[arg(short, long)]
        language: String,

        /// Only run visible test cases
        #[arg(long, default_value = "false")]
        run: bool,
    },

    /// Check that the engine is reachable and accepts the configured key
    Ping,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Languages { table } => {
            commands::list_languages(table.as_deref())?;
        }
        Commands::Resolve { name, table } => {
            commands::resolve_language(&name, table.as_deref())?;
        }
        Commands::LoadProblem { file, redis_url } => {
            commands::load_problem(&file, redis_url.as_deref()).await?;
        }
        Commands::Judge {
            problem,
            source,
            language,
            run,
        } => {
            commands::judge(&problem, &source, &language, run).await?;
        }
        Commands::Ping => {
            commands::ping().await?;
        }
    }

    Ok(())
}
