//! docchat: chat with your documents from the terminal.
//!
//! Talks to a running document-chat server: manages knowledge bases,
//! uploads files and folders, and runs single questions or an interactive
//! chat against the active store.

mod commands;
mod logging;
mod prompt;
mod repl;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{debug, info};

use docchat_client::{ClientConfig, HttpApi};
use docchat_core::KnowledgeApi;
use docchat_session::{Session, Template};

#[derive(Parser)]
#[command(name = "docchat")]
#[command(author, version, about = "Chat with your documents")]
#[command(propagate_version = true)]
struct Cli {
    /// Server base URL
    #[arg(long, global = true, env = "DOCCHAT_BASE_URL")]
    base_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Debug logging (unless RUST_LOG is set)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List knowledge bases (* marks the active one)
    Stores,

    /// Create a knowledge base and make it active
    CreateStore {
        /// Display name
        name: String,
    },

    /// Permanently delete a knowledge base
    DeleteStore {
        /// Store id
        id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Make a knowledge base active
    UseStore {
        /// Store id
        id: String,
    },

    /// List files in the active (or given) knowledge base
    Files {
        /// Store id (default: the active store)
        #[arg(short, long)]
        store: Option<String>,
    },

    /// Upload files and folders into the active knowledge base
    Upload {
        /// Files or folders; folders are walked recursively
        #[arg(required = true, num_args = 1..)]
        paths: Vec<PathBuf>,

        /// Maximum concurrent uploads
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,
    },

    /// List available models (* marks the selected one)
    Models,

    /// Store the model provider API key on the server
    SetKey {
        /// API key
        key: String,
    },

    /// Check whether the server has an API key
    HasKey,

    /// Suggest starter questions for the active knowledge base
    Suggest,

    /// Ask a single question
    Ask {
        /// The question
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,

        /// Model id
        #[arg(short, long)]
        model: Option<String>,

        /// Instruction preset: react, academic, legal, summary
        #[arg(short, long)]
        template: Option<String>,

        /// Custom system instruction (overrides --template)
        #[arg(short, long)]
        system: Option<String>,
    },

    /// Interactive chat
    Chat {
        /// Model id
        #[arg(short, long)]
        model: Option<String>,

        /// Instruction preset: react, academic, legal, summary
        #[arg(short, long)]
        template: Option<String>,

        /// Custom system instruction (overrides --template)
        #[arg(short, long)]
        system: Option<String>,
    },

    /// Stop the server
    Shutdown {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _log_guard = logging::init(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn client_config(cli: &Cli) -> ClientConfig {
    let mut config = ClientConfig::from_env();
    if let Some(ref url) = cli.base_url {
        config = config.with_base_url(url.clone());
    }
    if let Some(secs) = cli.timeout {
        config = config.with_timeout(secs);
    }
    config
}

/// Whether the server should get keep-alive pings while this command runs.
///
/// Everything except `shutdown`, which is meant to let the server exit.
fn keeps_server_alive(command: &Commands) -> bool {
    !matches!(command, Commands::Shutdown { .. })
}

fn parse_template(name: Option<String>) -> anyhow::Result<Option<Template>> {
    Ok(name.map(|n| n.parse::<Template>()).transpose()?)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = client_config(&cli);
    info!(base_url = %config.base_url, "docchat starting");

    let api: Arc<dyn KnowledgeApi> = Arc::new(HttpApi::new(config)?);
    let session = commands::session(api);
    let heartbeat = if keeps_server_alive(&cli.command) {
        session.start_heartbeat()
    } else {
        None
    };

    let outcome = dispatch(&session, cli.command).await;

    if let Some(handle) = heartbeat {
        let pings = handle.shutdown().await?;
        debug!(pings, "Heartbeat stopped");
    }
    outcome?;

    debug!("docchat finished");
    Ok(())
}

async fn dispatch(session: &Session, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Stores => commands::stores(session).await?,
        Commands::CreateStore { name } => commands::create_store(session, &name).await?,
        Commands::DeleteStore { id, yes } => commands::delete_store(session, &id, yes).await?,
        Commands::UseStore { id } => commands::use_store(session, &id).await?,
        Commands::Files { store } => commands::files(session, store).await?,
        Commands::Upload { paths, concurrency } => {
            commands::upload(session, paths, concurrency).await?
        }
        Commands::Models => commands::models(session).await?,
        Commands::SetKey { key } => commands::set_key(session, &key).await?,
        Commands::HasKey => commands::has_key(session).await?,
        Commands::Suggest => commands::suggest(session).await?,
        Commands::Ask {
            question,
            model,
            template,
            system,
        } => {
            let instruction = commands::instruction(parse_template(template)?, system);
            commands::ask(session, &question.join(" "), model, instruction).await?
        }
        Commands::Chat {
            model,
            template,
            system,
        } => {
            let instruction = commands::instruction(parse_template(template)?, system);
            commands::chat(session, model, instruction).await?
        }
        Commands::Shutdown { yes } => commands::shutdown(session, yes).await?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_upload() {
        let cli = Cli::try_parse_from(["docchat", "upload", "a.pdf", "docs", "-j", "2"]).unwrap();
        match cli.command {
            Commands::Upload { paths, concurrency } => {
                assert_eq!(paths.len(), 2);
                assert_eq!(concurrency, Some(2));
            }
            _ => panic!("expected upload"),
        }
    }

    #[test]
    fn test_parse_ask_with_template() {
        let cli = Cli::try_parse_from([
            "docchat", "ask", "what", "is", "this?", "--template", "legal",
        ])
        .unwrap();
        match cli.command {
            Commands::Ask {
                question, template, ..
            } => {
                assert_eq!(question.join(" "), "what is this?");
                assert_eq!(
                    parse_template(template).unwrap(),
                    Some(Template::Legal)
                );
            }
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn test_global_base_url() {
        let cli =
            Cli::try_parse_from(["docchat", "stores", "--base-url", "http://host:9"]).unwrap();
        assert_eq!(client_config(&cli).base_url, "http://host:9");
    }

    #[test]
    fn test_heartbeat_for_long_running_commands() {
        let upload = Cli::try_parse_from(["docchat", "upload", "docs"]).unwrap();
        let ask = Cli::try_parse_from(["docchat", "ask", "why?"]).unwrap();
        let shutdown = Cli::try_parse_from(["docchat", "shutdown", "--yes"]).unwrap();
        assert!(keeps_server_alive(&upload.command));
        assert!(keeps_server_alive(&ask.command));
        assert!(!keeps_server_alive(&shutdown.command));
    }

    #[test]
    fn test_bad_template_rejected() {
        assert!(parse_template(Some("poetry".to_string())).is_err());
    }
}
