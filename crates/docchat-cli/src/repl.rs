//! Interactive chat loop.

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use docchat_core::FixedAnswer;
use docchat_session::{SendOutcome, Session, Template};

/// One line of REPL input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Message(String),
    Clear,
    /// Show models, or select one.
    Model(Option<String>),
    /// Show templates, select one, or `off` to drop the instruction.
    Template(Option<String>),
    Help,
    Quit,
    Unknown(String),
    Empty,
}

pub fn parse_line(line: &str) -> ReplCommand {
    let line = line.trim();
    if line.is_empty() {
        return ReplCommand::Empty;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return ReplCommand::Message(line.to_string());
    };

    let mut parts = rest.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or_default();
    let arg = parts
        .next()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string);

    match command {
        "clear" => ReplCommand::Clear,
        "model" => ReplCommand::Model(arg),
        "template" => ReplCommand::Template(arg),
        "help" | "?" => ReplCommand::Help,
        "quit" | "exit" | "q" => ReplCommand::Quit,
        other => ReplCommand::Unknown(other.to_string()),
    }
}

const HELP: &str = "Commands: /clear, /model [id], /template [name|off], /help, /quit";

/// Run the chat loop until `/quit` or end of input.
pub async fn run(session: &Session, mut instruction: Option<String>) -> Result<()> {
    let suggestions = session.sync.suggestions().await;
    println!("Ask anything about your documents. {}", HELP);
    println!("Suggestions:");
    for s in &suggestions {
        println!("  - {}", s);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_line(&line) {
            ReplCommand::Empty => {}
            ReplCommand::Quit => break,
            ReplCommand::Help => println!("{}", HELP),
            ReplCommand::Unknown(cmd) => println!("Unknown command /{}. {}", cmd, HELP),
            ReplCommand::Clear => {
                session.conversation.clear(&FixedAnswer(true)).await;
                for message in session.conversation.messages().await {
                    println!("{}", session.conversation.render_plain(&message).await);
                }
            }
            ReplCommand::Model(None) => {
                let selected = session.state.selected_model().await;
                for model in session.state.models().await.iter() {
                    let marker = if model.id == selected { "*" } else { " " };
                    println!("{} {} ({})", marker, model.display_name, model.id);
                }
            }
            ReplCommand::Model(Some(id)) => {
                if crate::commands::select_model(session, &id).await {
                    println!("Model set to {}", id);
                } else {
                    println!("Model set to {} (not in the server's list)", id);
                }
            }
            ReplCommand::Template(None) => {
                for template in Template::ALL {
                    println!("  {}: {}", template, template.instruction());
                }
            }
            ReplCommand::Template(Some(name)) if name == "off" => {
                instruction = None;
                println!("System instruction cleared");
            }
            ReplCommand::Template(Some(name)) => match name.parse::<Template>() {
                Ok(template) => {
                    instruction = Some(template.instruction().to_string());
                    println!("Using {} template", template);
                }
                Err(e) => println!("{}", e),
            },
            ReplCommand::Message(text) => {
                match session
                    .conversation
                    .send_message(&text, None, instruction.as_deref())
                    .await
                {
                    SendOutcome::Replied(reply) | SendOutcome::Failed(reply) => {
                        println!("{}", session.conversation.render_plain(&reply).await);
                    }
                    SendOutcome::Busy => println!("Still waiting for the previous answer"),
                    SendOutcome::Ignored => {}
                }
            }
        }
    }

    debug!(messages = session.conversation.messages().await.len(), "Chat session closed");
    Ok(())
}
