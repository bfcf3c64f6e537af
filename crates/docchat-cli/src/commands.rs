//! Subcommand implementations.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::broadcast::error::RecvError;

use docchat_core::{FixedAnswer, IgnoreRules, Prompt, UploadStatus};
use docchat_ingest::{FileSource, UploadConfig, UploadEvent, UploadOrchestrator};
use docchat_session::{FileListing, SendOutcome, Session, Template};

use crate::prompt::StdinPrompt;

fn confirmer(yes: bool) -> Box<dyn Prompt> {
    if yes {
        Box::new(FixedAnswer(true))
    } else {
        Box::new(StdinPrompt)
    }
}

/// Load the store list so the server's active store is known.
async fn sync_stores(session: &Session) -> Result<()> {
    session
        .sync
        .list_stores()
        .await
        .context("Failed to load stores")?;
    Ok(())
}

pub async fn stores(session: &Session) -> Result<()> {
    let stores = session.sync.list_stores().await?;
    if stores.is_empty() {
        println!("No knowledge bases yet. Create one with `docchat create-store <name>`.");
        return Ok(());
    }
    let current = session.state.current_store_id().await;
    for store in stores {
        let marker = if current.as_deref() == Some(store.id.as_str()) {
            "*"
        } else {
            " "
        };
        println!("{} {}  {}", marker, store.label(), store.id);
    }
    Ok(())
}

pub async fn create_store(session: &Session, name: &str) -> Result<()> {
    match session.sync.create_store(name).await? {
        Some(created) => println!("Created {} ({}) and made it active", created.name, created.id),
        None => bail!("A store name is required"),
    }
    Ok(())
}

pub async fn delete_store(session: &Session, store_id: &str, yes: bool) -> Result<()> {
    sync_stores(session).await?;
    let prompt = confirmer(yes);
    if session.sync.delete_store(store_id, prompt.as_ref()).await? {
        println!("Deleted {}", store_id);
    } else {
        println!("Cancelled");
    }
    Ok(())
}

pub async fn use_store(session: &Session, store_id: &str) -> Result<()> {
    let listing = session.sync.set_active_store(store_id).await?;
    println!("Active store: {}", store_id);
    print_listing(&listing);
    Ok(())
}

pub async fn files(session: &Session, store_id: Option<String>) -> Result<()> {
    let listing = match store_id {
        Some(id) => session.sync.list_files(&id).await,
        None => {
            sync_stores(session).await?;
            if session.state.current_store_id().await.is_none() {
                bail!("No active store. Pick one with `docchat use-store <id>`.");
            }
            session.state.file_listing().await
        }
    };
    print_listing(&listing);
    Ok(())
}

fn print_listing(listing: &FileListing) {
    match listing {
        FileListing::NoStore => println!("No active store"),
        FileListing::Empty => println!("No files in this store"),
        FileListing::Error(e) => println!("Could not load files: {}", e),
        FileListing::Loaded(files) => {
            for file in files.iter() {
                println!("  {}", file.name);
            }
        }
    }
}

pub async fn upload(session: &Session, paths: Vec<PathBuf>, concurrency: Option<usize>) -> Result<()> {
    sync_stores(session).await?;

    let mut config = UploadConfig::from_env();
    if let Some(max) = concurrency {
        config = config.with_max_concurrent(max);
    }
    let orchestrator = UploadOrchestrator::new(session.sync.clone(), IgnoreRules::from_env(), config)
        .with_conversation(session.conversation.clone());

    let mut sources = Vec::new();
    let mut skipped = 0;
    for path in paths {
        let metadata = tokio::fs::metadata(&path)
            .await
            .with_context(|| format!("Cannot read {}", path.display()))?;
        if metadata.is_dir() {
            let (found, stats) = orchestrator.collect_tree(&path).await?;
            skipped += stats.ignored_files;
            sources.extend(found);
        } else {
            sources.push(FileSource::from_path(&path));
        }
    }

    let mut events = orchestrator.events();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(UploadEvent::Started { name, .. }) => println!("uploading {}", name),
                Ok(UploadEvent::Completed { name, .. }) => println!("done      {}", name),
                Ok(UploadEvent::Failed { name, error, .. }) => {
                    println!("failed    {}: {}", name, error)
                }
                Ok(UploadEvent::BatchFinished { .. }) => break,
                Ok(_) => {}
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    let result = orchestrator.upload_files(sources).await;
    drop(orchestrator);
    let _ = printer.await;
    let mut report = result?;
    report.ignored += skipped;

    if report.is_empty() {
        println!("Nothing to upload ({} ignored)", report.ignored);
        return Ok(());
    }

    println!(
        "{} uploaded, {} failed, {} ignored",
        report.succeeded, report.failed, report.ignored
    );
    for task in report.tasks.iter().filter(|t| t.status == UploadStatus::Error) {
        println!(
            "  {}: {}",
            task.name,
            task.error.as_deref().unwrap_or("unknown error")
        );
    }
    if let Some(welcome) = &report.welcome {
        println!("{}", session.conversation.render_plain(welcome).await);
    }
    if !report.suggestions.is_empty() {
        println!("Suggestions:");
        for s in &report.suggestions {
            println!("  - {}", s);
        }
    }
    if report.failed > 0 {
        bail!("{} of {} uploads failed", report.failed, report.tasks.len());
    }
    Ok(())
}

pub async fn models(session: &Session) -> Result<()> {
    let models = match session.sync.refresh_models().await {
        Ok(models) => models,
        Err(e) => {
            eprintln!("Could not fetch models ({}); showing defaults", e);
            session.state.models().await
        }
    };
    let selected = session.state.selected_model().await;
    for model in models.iter() {
        let marker = if model.id == selected { "*" } else { " " };
        println!("{} {}  {}", marker, model.display_name, model.id);
    }
    Ok(())
}

pub async fn set_key(session: &Session, key: &str) -> Result<()> {
    if session.sync.set_api_key(key).await? {
        println!("API key saved");
        Ok(())
    } else {
        bail!("An API key is required")
    }
}

pub async fn has_key(session: &Session) -> Result<()> {
    if session.sync.has_api_key().await? {
        println!("An API key is configured");
    } else {
        println!("No API key configured. Set one with `docchat set-key <key>`.");
    }
    Ok(())
}

pub async fn suggest(session: &Session) -> Result<()> {
    sync_stores(session).await?;
    for question in session.sync.suggestions().await {
        println!("- {}", question);
    }
    Ok(())
}

/// Resolve `--template` / `--system` into one instruction.
pub fn instruction(template: Option<Template>, system: Option<String>) -> Option<String> {
    system.or_else(|| template.map(|t| t.instruction().to_string()))
}

pub async fn ask(
    session: &Session,
    question: &str,
    model: Option<String>,
    instruction: Option<String>,
) -> Result<()> {
    sync_stores(session).await?;
    if let Some(model) = model {
        select_model(session, &model).await;
    }

    match session
        .conversation
        .send_message(question, None, instruction.as_deref())
        .await
    {
        SendOutcome::Replied(reply) => {
            println!("{}", session.conversation.render_plain(&reply).await);
            Ok(())
        }
        SendOutcome::Failed(reply) => bail!("{}", reply.text),
        SendOutcome::Ignored => bail!("A question is required"),
        SendOutcome::Busy => bail!("Another request is in flight"),
    }
}

pub async fn chat(session: &Session, model: Option<String>, instruction: Option<String>) -> Result<()> {
    sync_stores(session).await?;
    if let Err(e) = session.sync.refresh_models().await {
        eprintln!("Could not fetch models ({}); using defaults", e);
    }
    if let Some(model) = model {
        select_model(session, &model).await;
    }
    crate::repl::run(session, instruction).await
}

/// Select `model` for chat, shared by `--model` and the REPL's `/model`.
///
/// Ids missing from the model list are still used, since the server may
/// offer models the list does not show. Returns whether the id was listed.
pub async fn select_model(session: &Session, model: &str) -> bool {
    session.sync.load_placeholder_models().await;
    if session.state.select_model(model).await {
        true
    } else {
        session.state.set_selected_model(model).await;
        false
    }
}

pub async fn shutdown(session: &Session, yes: bool) -> Result<()> {
    let prompt = confirmer(yes);
    if session.sync.shutdown_server(prompt.as_ref()).await {
        println!("Shutdown requested");
    } else {
        println!("Cancelled");
    }
    Ok(())
}

/// Build a session for `api`, shared by every subcommand.
pub fn session(api: Arc<dyn docchat_core::KnowledgeApi>) -> Session {
    Session::new(api, docchat_session::SessionConfig::from_env())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docchat_core::mock::MockApi;
    use docchat_core::ModelDescriptor;

    #[test]
    fn test_system_overrides_template() {
        assert_eq!(
            instruction(Some(Template::Legal), Some("Be brief.".to_string())).as_deref(),
            Some("Be brief.")
        );
        assert_eq!(
            instruction(Some(Template::Summary), None).as_deref(),
            Some(Template::Summary.instruction())
        );
        assert!(instruction(None, None).is_none());
    }

    #[tokio::test]
    async fn test_select_unknown_model_still_used() {
        let session = session(Arc::new(MockApi::new()));
        assert!(!select_model(&session, "models/custom").await);
        assert_eq!(session.state.selected_model().await, "models/custom");
    }

    #[tokio::test]
    async fn test_select_known_model() {
        let session = session(Arc::new(MockApi::new()));
        session
            .state
            .replace_models(vec![
                ModelDescriptor::new("a", "A"),
                ModelDescriptor::new("b", "B"),
            ])
            .await;
        assert!(select_model(&session, "b").await);
        assert_eq!(session.state.selected_model().await, "b");
    }

    #[tokio::test]
    async fn test_ask_surfaces_server_error() {
        let api = MockApi::new().with_chat_error("rate limited");
        let session = session(Arc::new(api));
        let err = ask(&session, "hi", None, None).await.unwrap_err();
        assert_eq!(err.to_string(), "Error: rate limited");
    }

    #[tokio::test]
    async fn test_create_store_requires_name() {
        let session = session(Arc::new(MockApi::new()));
        assert!(create_store(&session, " ").await.is_err());
        assert!(create_store(&session, "Docs").await.is_ok());
    }
}
