mod config;
mod session_file;
mod terminal;

use std::io::Stdout;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use chatline_auth::LocalIdentityProvider;
use chatline_core::{ChatController, IntentHandler};
use chatline_db::{Database, SqliteStore};
use chatline_types::events::Intent;

use config::{DEFAULT_LOG_FILTER, Settings};
use session_file::SessionFile;
use terminal::{Command, TerminalPresenter};

type Controller = ChatController<TerminalPresenter<Stdout>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr so they stay out of the rendered conversation
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();

    let settings = Settings::from_env()?;
    if settings.uses_default_secret() {
        warn!("CHATLINE_JWT_SECRET is not set, using the development secret");
    }

    let db = Arc::new(
        Database::open(&settings.db_path)
            .with_context(|| format!("Failed to open {}", settings.db_path.display()))?,
    );
    info!(path = %settings.db_path.display(), "Database ready");

    let store = Arc::new(SqliteStore::new(db.clone()));
    let identity = Arc::new(LocalIdentityProvider::new(
        db,
        settings.jwt_secret.clone(),
        settings.session_ttl,
    ));
    let sessions = SessionFile::new(settings.session_file.clone());

    let mut controller = ChatController::new(
        identity,
        store.clone(),
        store,
        &settings.client,
        TerminalPresenter::new(std::io::stdout()),
    );

    let saved = sessions.load().unwrap_or_else(|e| {
        warn!(error = %e, "Ignoring unreadable session file");
        None
    });
    controller.start(saved.as_deref()).await;
    let mut persisted = saved;
    sync_session(&controller, &sessions, &mut persisted);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read input")? else {
                    break;
                };
                let in_conversation = controller.open_conversation().is_some();

                match terminal::parse(&line, in_conversation) {
                    Ok(None) => {}
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(Command::Help)) => controller.presenter_mut().show_help(),
                    Ok(Some(Command::Open(target))) => {
                        let contact_id = terminal::resolve_contact(&target, controller.contacts());
                        handle(&mut controller, Intent::SelectContact { contact_id }).await;
                    }
                    Ok(Some(Command::Intent(intent))) => {
                        handle(&mut controller, intent).await;
                        sync_session(&controller, &sessions, &mut persisted);
                    }
                    Err(usage) => controller.presenter_mut().show_usage(&usage),
                }
            }
            Some(messages) = controller.next_snapshot() => {
                controller.render_messages(&messages);
            }
        }
    }

    info!("Exiting");
    Ok(())
}

async fn handle(controller: &mut Controller, intent: Intent) {
    // Failures were already rendered by the presenter
    let _ = controller.dispatch(intent).await;
}

/// Keep the session file in step with the controller's session.
fn sync_session(controller: &Controller, sessions: &SessionFile, persisted: &mut Option<String>) {
    let current = controller.session();
    if current.map(|s| &s.token) == persisted.as_ref() {
        return;
    }

    let result = match current {
        Some(session) => sessions.save(session),
        None => sessions.clear(),
    };
    match result {
        Ok(()) => *persisted = current.map(|s| s.token.clone()),
        Err(e) => warn!(error = %e, "Failed to update session file"),
    }
}
