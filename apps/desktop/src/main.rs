use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    suggester_from_settings, AdminConsole, ClientSettings, ParticipantSession, PollClient,
    RemovedFromSession, SessionFeed, SuggestionController,
};
use shared::{
    domain::SessionCode,
    protocol::{CreatePresentationRequest, ServerEvent},
};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod admin;
mod render;

#[derive(Parser, Debug)]
#[command(about = "Live poll presenter and participant console")]
struct Cli {
    /// Poll server base URL; falls back to APP__SERVER_URL.
    #[arg(long)]
    server_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run an admin console: create, present and archive sessions.
    Admin {
        /// Presentation JSON ({"title", "questions": [{"text", "options"}]}) to load at start.
        #[arg(long)]
        file: Option<PathBuf>,
        /// Generate the first presentation from a topic instead.
        #[arg(long, conflicts_with = "file")]
        topic: Option<String>,
    },
    /// Join a session as a participant and vote from the terminal.
    Join {
        #[arg(long)]
        name: String,
        #[arg(long)]
        code: String,
    },
    /// Follow the live results of a session.
    Watch { code: String },
}

type StdinLines = Lines<BufReader<Stdin>>;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();
    let cli = Cli::parse();

    let mut settings = ClientSettings::from_env()?;
    if let Some(url) = cli.server_url {
        settings.server_url = url;
    }
    let client = PollClient::new(settings.server_url.clone());
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    match cli.command {
        Command::Admin { file, topic } => {
            let suggestions = SuggestionController::new(
                suggester_from_settings(&settings),
                settings.suggestion_timeout,
            );
            let mut console = AdminConsole::login(client.clone()).await?;
            println!("admin console {}", console.console_id());
            if let Some(path) = file {
                let req = load_presentation(&path)?;
                console.create(&req.title, req.questions).await?;
            } else if let Some(topic) = topic {
                let suggestion = suggestions.suggest(&topic).await?;
                console.create_from_suggestion(suggestion).await?;
            }
            admin::run(
                &client,
                &mut console,
                Arc::new(suggestions),
                &settings,
                &mut stdin,
            )
            .await
        }
        Command::Join { name, code } => {
            let code = SessionCode::normalized(&code);
            let session = ParticipantSession::join(client.clone(), &name, &code).await?;
            println!("joined {} as {}", session.session_id(), session.handle().name);
            run_participant(&client, session, &settings, &mut stdin).await
        }
        Command::Watch { code } => {
            let code = SessionCode::normalized(&code);
            let mut feed = client.watch(&code, settings.poll_interval).await;
            watch(&mut feed).await
        }
    }
}

fn load_presentation(path: &Path) -> Result<CreatePresentationRequest> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("invalid presentation in {}", path.display()))
}

async fn run_participant(
    client: &PollClient,
    mut session: ParticipantSession,
    settings: &ClientSettings,
    stdin: &mut StdinLines,
) -> Result<()> {
    let mut feed = client
        .watch(session.session_id().as_str(), settings.poll_interval)
        .await;
    render::print(&render::participant_screen(session.mode(), session.snapshot()));

    loop {
        tokio::select! {
            event = feed.next() => {
                let Some(event) = event else {
                    println!("connection to the session closed");
                    return Ok(());
                };
                let before = session.mode();
                let question = session.current_question().map(|q| q.id.clone());
                if let Some(mode) = session.apply_event(&event)? {
                    let moved = session.current_question().map(|q| q.id.clone()) != question;
                    if mode != before || moved {
                        render::print(&render::participant_screen(mode, session.snapshot()));
                    }
                    if session.snapshot().is_none() {
                        return Ok(());
                    }
                }
            }
            line = stdin.next_line() => {
                let Some(line) = line? else { return Ok(()) };
                let line = line.trim();
                if line.eq_ignore_ascii_case("quit") {
                    session.leave();
                    return Ok(());
                }
                let Some(option_id) = line
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|index| session.current_question()?.options.get(index))
                    .map(|option| option.id.clone())
                else {
                    println!("enter an option number, or 'quit'");
                    continue;
                };
                match session.vote(&option_id).await {
                    Ok(_) => render::print(&render::participant_screen(
                        session.mode(),
                        session.snapshot(),
                    )),
                    Err(err) if err.is::<RemovedFromSession>() => {
                        println!("{err}");
                        return Ok(());
                    }
                    Err(err) => {
                        warn!(%err, "vote failed");
                        println!("vote failed: {err}");
                    }
                }
            }
        }
    }
}

async fn watch(feed: &mut SessionFeed) -> Result<()> {
    while let Some(event) = feed.next().await {
        match event {
            ServerEvent::SessionUpdated { snapshot } => {
                render::print(&render::results(&snapshot));
            }
            ServerEvent::SessionClosed { session_id } => {
                println!("session {session_id} has ended");
                break;
            }
            ServerEvent::Error(err) => {
                println!("{}", err.message);
                break;
            }
        }
    }
    Ok(())
}
