use std::{path::Path, sync::Arc};

use anyhow::Result;
use client_core::{
    AdminConsole, ClientSettings, PollClient, SessionFeed, SuggestionController, SuggestionError,
};
use shared::protocol::SuggestedPresentation;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::{load_presentation, render, StdinLines};

const HELP: &str = "commands: create <file> | suggest <topic> | start | next | prev | reset | \
                    new | results | history | help | quit";

#[derive(Debug, PartialEq, Eq)]
pub enum AdminCommand {
    Create(String),
    Suggest(String),
    Start,
    Next,
    Previous,
    Reset,
    StartNew,
    Results,
    History,
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Option<AdminCommand> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let command = match (word.to_ascii_lowercase().as_str(), rest) {
        ("create", path) if !path.is_empty() => AdminCommand::Create(path.to_string()),
        ("suggest", topic) if !topic.is_empty() => AdminCommand::Suggest(topic.to_string()),
        ("start", "") => AdminCommand::Start,
        ("next", "") => AdminCommand::Next,
        ("prev" | "previous", "") => AdminCommand::Previous,
        ("reset", "") => AdminCommand::Reset,
        ("new", "") => AdminCommand::StartNew,
        ("results", "") => AdminCommand::Results,
        ("history", "") => AdminCommand::History,
        ("help", "") => AdminCommand::Help,
        ("quit" | "exit", "") => AdminCommand::Quit,
        _ => return None,
    };
    Some(command)
}

pub async fn run(
    client: &PollClient,
    console: &mut AdminConsole,
    suggestions: Arc<SuggestionController>,
    settings: &ClientSettings,
    stdin: &mut StdinLines,
) -> Result<()> {
    if !suggestions.is_available() {
        println!("suggestions disabled: set GEMINI_API_KEY to enable 'suggest'");
    }
    println!("{HELP}");
    show(console);

    let mut feed = watch_current(client, console, settings).await;
    let (suggestion_tx, mut suggestion_rx) =
        mpsc::channel::<Result<SuggestedPresentation, SuggestionError>>(1);

    loop {
        tokio::select! {
            event = next_event(&mut feed) => {
                match event {
                    Some(event) => {
                        if console.apply_event(&event) {
                            show(console);
                        }
                    }
                    None => feed = None,
                }
            }
            Some(result) = suggestion_rx.recv() => {
                match result {
                    Ok(suggestion) => {
                        info!(title = %suggestion.title, "suggestion ready");
                        if let Err(err) = console.create_from_suggestion(suggestion).await {
                            println!("could not create suggested presentation: {err}");
                        } else {
                            feed = watch_current(client, console, settings).await;
                            show(console);
                        }
                    }
                    Err(err) => println!("{err}"),
                }
            }
            line = stdin.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                let Some(command) = parse_command(&line) else {
                    println!("{HELP}");
                    continue;
                };
                let before = console.session().map(|s| s.presentation.id.clone());
                match command {
                    AdminCommand::Quit => break,
                    AdminCommand::Help => println!("{HELP}"),
                    AdminCommand::Suggest(topic) => {
                        let suggestions = suggestions.clone();
                        let tx = suggestion_tx.clone();
                        if suggestions.is_in_flight() {
                            println!("{}", SuggestionError::InFlight);
                            continue;
                        }
                        println!("generating a presentation about '{topic}'...");
                        tokio::spawn(async move {
                            let _ = tx.send(suggestions.suggest(&topic).await).await;
                        });
                    }
                    AdminCommand::History => match console.open_history().await {
                        Ok(records) => {
                            render::print(&render::history(&records));
                            console.close_history()?;
                        }
                        Err(err) => println!("{err}"),
                    },
                    command => {
                        if let Err(err) = execute(console, command).await {
                            println!("{err}");
                        }
                        show(console);
                    }
                }
                if console.session().map(|s| s.presentation.id.clone()) != before {
                    feed = watch_current(client, console, settings).await;
                }
            }
        }
    }

    console.logout();
    Ok(())
}

async fn execute(console: &mut AdminConsole, command: AdminCommand) -> Result<()> {
    match command {
        AdminCommand::Create(path) => {
            let req = load_presentation(Path::new(&path))?;
            console.create(&req.title, req.questions).await
        }
        AdminCommand::Start => console.start().await,
        AdminCommand::Next => console.next().await,
        AdminCommand::Previous => console.previous().await,
        AdminCommand::Reset => console.reset().await,
        AdminCommand::StartNew => console.start_new().await,
        AdminCommand::Results => console.refresh().await,
        other => {
            warn!(?other, "command is handled by the console loop");
            Ok(())
        }
    }
}

fn show(console: &AdminConsole) {
    match console.session() {
        Some(snapshot) => render::print(&render::results(snapshot)),
        None => println!(
            "no presentation yet ({} archived); use 'create' or 'suggest'",
            console.state().archived_count
        ),
    }
}

async fn watch_current(
    client: &PollClient,
    console: &AdminConsole,
    settings: &ClientSettings,
) -> Option<SessionFeed> {
    let code = console.session()?.presentation.id.clone();
    Some(client.watch(code.as_str(), settings.poll_interval).await)
}

async fn next_event(feed: &mut Option<SessionFeed>) -> Option<shared::protocol::ServerEvent> {
    match feed {
        Some(feed) => feed.next().await,
        None => std::future::pending().await,
    }
}
