use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::Parser;
use session_client::{
    ChannelUiPort, HtmlSessionContext, PhoenixConnector, SessionChannelBridge, SessionContext,
    StaticSessionContext, UiIntents,
};
use shared::domain::SessionId;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod terminal;

use config::{load_settings, Settings};
use terminal::{parse_input, render_event, InputCommand};

#[derive(Parser, Debug)]
#[command(about = "Join a voting session channel and relay it through the terminal")]
struct Args {
    #[arg(long, default_value = "session.toml")]
    config: PathBuf,
    #[arg(long)]
    socket_url: Option<String>,
    #[arg(long)]
    session_id: Option<String>,
    #[arg(long)]
    page_url: Option<String>,
    #[arg(long)]
    nick: Option<String>,
}

impl Args {
    fn apply(self, settings: &mut Settings) {
        if let Some(v) = self.socket_url {
            settings.socket_url = v;
        }
        if let Some(v) = self.session_id {
            settings.session_id = Some(v);
        }
        if let Some(v) = self.page_url {
            settings.page_url = Some(v);
        }
        if let Some(v) = self.nick {
            settings.nick = Some(v);
        }
    }
}

async fn resolve_context(settings: &Settings) -> Result<Box<dyn SessionContext>> {
    if let Some(session_id) = &settings.session_id {
        return Ok(Box::new(StaticSessionContext::new(Some(SessionId::from(
            session_id.as_str(),
        )))));
    }
    if let Some(page_url) = &settings.page_url {
        let http = reqwest::Client::new();
        return Ok(Box::new(HtmlSessionContext::fetch(&http, page_url).await?));
    }
    Ok(Box::new(StaticSessionContext::empty()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut settings = load_settings(&args.config)?;
    args.apply(&mut settings);

    let context = resolve_context(&settings).await?;
    let connector = PhoenixConnector::new(settings.socket_url.clone())
        .with_heartbeat_interval(settings.heartbeat_interval());
    let (ui, mut ui_events) = ChannelUiPort::new();
    let (intents_tx, intents) = UiIntents::channel();

    let Some(mut bridge) =
        SessionChannelBridge::launch(context.as_ref(), &connector, Arc::new(ui), intents).await?
    else {
        info!("no session identifier found; nothing to join");
        return Ok(());
    };
    info!(topic = bridge.topic(), "session: bridge started");

    if let Some(nick) = settings.nick.clone() {
        intents_tx.change_nick(nick)?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            Some(event) = ui_events.recv() => println!("{}", render_event(&event)),
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match parse_input(&line) {
                    Ok(InputCommand::ChangeNick(nick)) => intents_tx.change_nick(nick)?,
                    Ok(InputCommand::VotingAction(payload)) => intents_tx.voting_action(payload)?,
                    Ok(InputCommand::Quit) => break,
                    Ok(InputCommand::Empty) => {}
                    Err(err) => warn!("ignoring input: {err:#}"),
                }
            }
            _ = bridge.closed() => {
                warn!(topic = bridge.topic(), "session: connection closed");
                break;
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}
