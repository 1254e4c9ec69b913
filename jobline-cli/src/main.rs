use anyhow::{bail, Context, Result};
use clap::Parser;
use jobline_core::config::Config;
use jobline_core::conversation::ConversationController;
use jobline_core::directory::{fetch_counterparts, HttpDirectoryService};
use jobline_core::history::HttpHistoryStore;
use jobline_core::logging::{init_logging_with_config, LogConfig, LogLevel};
use jobline_core::relay::{RelayChannel, RelayEvent, WsRelayChannel};
use jobline_core::{Counterpart, CounterpartKind, SessionContext, UserId};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "jobline")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Set the log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    /// Enable JSON formatted logging
    #[arg(long)]
    json_logs: bool,

    /// Current user's id (or set JOBLINE_USER_ID)
    #[arg(long, env = "JOBLINE_USER_ID")]
    user_id: String,

    /// Current user's display name (or set JOBLINE_USER_NAME)
    #[arg(long, env = "JOBLINE_USER_NAME")]
    user_name: String,

    /// Current user's account type: jobseeker or employer
    #[arg(long, env = "JOBLINE_USER_KIND", default_value = "jobseeker")]
    user_kind: String,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser, Debug)]
enum Command {
    /// List the counterparts you can message
    Users,

    /// Open a conversation with a counterpart
    Chat {
        /// Counterpart user id
        #[arg(long)]
        with: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = LogLevel::from_str(&args.log_level).unwrap_or_else(|| {
        eprintln!("Invalid log level '{}', using 'warn'", args.log_level);
        LogLevel::Warn
    });
    init_logging_with_config(LogConfig::new(log_level).json_format(args.json_logs))?;

    let config = Config::from_env().context("loading configuration")?;

    let kind = match args.user_kind.as_str() {
        "jobseeker" => CounterpartKind::JobSeeker,
        "employer" => CounterpartKind::Employer,
        other => bail!("unknown user kind: {other} (expected jobseeker or employer)"),
    };
    let session = SessionContext::new(UserId::new(args.user_id), args.user_name, kind);

    match args.command {
        Command::Users => run_users(config, session).await,
        Command::Chat { with } => run_chat(config, session, with).await,
    }
}

async fn run_users(config: Config, session: SessionContext) -> Result<()> {
    let directory =
        HttpDirectoryService::new(config.api.base_url.clone(), config.api.request_timeout)?;
    let counterparts = fetch_counterparts(&directory, &session).await?;

    if counterparts.is_empty() {
        println!("No users available");
        return Ok(());
    }

    for counterpart in counterparts {
        println!(
            "{:<28} {:<10} {}",
            counterpart.id(),
            counterpart.kind(),
            counterpart.display_name()
        );
    }

    Ok(())
}

async fn run_chat(config: Config, session: SessionContext, with: String) -> Result<()> {
    let directory =
        HttpDirectoryService::new(config.api.base_url.clone(), config.api.request_timeout)?;
    let counterpart = find_counterpart(&directory, &session, &with).await?;

    let relay = Arc::new(WsRelayChannel::connect(config.relay.clone()));
    wait_for_connection(relay.as_ref(), Duration::from_secs(10)).await?;

    let history = Arc::new(HttpHistoryStore::new(
        config.api.base_url.clone(),
        config.api.request_timeout,
    )?);

    let controller = Arc::new(ConversationController::new(
        session,
        history,
        relay.clone(),
        config.chat.clone(),
    ));
    let _pump = controller.spawn_event_pump();

    let name = counterpart.display_name().to_string();
    controller.select_counterpart(counterpart).await?;

    let snapshot = controller.snapshot().await;
    println!("-- Conversation with {name} --");
    for message in &snapshot.messages {
        println!("[{}] {}", message.sender_name, message.body);
    }
    println!("-- type a message and press enter; /quit to exit --");

    let mut events = relay.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim() == "/quit" {
                    break;
                }
                match controller.send(&line).await {
                    Ok(Some(_)) => {}
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "Message not sent"),
                }
            }
            event = events.recv() => {
                match event {
                    Ok(RelayEvent::MessageReceived { message, .. }) => {
                        println!("[{}] {}", message.sender_name, message.body);
                    }
                    Ok(RelayEvent::TypingReceived { .. }) => {
                        println!("({name} is typing...)");
                    }
                    Ok(RelayEvent::Disconnected) => {
                        println!("(connection lost; messages cannot be sent)");
                    }
                    Ok(RelayEvent::Connected) => {
                        // Room subscriptions do not survive a reconnect.
                        println!("(reconnected; rejoining conversation)");
                        let snapshot = controller.snapshot().await;
                        if let Some(counterpart) = snapshot.counterpart {
                            if let Err(e) = controller.select_counterpart(counterpart).await {
                                warn!(error = %e, "Rejoin failed");
                            }
                        }
                    }
                    Err(_) => break,
                }
            }
        }
    }

    controller.deselect().await;
    info!("Chat session closed");
    Ok(())
}

async fn find_counterpart(
    directory: &HttpDirectoryService,
    session: &SessionContext,
    with: &str,
) -> Result<Counterpart> {
    let counterparts = fetch_counterparts(directory, session).await?;
    counterparts
        .into_iter()
        .find(|c| c.id().as_str() == with)
        .with_context(|| format!("no messageable user with id {with}"))
}

async fn wait_for_connection(relay: &WsRelayChannel, timeout: Duration) -> Result<()> {
    let deadline = tokio::time::Instant::now() + timeout;
    while !relay.is_connected() {
        if tokio::time::Instant::now() > deadline {
            bail!("could not reach the relay");
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    Ok(())
}
