use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chat_backend::HttpChatBackend;
use chat_core::history::partition_this_week;
use chat_core::{ClientConfig, QuickAction, Role, UserIdentity};
use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::Colorize;
use session_manager::{
    ChatSessionManager, FileStateStorage, ManagerOptions, RejectReason, SendOutcome,
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_API_BASE: &str = "http://localhost:8080";

#[derive(Parser)]
#[command(name = "chat-cli")]
#[command(about = "Terminal client for the learning assistant chat")]
#[command(version)]
struct Cli {
    /// Chat service base URL
    #[arg(long, env = "CHAT_API_BASE")]
    api_base: Option<String>,

    /// User id sent when a session is created
    #[arg(long, env = "CHAT_USER_ID")]
    user_id: Option<String>,

    /// File holding the persisted session id and chat history
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Seconds to wait for the assistant to answer
    #[arg(long, default_value = "60")]
    timeout: u64,

    /// Enable debug mode
    #[arg(long, short, default_value = "false")]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start interactive chat
    Chat,
    /// Send a single message and print the reply
    Send {
        /// Message content
        message: String,
    },
    /// List past conversations
    History {
        /// Show the locally kept sent messages instead
        #[arg(long)]
        local: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_target(true)
                .with_line_number(true)
                .with_file(false),
        )
        .init();

    let mut config = ClientConfig::load();
    if let Some(api_base) = cli.api_base.clone() {
        config.api_base = Some(api_base);
    }
    if let Some(user_id) = cli.user_id.clone() {
        config.user_id = Some(user_id);
    }
    if let Some(path) = cli.state_file.clone() {
        config.storage_path = Some(path);
    }

    let api_base = config
        .api_base
        .clone()
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
    tracing::debug!(api_base = %api_base, state_file = %config.state_file_path().display(), "Client configured");

    let backend = Arc::new(HttpChatBackend::new(api_base));
    let manager = ChatSessionManager::new(
        backend.clone(),
        backend,
        Arc::new(FileStateStorage::new(config.state_file_path())),
        ManagerOptions::from_config(&config),
    );
    manager
        .load()
        .await
        .context("Failed to load persisted chat state")?;

    let timeout = Duration::from_secs(cli.timeout);
    let result = match cli.command {
        Commands::Chat => run_interactive_chat(&manager, timeout).await,
        Commands::Send { message } => {
            manager.set_input(message).await;
            let outcome = manager.submit().await?;
            report_exchange(&manager, outcome, timeout).await
        }
        Commands::History { local: true } => {
            print_local_history(&manager).await;
            Ok(())
        }
        Commands::History { local: false } => print_remote_history(&manager).await,
    };

    manager.end().await?;
    result
}

async fn run_interactive_chat(manager: &ChatSessionManager, timeout: Duration) -> anyhow::Result<()> {
    println!("{}", "🎓 Learning Assistant Chat".cyan().bold());
    println!(
        "{}",
        "Commands: /quick <option>, /new, /history, /clear-history, /quit".dimmed()
    );
    let options: Vec<&str> = QuickAction::ALL.iter().map(|a| a.as_str()).collect();
    println!("{}", format!("Quick replies: {}", options.join(" | ")).dimmed());
    println!();

    loop {
        print!("{} ", "You:".cyan().bold());
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim_end_matches(['\r', '\n']);

        let outcome = match line.trim() {
            "/quit" | "/exit" => break,
            "/new" => {
                manager.new_conversation().await?;
                println!("{}", "✨ New conversation".cyan());
                continue;
            }
            "/history" => {
                print_local_history(manager).await;
                continue;
            }
            "/clear-history" => {
                manager.clear_chat_history().await?;
                println!("{}", "🗑  Chat history cleared".cyan());
                continue;
            }
            command if command.starts_with("/quick") => {
                let option = command.trim_start_matches("/quick").trim();
                let action = match option.parse::<QuickAction>() {
                    Ok(action) => action,
                    Err(e) => {
                        println!("{}", format!("❌ {}", e).red());
                        continue;
                    }
                };
                manager.quick_reply(action).await
            }
            _ => {
                manager.set_input(line).await;
                manager.submit().await
            }
        };

        match outcome {
            Ok(outcome) => {
                if let Err(e) = report_exchange(manager, outcome, timeout).await {
                    println!("{}", format!("❌ Error: {}", e).red());
                }
            }
            Err(e) => println!("{}", format!("❌ Error: {}", e).red()),
        }
        println!();
    }

    println!("{}", "👋 Goodbye!".cyan());
    Ok(())
}

/// Wait for the assistant's answer to a send and print it.
async fn report_exchange(
    manager: &ChatSessionManager,
    outcome: SendOutcome,
    timeout: Duration,
) -> anyhow::Result<()> {
    match outcome {
        SendOutcome::Rejected(RejectReason::EmptyInput) => {
            let state = manager.snapshot().await;
            let error = state.error.unwrap_or_else(|| "Please enter a message".to_string());
            println!("{}", format!("⚠️  {}", error).yellow());
            return Ok(());
        }
        SendOutcome::Rejected(reason) => {
            println!("{}", format!("⚠️  Not sent: {:?}", reason).yellow());
            return Ok(());
        }
        SendOutcome::Created(handle) => {
            tracing::debug!(session_id = handle.session_id(), "Session created");
        }
        SendOutcome::Sent(_) => {}
    }

    if !manager.wait_for_idle(timeout).await {
        anyhow::bail!("No reply within {}s", timeout.as_secs());
    }

    let state = manager.snapshot().await;
    if let Some(error) = state.error {
        anyhow::bail!(error);
    }
    match state.messages.last() {
        Some(message) if message.role == Role::Assistant => {
            println!("{}", "Assistant:".green().bold());
            println!("{}", message.text());
        }
        _ => println!("{}", "(no reply)".dimmed()),
    }
    Ok(())
}

async fn print_local_history(manager: &ChatSessionManager) {
    let history = manager.chat_history().await;
    if history.is_empty() {
        println!("{}", "No messages sent yet".dimmed());
        return;
    }
    for entry in history.entries() {
        println!(
            "{} {} {}",
            format!("{:>3}", entry.id).dimmed(),
            entry.timestamp.format("%Y-%m-%d %H:%M").to_string().dimmed(),
            entry.message
        );
    }
}

async fn print_remote_history(manager: &ChatSessionManager) -> anyhow::Result<()> {
    let user: UserIdentity = manager
        .chat_user()
        .await
        .context("No user configured; pass --user-id or set CHAT_USER_ID")?;

    let records = manager.fetch_chat_history(&user.id).await?;
    if records.is_empty() {
        println!("{}", "No past conversations".dimmed());
        return Ok(());
    }

    let (this_week, older) = partition_this_week(&records, Utc::now());
    for (heading, group) in [("This Week", this_week), ("Older", older)] {
        if group.is_empty() {
            continue;
        }
        println!("{}", heading.cyan().bold());
        for record in group {
            println!("  {} {}", record.title, format!("({})", record.id).dimmed());
            if let Some(description) = &record.description {
                println!("    {}", description.dimmed());
            }
        }
    }
    Ok(())
}
