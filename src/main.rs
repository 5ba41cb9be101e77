//! doppel CLI entry point.
//!
//! Provides `start` to run the Telegram bot, `members` to list registered
//! members, and `prompt` to print the persona prompt for a member without
//! calling the generation endpoint.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use doppel::config::Config;
use doppel::history::{HistorySelector, SelectError};
use doppel::membership::MembershipCache;
use doppel::persona::PersonaService;
use doppel::providers::openai::OpenAiCompatClient;
use doppel::providers::GenerationClient;
use doppel::store::sqlite::{SqliteHistoryStore, SqliteMembershipStore};
use doppel::store::{HistoryStore, MembershipStore};
use doppel::{db, logging, prompt, telegram};

/// doppel: a chat bot that speaks in its members' voices.
#[derive(Parser)]
#[command(name = "doppel", version, about)]
struct Cli {
    /// Path to a config file (defaults to `$DOPPEL_CONFIG_PATH` or `./config.toml`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Run the Telegram bot.
    Start,
    /// List registered members.
    Members,
    /// Print the persona prompt that would be sent for a member.
    Prompt {
        /// Member id (Telegram user id).
        #[arg(long)]
        member: String,
        /// Scope key (Telegram chat id) to prefer.
        #[arg(long)]
        scope: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e).context("failed to load .env");
        }
    }

    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Command::Start => handle_start(config).await,
        Command::Members => handle_members(config).await,
        Command::Prompt { member, scope } => handle_prompt(config, &member, scope.as_deref()).await,
    }
}

/// Run the bot until Ctrl+C.
async fn handle_start(config: Config) -> anyhow::Result<()> {
    let _logging_guard = match &config.logging.dir {
        Some(dir) => Some(logging::init_production(dir, &config.logging.level)?),
        None => {
            logging::init_cli(&config.logging.level);
            None
        }
    };

    let token = config
        .telegram
        .bot_token
        .clone()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            anyhow::anyhow!("no Telegram bot token; set DOPPEL_TELEGRAM_TOKEN or [telegram].bot_token")
        })?;

    let pool = db::open_pool(
        &config.database.resolved_path()?,
        config.database.max_connections,
    )
    .await?;

    let member_store: Arc<dyn MembershipStore> = Arc::new(SqliteMembershipStore::new(pool.clone()));
    let membership = Arc::new(
        MembershipCache::bootstrap(member_store)
            .await
            .context("failed to load members into cache")?,
    );

    let history: Arc<dyn HistoryStore> = Arc::new(SqliteHistoryStore::new(pool.clone()));

    let generator: Arc<dyn GenerationClient> = Arc::new(
        OpenAiCompatClient::new(
            config.llm.api_url.clone(),
            config.llm.api_key.clone(),
            config.llm.model.clone(),
            config.llm.timeout(),
        )
        .context("failed to build generation client")?,
    );

    let persona = Arc::new(PersonaService::new(
        HistorySelector::new(Arc::clone(&history)),
        generator,
        config.persona.settings()?,
    ));

    info!(
        members = membership.len().await,
        model = %config.llm.model,
        "doppel starting"
    );

    let result = telegram::run_telegram(&token, membership, history, persona).await;

    pool.close().await;
    info!("doppel shut down");
    result
}

/// Print every registered member id, one per line.
async fn handle_members(config: Config) -> anyhow::Result<()> {
    logging::init_cli("warn");

    let pool = db::open_pool(
        &config.database.resolved_path()?,
        config.database.max_connections,
    )
    .await?;
    let store: Arc<dyn MembershipStore> = Arc::new(SqliteMembershipStore::new(pool.clone()));
    let membership = MembershipCache::bootstrap(store)
        .await
        .context("failed to list members")?;

    for id in membership.list_registered().await {
        println!("{id}");
    }
    pool.close().await;
    Ok(())
}

/// Print the assembled persona prompt for `member`.
async fn handle_prompt(config: Config, member: &str, scope: Option<&str>) -> anyhow::Result<()> {
    logging::init_cli("warn");

    let pool = db::open_pool(
        &config.database.resolved_path()?,
        config.database.max_connections,
    )
    .await?;
    let history: Arc<dyn HistoryStore> = Arc::new(SqliteHistoryStore::new(pool.clone()));
    let settings = config.persona.settings()?;

    let result = match HistorySelector::new(history)
        .select(member, scope, settings.history_limit)
        .await
    {
        Ok(records) => {
            let assembled = prompt::build_prompt(
                &records,
                settings.prompt_char_budget,
                &settings.separator,
                &settings.template,
            );
            println!("{assembled}");
            Ok(())
        }
        Err(SelectError::NoHistory) => {
            warn!(member, "no history stored for member");
            Err(anyhow::anyhow!("no history stored for member {member}"))
        }
        Err(e) => Err(e).context("failed to select member history"),
    };
    pool.close().await;
    result
}
