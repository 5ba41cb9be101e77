//! Telegram adapter: slash commands and the bot dispatcher.
//!
//! Every update runs on its own worker, so a slow `/persona` never holds up
//! other messages in the same chat. Text messages from registered members
//! are recorded; `/register` and `/persona` are answered through
//! [`commands`].

use std::convert::Infallible;
use std::sync::Arc;

use anyhow::Context;
use teloxide::prelude::*;
use teloxide::types::ChatAction;
use tracing::{debug, info, warn};

use crate::ingest::{ingest_message, IngestOutcome};
use crate::membership::MembershipCache;
use crate::persona::PersonaService;
use crate::store::{HistoryRecord, HistoryStore};

pub mod commands;

// ---------------------------------------------------------------------------
// Shared state for handler injection
// ---------------------------------------------------------------------------

/// Shared dependencies injected into teloxide handlers via `dptree::deps!`.
#[derive(Clone)]
struct SharedState {
    membership: Arc<MembershipCache>,
    history: Arc<dyn HistoryStore>,
    persona: Arc<PersonaService>,
    bot_username: Option<String>,
}

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Run the Telegram bot until Ctrl+C.
///
/// Per-update failures are logged by the dispatcher and never stop the bot.
pub async fn run_telegram(
    bot_token: &str,
    membership: Arc<MembershipCache>,
    history: Arc<dyn HistoryStore>,
    persona: Arc<PersonaService>,
) -> anyhow::Result<()> {
    let bot = Bot::new(bot_token);
    let me = bot
        .get_me()
        .await
        .context("failed to fetch bot identity from Telegram")?;
    let bot_username = me.user.username.clone();

    let shared = SharedState {
        membership,
        history,
        persona,
        bot_username,
    };

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handle_message));

    info!("telegram dispatcher starting");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![shared])
        .distribution_function(update_worker_key)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("telegram dispatcher stopped");
    Ok(())
}

/// Worker key for an update. `None` for every update means each one is
/// handled independently instead of queueing behind earlier updates from
/// the same chat.
pub fn update_worker_key(_update: &Update) -> Option<Infallible> {
    None
}

/// Store id for a Telegram message. Telegram message ids are only unique
/// within a chat, so the chat id is part of the key.
pub fn message_key(chat_id: i64, message_id: i32) -> String {
    format!("{chat_id}:{message_id}")
}

// ---------------------------------------------------------------------------
// Message handler
// ---------------------------------------------------------------------------

async fn handle_message(bot: Bot, msg: Message, state: SharedState) -> ResponseResult<()> {
    let user = match msg.from {
        Some(ref user) if !user.is_bot => user,
        _ => return Ok(()),
    };
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let member_id = user.id.0.to_string();
    let scope_key = msg.chat.id.0.to_string();

    if let Some(parsed) = commands::parse(text, state.bot_username.as_deref()) {
        let reply = match parsed {
            commands::Parsed::Known(commands::Command::Help) => commands::handle_help(),
            commands::Parsed::Known(commands::Command::Register) => {
                commands::handle_register(&state.membership, &member_id).await
            }
            commands::Parsed::Known(commands::Command::Persona) => {
                if let Err(e) = bot.send_chat_action(msg.chat.id, ChatAction::Typing).await {
                    debug!(error = %e, "failed to send typing action");
                }
                commands::handle_persona(&state.persona, &member_id, Some(&scope_key)).await
            }
            commands::Parsed::Unknown(name) => commands::handle_unknown(name),
            commands::Parsed::OtherBot => return Ok(()),
        };
        bot.send_message(msg.chat.id, reply).await?;
        return Ok(());
    }

    let record = HistoryRecord {
        message_id: message_key(msg.chat.id.0, msg.id.0),
        member_id,
        scope_key: Some(scope_key),
        content: text.to_owned(),
        created_at: msg.date,
        stored_at: None,
    };

    match ingest_message(&state.membership, state.history.as_ref(), &record).await {
        Ok(IngestOutcome::Stored) => {}
        Ok(outcome) => debug!(?outcome, "message not stored"),
        Err(e) => warn!(error = %e, member_id = %record.member_id, "failed to store message"),
    }

    Ok(())
}
