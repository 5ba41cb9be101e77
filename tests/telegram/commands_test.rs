//! Tests for `telegram::commands` slash command handlers.

use chrono::Utc;

use doppel::providers::GenerationError;
use doppel::store::{HistoryRecord, HistoryStore};
use doppel::telegram::commands::{self, Command, Parsed};
use doppel::telegram::message_key;

use crate::support::{history_store, persona_over, setup_membership, setup_pool};

// ── Parsing ─────────────────────────────────────────────────────

#[test]
fn parse_known_commands() {
    let me = Some("doppel_bot");
    assert_eq!(commands::parse("/register", me), Some(Parsed::Known(Command::Register)));
    assert_eq!(commands::parse("/persona", me), Some(Parsed::Known(Command::Persona)));
    assert_eq!(commands::parse("/help", me), Some(Parsed::Known(Command::Help)));
    assert_eq!(commands::parse("/start", me), Some(Parsed::Known(Command::Help)));
}

#[test]
fn parse_strips_bot_suffix_and_arguments() {
    assert_eq!(
        commands::parse("/persona@Doppel_Bot please", Some("doppel_bot")),
        Some(Parsed::Known(Command::Persona))
    );
}

#[test]
fn parse_ignores_commands_for_other_bots() {
    assert_eq!(
        commands::parse("/register@SomeOtherBot", Some("doppel_bot")),
        Some(Parsed::OtherBot)
    );
    assert_eq!(
        commands::parse("/dance@SomeOtherBot", Some("doppel_bot")),
        Some(Parsed::OtherBot)
    );
}

#[test]
fn parse_accepts_any_suffix_without_known_username() {
    assert_eq!(
        commands::parse("/register@whoever", None),
        Some(Parsed::Known(Command::Register))
    );
}

#[test]
fn parse_unknown_and_plain_text() {
    assert_eq!(commands::parse("/dance", None), Some(Parsed::Unknown("dance")));
    assert_eq!(commands::parse("hello /register", None), None);
    assert_eq!(commands::parse("", None), None);
}

#[test]
fn help_lists_commands() {
    let help = commands::handle_help();
    assert!(help.contains("/register"));
    assert!(help.contains("/persona"));
    assert!(help.contains("/help"));
}

#[test]
fn unknown_command_is_echoed() {
    assert_eq!(commands::handle_unknown("dance"), "Unknown command: /dance");
}

#[test]
fn message_key_includes_chat() {
    assert_eq!(message_key(-100_123, 7), "-100123:7");
    assert_ne!(message_key(1, 7), message_key(2, 7));
}

// ── /register ───────────────────────────────────────────────────

#[tokio::test]
async fn register_then_register_again() {
    let pool = setup_pool().await;
    let membership = setup_membership(&pool).await;

    let first = commands::handle_register(&membership, "42").await;
    assert_eq!(first, commands::REGISTERED_REPLY);
    assert!(membership.is_registered("42").await);

    let second = commands::handle_register(&membership, "42").await;
    assert_eq!(second, commands::ALREADY_REGISTERED_REPLY);
}

#[tokio::test]
async fn register_failure_replies_generically() {
    let pool = setup_pool().await;
    let membership = setup_membership(&pool).await;
    pool.close().await;

    let reply = commands::handle_register(&membership, "42").await;
    assert_eq!(reply, commands::REGISTER_FAILED_REPLY);
    assert!(!membership.is_registered("42").await);
}

#[tokio::test]
async fn registration_persists_across_bootstrap() {
    let pool = setup_pool().await;
    let membership = setup_membership(&pool).await;
    commands::handle_register(&membership, "42").await;

    let reloaded = setup_membership(&pool).await;
    assert_eq!(reloaded.list_registered().await, vec!["42"]);
}

// ── /persona ────────────────────────────────────────────────────

async fn seed_history(pool: &sqlx::SqlitePool) {
    let store = history_store(pool);
    store
        .append(&HistoryRecord {
            message_id: message_key(1, 1),
            member_id: "42".to_owned(),
            scope_key: Some("1".to_owned()),
            content: "morning all".to_owned(),
            created_at: Utc::now(),
            stored_at: None,
        })
        .await
        .expect("seed append");
}

#[tokio::test]
async fn persona_replies_with_generated_text() {
    let pool = setup_pool().await;
    seed_history(&pool).await;
    let persona = persona_over(&pool, Ok("gm gm".to_owned()));

    let reply = commands::handle_persona(&persona, "42", Some("1")).await;
    assert_eq!(reply, "gm gm");
}

#[tokio::test]
async fn persona_uses_history_from_other_chats() {
    let pool = setup_pool().await;
    seed_history(&pool).await;
    let persona = persona_over(&pool, Ok("gm gm".to_owned()));

    let reply = commands::handle_persona(&persona, "42", Some("999")).await;
    assert_eq!(reply, "gm gm");
}

#[tokio::test]
async fn persona_without_history_says_so() {
    let pool = setup_pool().await;
    let persona = persona_over(&pool, Ok("unused".to_owned()));

    let reply = commands::handle_persona(&persona, "42", Some("1")).await;
    assert_eq!(reply, commands::NO_HISTORY_REPLY);
}

#[tokio::test]
async fn persona_generation_failure_replies_generically() {
    let pool = setup_pool().await;
    seed_history(&pool).await;
    let persona = persona_over(&pool, Err(GenerationError::EmptyResponse));

    let reply = commands::handle_persona(&persona, "42", Some("1")).await;
    assert_eq!(reply, commands::GENERATION_FAILED_REPLY);
}

#[tokio::test]
async fn persona_store_failure_replies_generically() {
    let pool = setup_pool().await;
    let persona = persona_over(&pool, Ok("unused".to_owned()));
    pool.close().await;

    let reply = commands::handle_persona(&persona, "42", Some("1")).await;
    assert_eq!(reply, commands::HISTORY_FAILED_REPLY);
}

#[tokio::test]
async fn persona_reply_respects_transport_ceiling() {
    let pool = setup_pool().await;
    seed_history(&pool).await;
    let persona = persona_over(&pool, Ok("z".repeat(10_000)));

    let reply = commands::handle_persona(&persona, "42", None).await;
    assert_eq!(reply.chars().count(), 4096);
    assert!(reply.ends_with("...(truncated)"));
}

#[tokio::test]
async fn persona_reply_fits_telegram_utf16_limit() {
    let pool = setup_pool().await;
    seed_history(&pool).await;
    // 4096 chars passes the char ceiling but is 8192 UTF-16 units.
    let persona = persona_over(&pool, Ok("😀".repeat(4096)));

    let reply = commands::handle_persona(&persona, "42", Some("1")).await;
    assert!(reply.encode_utf16().count() <= 4096);
    assert!(reply.ends_with("...(truncated)"));
}
