//! Slash command parsing and handlers.
//!
//! Handlers return the reply text and never fail: every error is logged here
//! and turned into a short user-facing message. Replies are plain text, since
//! persona output is arbitrary user-styled text.

use tracing::{error, warn};

use crate::bound::{bound_utf16, TELEGRAM_MAX_MESSAGE_UTF16_UNITS};
use crate::membership::{MembershipCache, Registration};
use crate::persona::{PersonaError, PersonaService};

/// Reply for a fresh registration.
pub const REGISTERED_REPLY: &str = "You're registered! From now on I'll remember what you write.";
/// Reply for a repeated registration.
pub const ALREADY_REGISTERED_REPLY: &str = "You're already registered.";
/// Reply when registration hits a store failure.
pub const REGISTER_FAILED_REPLY: &str = "Registration failed. Please try again later.";
/// Reply when a member has no stored history.
pub const NO_HISTORY_REPLY: &str =
    "I don't have any of your messages yet. Register with /register and chat for a while first.";
/// Reply when the history lookup fails.
pub const HISTORY_FAILED_REPLY: &str = "Failed to fetch your message history.";
/// Reply when the generation call fails.
pub const GENERATION_FAILED_REPLY: &str = "Text generation failed. Please try again later.";

/// A recognised slash command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `/help` or `/start`.
    Help,
    /// `/register`: opt in to message recording.
    Register,
    /// `/persona`: generate a message in the caller's voice.
    Persona,
}

/// Result of parsing a message that starts with `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed<'a> {
    /// A known command.
    Known(Command),
    /// An unrecognised command name.
    Unknown(&'a str),
    /// A command addressed to a different bot (`/cmd@other_bot`).
    OtherBot,
}

/// Parse a slash command, ignoring arguments.
///
/// A `@name` suffix must match `bot_username` (case-insensitively) or the
/// command is reported as [`Parsed::OtherBot`]. With no known username every
/// suffix is accepted. Returns `None` if `text` is not a command.
pub fn parse<'a>(text: &'a str, bot_username: Option<&str>) -> Option<Parsed<'a>> {
    let without_slash = text.strip_prefix('/')?;
    let full_command = without_slash
        .split_whitespace()
        .next()
        .unwrap_or(without_slash);
    let (command, addressee) = match full_command.split_once('@') {
        Some((command, addressee)) => (command, Some(addressee)),
        None => (full_command, None),
    };
    if let (Some(addressee), Some(own)) = (addressee, bot_username) {
        if !addressee.eq_ignore_ascii_case(own) {
            return Some(Parsed::OtherBot);
        }
    }

    let parsed = match command {
        "help" | "start" => Parsed::Known(Command::Help),
        "register" => Parsed::Known(Command::Register),
        "persona" => Parsed::Known(Command::Persona),
        other => Parsed::Unknown(other),
    };
    Some(parsed)
}

/// List all available commands.
pub fn handle_help() -> String {
    [
        "Available commands:",
        "",
        "/register - let me record your messages",
        "/persona - I write a message the way you would",
        "/help - show this message",
    ]
    .join("\n")
}

/// Reply for an unknown command.
pub fn handle_unknown(command: &str) -> String {
    format!("Unknown command: /{command}")
}

/// Register the caller.
pub async fn handle_register(membership: &MembershipCache, member_id: &str) -> String {
    match membership.register(member_id).await {
        Ok(Registration::Created(_)) => REGISTERED_REPLY.to_owned(),
        Ok(Registration::AlreadyRegistered) => ALREADY_REGISTERED_REPLY.to_owned(),
        Err(e) => {
            error!(member_id, error = %e, "register command failed");
            REGISTER_FAILED_REPLY.to_owned()
        }
    }
}

/// Generate a persona message for the caller.
///
/// The reply is additionally fitted to Telegram's UTF-16 length limit, which
/// astral-plane characters such as emoji count twice.
pub async fn handle_persona(
    persona: &PersonaService,
    member_id: &str,
    scope_key: Option<&str>,
) -> String {
    match persona.generate(member_id, scope_key).await {
        Ok(reply) => bound_utf16(
            &reply,
            TELEGRAM_MAX_MESSAGE_UTF16_UNITS,
            &persona.settings().truncation_marker,
        ),
        Err(PersonaError::NoHistory) => NO_HISTORY_REPLY.to_owned(),
        Err(PersonaError::Store(e)) => {
            warn!(member_id, error = %e, "persona history lookup failed");
            HISTORY_FAILED_REPLY.to_owned()
        }
        Err(PersonaError::Generation(e)) => {
            warn!(member_id, error = %e, "persona generation failed");
            GENERATION_FAILED_REPLY.to_owned()
        }
    }
}
