//! doppel: a chat bot that speaks in its members' voices.
//!
//! Members opt in with `/register`; from then on their messages are recorded.
//! `/persona` folds a member's most recent messages into a bounded prompt and
//! asks a text-generation endpoint to write a new message in their style.
//!
//! See `DESIGN.md` for the architecture and the reasoning behind it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod db;
pub mod logging;

pub mod store;

pub mod membership;

pub mod bound;
pub mod history;
pub mod persona;
pub mod prompt;
pub mod providers;

pub mod ingest;
pub mod telegram;
