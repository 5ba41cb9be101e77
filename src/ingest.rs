//! Recording of member messages into the history store.

use tracing::{debug, trace};

use crate::membership::MembershipCache;
use crate::store::{HistoryRecord, HistoryStore, StoreError};

/// What happened to an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The author is registered and the message was stored.
    Stored,
    /// The author is not registered; the message was dropped.
    NotRegistered,
    /// The message had no text worth storing.
    Empty,
}

/// Store `record` if its author is a registered member.
///
/// Membership is answered from the cache only. Duplicate deliveries of the
/// same message are absorbed by the store.
///
/// # Errors
///
/// Returns [`StoreError::Unavailable`] if the history write fails.
pub async fn ingest_message(
    membership: &MembershipCache,
    history: &dyn HistoryStore,
    record: &HistoryRecord,
) -> Result<IngestOutcome, StoreError> {
    if record.content.trim().is_empty() {
        return Ok(IngestOutcome::Empty);
    }

    if !membership.is_registered(&record.member_id).await {
        trace!(member_id = %record.member_id, "message from unregistered user dropped");
        return Ok(IngestOutcome::NotRegistered);
    }

    history.append(record).await?;
    debug!(
        member_id = %record.member_id,
        scope_key = ?record.scope_key,
        message_id = %record.message_id,
        "message stored"
    );
    Ok(IngestOutcome::Stored)
}
