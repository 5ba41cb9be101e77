//! Shared fakes for the persona tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::DateTime;

use doppel::providers::{GenerationClient, GenerationError};
use doppel::store::{HistoryQuery, HistoryRecord, HistoryStore, StoreError};

/// Build a record; higher `created` means newer.
pub fn record(id: &str, member: &str, scope: Option<&str>, content: &str, created: i64) -> HistoryRecord {
    HistoryRecord {
        message_id: id.to_owned(),
        member_id: member.to_owned(),
        scope_key: scope.map(str::to_owned),
        content: content.to_owned(),
        created_at: DateTime::from_timestamp_millis(created).expect("valid timestamp"),
        stored_at: None,
    }
}

/// Records with the given content lengths, newest first.
pub fn records_of_lengths(lengths: &[usize]) -> Vec<HistoryRecord> {
    lengths
        .iter()
        .enumerate()
        .map(|(i, len)| {
            let fill = ["a", "b", "c", "d", "e", "f"][i.min(5)];
            record(&i.to_string(), "m", None, &fill.repeat(*len), 0)
        })
        .collect()
}

/// A query the fake store has seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenQuery {
    pub scope_key: Option<String>,
    pub limit: usize,
}

/// History store over a fixed record list.
#[derive(Default)]
pub struct FakeHistory {
    pub records: Vec<HistoryRecord>,
    pub fail: AtomicBool,
    pub seen: Mutex<Vec<SeenQuery>>,
}

impl FakeHistory {
    pub fn new(records: Vec<HistoryRecord>) -> Self {
        Self {
            records,
            ..Self::default()
        }
    }

    pub fn seen(&self) -> Vec<SeenQuery> {
        self.seen.lock().expect("lock").clone()
    }
}

#[async_trait]
impl HistoryStore for FakeHistory {
    async fn query(&self, query: HistoryQuery<'_>) -> Result<Vec<HistoryRecord>, StoreError> {
        self.seen.lock().expect("lock").push(SeenQuery {
            scope_key: query.scope_key.map(str::to_owned),
            limit: query.limit,
        });
        if self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("query failed".to_owned()));
        }
        let mut hits: Vec<HistoryRecord> = self
            .records
            .iter()
            .filter(|r| r.member_id == query.member_id)
            .filter(|r| match query.scope_key {
                Some(scope) => r.scope_key.as_deref() == Some(scope),
                None => true,
            })
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        hits.truncate(query.limit);
        Ok(hits)
    }

    async fn append(&self, _record: &HistoryRecord) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Generation client that replays a canned result and captures prompts.
pub struct FakeGenerator {
    pub reply: Result<String, GenerationError>,
    pub prompts: Mutex<Vec<(Option<String>, String)>>,
}

impl FakeGenerator {
    pub fn replying(reply: Result<String, GenerationError>) -> Self {
        Self {
            reply,
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl GenerationClient for FakeGenerator {
    async fn generate(
        &self,
        system_prompt: Option<&str>,
        user_prompt: &str,
    ) -> Result<String, GenerationError> {
        self.prompts
            .lock()
            .expect("lock")
            .push((system_prompt.map(str::to_owned), user_prompt.to_owned()));
        self.reply.clone()
    }

    fn model_id(&self) -> &str {
        "fake-model"
    }
}
