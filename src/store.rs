//! Score persistence collaborator.

use reqwest::blocking::Client;
use serde::Serialize;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::PersistError;
use crate::measure::ScoreRecord;

pub trait ScoreStore: Send + Sync {
    fn save(&self, record: &ScoreRecord) -> Result<(), PersistError>;
}

/// Body of `POST {url}/scores/save`
#[derive(Debug, Serialize, PartialEq)]
pub struct SaveScoreRequest {
    pub user_seq: String,
    pub module_type: String,
    pub score_1: u32,
    /// Elapsed seconds, 3 decimals
    pub score_2: String,
}

impl SaveScoreRequest {
    pub fn new(record: &ScoreRecord, module_type: &str) -> Self {
        Self {
            user_seq: record.user_id.clone(),
            module_type: module_type.to_string(),
            score_1: record.score,
            score_2: format!("{:.3}", record.elapsed.as_secs_f64()),
        }
    }
}

pub struct HttpScoreStore {
    client: Client,
    endpoint: String,
    module_type: String,
}

impl HttpScoreStore {
    pub fn new(
        base_url: &str,
        module_type: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, PersistError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/scores/save", base_url.trim_end_matches('/')),
            module_type: module_type.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl ScoreStore for HttpScoreStore {
    fn save(&self, record: &ScoreRecord) -> Result<(), PersistError> {
        let body = SaveScoreRequest::new(record, &self.module_type);
        let response = self.client.post(&self.endpoint).json(&body).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(PersistError::Status(status.as_u16()));
        }
        Ok(())
    }
}

/// Store a record on a detached thread; failures are only logged so a
/// storage outage never holds up the measurer.
pub fn persist_in_background(store: Arc<dyn ScoreStore>, record: ScoreRecord) {
    let spawned = thread::Builder::new()
        .name("score-persist".to_string())
        .spawn(move || match store.save(&record) {
            Ok(()) => info!(
                "saved score {} ({:.3}s) for user '{}'",
                record.score,
                record.elapsed.as_secs_f64(),
                record.user_id
            ),
            Err(e) => warn!("failed to save score for user '{}': {}", record.user_id, e),
        });
    if let Err(e) = spawned {
        warn!("could not spawn score persistence thread: {}", e);
    }
}
