//! Persisted request store, as seen from the completion relay.
//!
//! The store is owned by the Request API; the relay touches exactly one
//! thing: the non-terminal -> terminal transition, expressed as a single
//! conditional update so that redelivered notifications converge instead
//! of overwriting a terminal state.

use std::path::Path;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use protocol::RequestStatus;

use crate::error::RelayError;

/// Result of a conditional terminal update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalUpdate {
    /// The request moved to the terminal state now.
    Applied,
    /// The request was already terminal; a redelivery converged.
    AlreadyTerminal,
    /// No request row with this uid is visible yet.
    NotFound,
}

/// The one mutation the completion relay performs on request records.
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Transition `uid` to the given terminal `status`, recording the
    /// video path, but only if the request is not terminal yet.
    async fn mark_terminal(
        &self,
        uid: &str,
        status: RequestStatus,
        video_path: Option<&Path>,
    ) -> Result<TerminalUpdate, RelayError>;
}

/// Postgres-backed request store.
pub struct PgRequestStore {
    pool: PgPool,
}

impl PgRequestStore {
    pub async fn connect(database_url: &str) -> Result<Self, RelayError> {
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect(database_url)
            .await?;
        info!("connected to request store");
        Ok(PgRequestStore { pool })
    }
}

#[async_trait]
impl RequestStore for PgRequestStore {
    async fn mark_terminal(
        &self,
        uid: &str,
        status: RequestStatus,
        video_path: Option<&Path>,
    ) -> Result<TerminalUpdate, RelayError> {
        debug_assert!(status.is_terminal());
        let path_str = video_path.map(|p| p.display().to_string());

        let updated = sqlx::query(
            "UPDATE requests \
             SET status = $2, video_path = $3, updated_at = NOW() \
             WHERE uid = $1 AND status NOT IN ('generated', 'failed')",
        )
        .bind(uid)
        .bind(status.as_str())
        .bind(&path_str)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() > 0 {
            return Ok(TerminalUpdate::Applied);
        }

        let existing = sqlx::query_scalar::<_, String>("SELECT status FROM requests WHERE uid = $1")
            .bind(uid)
            .fetch_optional(&self.pool)
            .await?;
        match existing {
            Some(_) => Ok(TerminalUpdate::AlreadyTerminal),
            None => Ok(TerminalUpdate::NotFound),
        }
    }
}

#[cfg(test)]
pub(crate) mod memory {
    //! In-memory store with the same conditional-update semantics,
    //! for exercising the completion relay without Postgres.

    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use chrono::Utc;
    use protocol::RequestRecord;

    use super::*;

    #[derive(Default)]
    pub struct MemoryRequestStore {
        records: Mutex<HashMap<String, RequestRecord>>,
    }

    impl MemoryRequestStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert_queued(&self, uid: &str, phrase: &str) {
            let record = RequestRecord {
                uid: uid.to_string(),
                phrase: phrase.to_string(),
                variant: "icaro".to_string(),
                status: RequestStatus::Queued,
                video_path: None,
                created_at: Utc::now(),
            };
            self.records
                .lock()
                .unwrap()
                .insert(uid.to_string(), record);
        }

        pub fn get(&self, uid: &str) -> Option<RequestRecord> {
            self.records.lock().unwrap().get(uid).cloned()
        }
    }

    #[async_trait]
    impl RequestStore for MemoryRequestStore {
        async fn mark_terminal(
            &self,
            uid: &str,
            status: RequestStatus,
            video_path: Option<&Path>,
        ) -> Result<TerminalUpdate, RelayError> {
            let mut records = self.records.lock().unwrap();
            match records.get_mut(uid) {
                None => Ok(TerminalUpdate::NotFound),
                Some(record) if record.status.is_terminal() => Ok(TerminalUpdate::AlreadyTerminal),
                Some(record) => {
                    record.status = status;
                    record.video_path = video_path.map(PathBuf::from);
                    Ok(TerminalUpdate::Applied)
                }
            }
        }
    }
}
