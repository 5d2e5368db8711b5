//! Claim ledger: the idempotency gate in front of classification.
//!
//! A claim is taken *before* any work on a message. If the process dies
//! between claim and reconciliation the message stays claimed until the
//! retention window lapses: side effects are at-most-once per window.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::error::DatabaseError;
use crate::model::UserId;
use crate::store::Database;

/// How long a processed-message marker is kept.
pub const DEFAULT_RETENTION_DAYS: u32 = 14;

pub struct ClaimLedger {
    db: Arc<dyn Database>,
    user: UserId,
    retention: Duration,
}

impl ClaimLedger {
    pub fn new(db: Arc<dyn Database>, user: UserId) -> Self {
        Self::with_retention(db, user, Duration::days(i64::from(DEFAULT_RETENTION_DAYS)))
    }

    pub fn with_retention(db: Arc<dyn Database>, user: UserId, retention: Duration) -> Self {
        Self {
            db,
            user,
            retention,
        }
    }

    /// `true` if this caller now owns `message_id`; `false` if a live claim
    /// already exists.
    pub async fn try_claim(&self, message_id: &str) -> Result<bool, DatabaseError> {
        self.try_claim_at(message_id, Utc::now()).await
    }

    pub async fn try_claim_at(
        &self,
        message_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        let claimed = self
            .db
            .insert_claim(&self.user, message_id, now, now + self.retention)
            .await?;
        debug!(message_id, claimed, "Claim attempt");
        Ok(claimed)
    }

    /// Drop markers past their retention window.
    pub async fn purge_expired(&self) -> Result<usize, DatabaseError> {
        self.db.purge_expired_claims(Utc::now()).await
    }
}
