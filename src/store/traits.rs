//! `Database` trait — single async interface for all persistence.
//!
//! Every mutating method is existence-conditional. Methods that can lose a
//! race return `bool` (`true` = this call changed the store) instead of an
//! error, so conflicts stay out of the error path.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DatabaseError;
use crate::model::{Application, ClaimRecord, JobEvent, Stage, UserId};

#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Jobs ────────────────────────────────────────────────────────

    /// Insert a job unless one with the same identity exists.
    async fn insert_job_if_absent(
        &self,
        user: &UserId,
        job: &Application,
    ) -> Result<bool, DatabaseError>;

    async fn get_job(&self, user: &UserId, job_id: &str)
    -> Result<Option<Application>, DatabaseError>;

    /// Jobs for a user, most recently updated first.
    async fn list_jobs(
        &self,
        user: &UserId,
        limit: usize,
    ) -> Result<Vec<Application>, DatabaseError>;

    /// Set `stage` on an existing job. Returns `false` when the job does not
    /// exist. `updated_at` only moves when the stage actually changes.
    async fn update_job_stage(
        &self,
        user: &UserId,
        job_id: &str,
        stage: Stage,
        at: DateTime<Utc>,
    ) -> Result<bool, DatabaseError>;

    // ── Events ──────────────────────────────────────────────────────

    /// Append an event to `user`'s job timeline unless one with the same
    /// event id is already there.
    async fn insert_event_if_absent(
        &self,
        user: &UserId,
        event: &JobEvent,
    ) -> Result<bool, DatabaseError>;

    /// Events for one of `user`'s jobs, newest first.
    async fn list_events(
        &self,
        user: &UserId,
        job_id: &str,
    ) -> Result<Vec<JobEvent>, DatabaseError>;

    // ── Claims ──────────────────────────────────────────────────────

    /// Record a claim unless a live (unexpired at `now`) claim exists.
    async fn insert_claim(
        &self,
        user: &UserId,
        message_id: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, DatabaseError>;

    /// The claim record for a message, live or expired.
    async fn get_claim(
        &self,
        user: &UserId,
        message_id: &str,
    ) -> Result<Option<ClaimRecord>, DatabaseError>;

    /// Delete claims whose expiry is at or before `now`.
    async fn purge_expired_claims(&self, now: DateTime<Utc>) -> Result<usize, DatabaseError>;

    // ── OAuth tokens ────────────────────────────────────────────────

    async fn get_refresh_token(&self, user: &UserId) -> Result<Option<String>, DatabaseError>;

    async fn save_refresh_token(&self, user: &UserId, token: &str) -> Result<(), DatabaseError>;
}
