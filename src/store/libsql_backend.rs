//! libSQL backend — async `Database` trait implementation.
//!
//! Supports local file and in-memory databases. The composite (pk, sk) key
//! of every table is its primary key, so conditional writes map onto
//! `INSERT OR IGNORE` / `UPDATE ... WHERE pk AND sk` and the affected-row
//! count tells the caller whether its condition held.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::model::{
    Application, ClaimRecord, EventProvenance, EventType, JobEvent, JobSource, Stage, UserId,
};
use crate::store::keys;
use crate::store::migrations;
use crate::store::traits::Database;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Canonical timestamp encoding. Fixed width so text comparison in SQL
/// orders the same as time.
fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

/// Map a libsql Row to an Application.
///
/// Column order matches JOB_COLUMNS:
/// 0:sk, 1:job_id, 2:company, 3:role, 4:stage, 5:source, 6:thread_id,
/// 7:created_at, 8:updated_at
fn row_to_job(row: &libsql::Row) -> Result<Application, libsql::Error> {
    let sk: String = row.get(0)?;
    let job_id = row
        .get::<String>(1)
        .ok()
        .unwrap_or_else(|| keys::job_id_from_sk(&sk).to_string());
    let stage_str: String = row.get(4)?;
    let source_str: String = row.get(5)?;
    let created_str: String = row.get(7)?;
    let updated_str: String = row.get(8)?;

    Ok(Application {
        job_id,
        company: row.get(2).ok(),
        role: row.get(3).ok(),
        stage: stage_str.parse().unwrap_or_default(),
        source: source_str.parse().unwrap_or(JobSource::Manual),
        thread_id: row.get(6).ok(),
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

/// Map a libsql Row to a JobEvent.
///
/// Column order matches EVENT_COLUMNS:
/// 0:event_id, 1:job_id, 2:event_type, 3:summary, 4:source, 5:message_id,
/// 6:thread_id, 7:sender, 8:subject, 9:created_at
fn row_to_event(row: &libsql::Row) -> Result<JobEvent, libsql::Error> {
    let type_str: String = row.get(2)?;
    let source_str: String = row.get(4)?;
    let created_str: String = row.get(9)?;

    let provenance = match (source_str.as_str(), row.get::<String>(5).ok()) {
        ("email", Some(message_id)) => EventProvenance::Email {
            message_id,
            thread_id: row.get(6).ok(),
            from: row.get::<String>(7).unwrap_or_default(),
            subject: row.get::<String>(8).unwrap_or_default(),
        },
        _ => EventProvenance::Manual,
    };

    Ok(JobEvent {
        event_id: row.get(0)?,
        job_id: row.get(1)?,
        event_type: type_str.parse().unwrap_or(EventType::Update),
        summary: row.get(3).ok(),
        created_at: parse_datetime(&created_str),
        provenance,
    })
}

// ── Trait implementation ────────────────────────────────────────────

const JOB_COLUMNS: &str =
    "sk, job_id, company, role, stage, source, thread_id, created_at, updated_at";

const EVENT_COLUMNS: &str =
    "event_id, job_id, event_type, summary, source, message_id, thread_id, sender, subject, created_at";

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Jobs ────────────────────────────────────────────────────────

    async fn insert_job_if_absent(
        &self,
        user: &UserId,
        job: &Application,
    ) -> Result<bool, DatabaseError> {
        let conn = self.conn();
        let count = conn
            .execute(
                "INSERT OR IGNORE INTO jobs (pk, sk, job_id, company, role, stage, source, thread_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    keys::user_pk(user),
                    keys::job_sk(&job.job_id),
                    job.job_id.as_str(),
                    opt_text(job.company.as_deref()),
                    opt_text(job.role.as_deref()),
                    job.stage.as_str(),
                    job.source.as_str(),
                    opt_text(job.thread_id.as_deref()),
                    ts(job.created_at),
                    ts(job.updated_at),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_job_if_absent: {e}")))?;

        debug!(job_id = %job.job_id, inserted = count > 0, "Job insert");
        Ok(count > 0)
    }

    async fn get_job(
        &self,
        user: &UserId,
        job_id: &str,
    ) -> Result<Option<Application>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE pk = ?1 AND sk = ?2"),
                params![keys::user_pk(user), keys::job_sk(job_id)],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_job: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let job = row_to_job(&row)
                    .map_err(|e| DatabaseError::Query(format!("get_job row parse: {e}")))?;
                Ok(Some(job))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_job: {e}"))),
        }
    }

    async fn list_jobs(
        &self,
        user: &UserId,
        limit: usize,
    ) -> Result<Vec<Application>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {JOB_COLUMNS} FROM jobs WHERE pk = ?1 AND sk LIKE 'JOB#%'
                     ORDER BY updated_at DESC LIMIT ?2"
                ),
                params![keys::user_pk(user), limit as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_jobs: {e}")))?;

        let mut jobs = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_jobs: {e}")))?
        {
            jobs.push(
                row_to_job(&row)
                    .map_err(|e| DatabaseError::Query(format!("list_jobs row parse: {e}")))?,
            );
        }
        Ok(jobs)
    }

    async fn update_job_stage(
        &self,
        user: &UserId,
        job_id: &str,
        stage: Stage,
        at: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        let conn = self.conn();
        let count = conn
            .execute(
                "UPDATE jobs
                 SET updated_at = CASE WHEN stage = ?1 THEN updated_at ELSE ?2 END,
                     stage = ?1
                 WHERE pk = ?3 AND sk = ?4",
                params![
                    stage.as_str(),
                    ts(at),
                    keys::user_pk(user),
                    keys::job_sk(job_id)
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_job_stage: {e}")))?;

        debug!(job_id, stage = %stage, matched = count > 0, "Job stage update");
        Ok(count > 0)
    }

    // ── Events ──────────────────────────────────────────────────────

    async fn insert_event_if_absent(
        &self,
        user: &UserId,
        event: &JobEvent,
    ) -> Result<bool, DatabaseError> {
        let sk = keys::event_sk(&event.event_id);
        let (message_id, thread_id, sender, subject) = match &event.provenance {
            EventProvenance::Email {
                message_id,
                thread_id,
                from,
                subject,
            } => (
                Some(message_id.as_str()),
                thread_id.as_deref(),
                Some(from.as_str()),
                Some(subject.as_str()),
            ),
            EventProvenance::Manual => (None, None, None, None),
        };

        let conn = self.conn();
        let count = conn
            .execute(
                "INSERT OR IGNORE INTO events (pk, sk, event_id, job_id, event_type, summary, source, message_id, thread_id, sender, subject, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    keys::event_pk(user, &event.job_id),
                    sk.as_str(),
                    event.event_id.as_str(),
                    event.job_id.as_str(),
                    event.event_type.as_str(),
                    opt_text(event.summary.as_deref()),
                    event.provenance.label(),
                    opt_text(message_id),
                    opt_text(thread_id),
                    opt_text(sender),
                    opt_text(subject),
                    ts(event.created_at),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_event_if_absent: {e}")))?;

        debug!(job_id = %event.job_id, sk = %sk, inserted = count > 0, "Event insert");
        Ok(count > 0)
    }

    async fn list_events(
        &self,
        user: &UserId,
        job_id: &str,
    ) -> Result<Vec<JobEvent>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {EVENT_COLUMNS} FROM events WHERE pk = ?1 AND sk LIKE 'EVT#%'
                     ORDER BY created_at DESC, sk DESC"
                ),
                params![keys::event_pk(user, job_id)],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_events: {e}")))?;

        let mut events = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_events: {e}")))?
        {
            events.push(
                row_to_event(&row)
                    .map_err(|e| DatabaseError::Query(format!("list_events row parse: {e}")))?,
            );
        }
        Ok(events)
    }

    // ── Claims ──────────────────────────────────────────────────────

    async fn insert_claim(
        &self,
        user: &UserId,
        message_id: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        let conn = self.conn();
        // An expired claim that has not been purged yet is taken over in place.
        let count = conn
            .execute(
                "INSERT INTO processed_emails (pk, sk, message_id, claimed_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (pk, sk) DO UPDATE
                     SET claimed_at = excluded.claimed_at, expires_at = excluded.expires_at
                     WHERE processed_emails.expires_at <= excluded.claimed_at",
                params![
                    keys::user_pk(user),
                    keys::claim_sk(message_id),
                    message_id,
                    ts(now),
                    ts(expires_at),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_claim: {e}")))?;

        Ok(count > 0)
    }

    async fn get_claim(
        &self,
        user: &UserId,
        message_id: &str,
    ) -> Result<Option<ClaimRecord>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                "SELECT message_id, claimed_at, expires_at FROM processed_emails
                 WHERE pk = ?1 AND sk = ?2",
                params![keys::user_pk(user), keys::claim_sk(message_id)],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_claim: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let field = |i: i32| {
                    row.get::<String>(i)
                        .map_err(|e| DatabaseError::Serialization(format!("get_claim: {e}")))
                };
                Ok(Some(ClaimRecord {
                    message_id: field(0)?,
                    claimed_at: parse_datetime(&field(1)?),
                    expires_at: parse_datetime(&field(2)?),
                }))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_claim: {e}"))),
        }
    }

    async fn purge_expired_claims(&self, now: DateTime<Utc>) -> Result<usize, DatabaseError> {
        let conn = self.conn();
        let count = conn
            .execute(
                "DELETE FROM processed_emails WHERE expires_at <= ?1",
                params![ts(now)],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("purge_expired_claims: {e}")))?;

        if count > 0 {
            info!(count, "Purged expired claims");
        }
        Ok(count as usize)
    }

    // ── OAuth tokens ────────────────────────────────────────────────

    async fn get_refresh_token(&self, user: &UserId) -> Result<Option<String>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                "SELECT refresh_token FROM user_tokens WHERE pk = ?1 AND sk = ?2",
                params![keys::user_pk(user), keys::GOOGLE_TOKEN_SK],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_refresh_token: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<String>(0).ok().filter(|t| !t.is_empty())),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_refresh_token: {e}"))),
        }
    }

    async fn save_refresh_token(&self, user: &UserId, token: &str) -> Result<(), DatabaseError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO user_tokens (pk, sk, refresh_token, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (pk, sk) DO UPDATE SET refresh_token = ?3, updated_at = ?4",
            params![
                keys::user_pk(user),
                keys::GOOGLE_TOKEN_SK,
                token,
                ts(Utc::now())
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("save_refresh_token: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn test_db() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    fn user() -> UserId {
        UserId::new("demo-user")
    }

    fn email_job(thread: &str, company: &str) -> Application {
        let now = Utc::now();
        Application {
            job_id: keys::thread_job_id(thread),
            company: Some(company.into()),
            role: Some("SWE".into()),
            stage: Stage::Applied,
            source: JobSource::Email,
            thread_id: Some(thread.into()),
            created_at: now,
            updated_at: now,
        }
    }

    // ── Job tests ───────────────────────────────────────────────────

    #[tokio::test]
    async fn insert_job_only_once() {
        let db = test_db().await;
        let job = email_job("T1", "Acme");

        assert!(db.insert_job_if_absent(&user(), &job).await.unwrap());

        let mut second = email_job("T1", "Other Co");
        second.stage = Stage::Offer;
        assert!(!db.insert_job_if_absent(&user(), &second).await.unwrap());

        let stored = db.get_job(&user(), "THREAD#T1").await.unwrap().unwrap();
        assert_eq!(stored.company.as_deref(), Some("Acme"));
        assert_eq!(stored.stage, Stage::Applied);
        assert_eq!(stored.thread_id.as_deref(), Some("T1"));
    }

    #[tokio::test]
    async fn jobs_are_scoped_per_user() {
        let db = test_db().await;
        db.insert_job_if_absent(&user(), &email_job("T1", "Acme"))
            .await
            .unwrap();

        let other = UserId::new("someone-else");
        assert!(db.get_job(&other, "THREAD#T1").await.unwrap().is_none());
        assert!(db.list_jobs(&other, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn nullable_company_and_role_survive() {
        let db = test_db().await;
        let mut job = email_job("T9", "x");
        job.company = None;
        job.role = None;
        db.insert_job_if_absent(&user(), &job).await.unwrap();

        let stored = db.get_job(&user(), &job.job_id).await.unwrap().unwrap();
        assert!(stored.company.is_none());
        assert!(stored.role.is_none());
    }

    #[tokio::test]
    async fn list_jobs_newest_update_first_with_limit() {
        let db = test_db().await;
        let base = Utc::now() - Duration::days(3);
        for (i, thread) in ["A", "B", "C"].iter().enumerate() {
            let mut job = email_job(thread, thread);
            job.updated_at = base + Duration::hours(i as i64);
            db.insert_job_if_absent(&user(), &job).await.unwrap();
        }

        let jobs = db.list_jobs(&user(), 2).await.unwrap();
        let ids: Vec<_> = jobs.iter().map(|j| j.job_id.as_str()).collect();
        assert_eq!(ids, vec!["THREAD#C", "THREAD#B"]);
    }

    #[tokio::test]
    async fn update_stage_on_missing_job_reports_false() {
        let db = test_db().await;
        let updated = db
            .update_job_stage(&user(), "J1", Stage::Interview, Utc::now())
            .await
            .unwrap();
        assert!(!updated);
        assert!(db.get_job(&user(), "J1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_stage_to_same_value_keeps_timestamp() {
        let db = test_db().await;
        let job = email_job("T1", "Acme");
        db.insert_job_if_absent(&user(), &job).await.unwrap();
        let before = db.get_job(&user(), &job.job_id).await.unwrap().unwrap();

        let later = Utc::now() + Duration::minutes(5);
        assert!(
            db.update_job_stage(&user(), &job.job_id, Stage::Applied, later)
                .await
                .unwrap()
        );
        let same = db.get_job(&user(), &job.job_id).await.unwrap().unwrap();
        assert_eq!(same.updated_at, before.updated_at);

        assert!(
            db.update_job_stage(&user(), &job.job_id, Stage::Interview, later)
                .await
                .unwrap()
        );
        let moved = db.get_job(&user(), &job.job_id).await.unwrap().unwrap();
        assert_eq!(moved.stage, Stage::Interview);
        assert_eq!(ts(moved.updated_at), ts(later));
    }

    // ── Event tests ─────────────────────────────────────────────────

    fn email_event(job_id: &str, message_id: &str, at: DateTime<Utc>) -> JobEvent {
        JobEvent {
            event_id: message_id.into(),
            job_id: job_id.into(),
            event_type: EventType::InterviewInvite,
            summary: Some("Phone screen".into()),
            created_at: at,
            provenance: EventProvenance::Email {
                message_id: message_id.into(),
                thread_id: Some("T1".into()),
                from: "recruiting@acme.com".into(),
                subject: "Interview".into(),
            },
        }
    }

    #[tokio::test]
    async fn event_insert_is_conditional_on_key() {
        let db = test_db().await;
        let at = Utc::now();
        let event = email_event("THREAD#T1", "m1", at);

        assert!(db.insert_event_if_absent(&user(), &event).await.unwrap());
        assert!(!db.insert_event_if_absent(&user(), &event).await.unwrap());

        // Same message fetched again later: different time, same key.
        let refetched = email_event("THREAD#T1", "m1", at + Duration::minutes(5));
        assert!(!db.insert_event_if_absent(&user(), &refetched).await.unwrap());
        assert_eq!(db.list_events(&user(), "THREAD#T1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn events_are_scoped_to_their_user() {
        let db = test_db().await;
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");
        let at = Utc::now();

        assert!(
            db.insert_event_if_absent(&bob, &email_event("THREAD#T1", "bob-m1", at))
                .await
                .unwrap()
        );
        assert!(
            db.insert_event_if_absent(&alice, &email_event("THREAD#T1", "alice-m1", at))
                .await
                .unwrap()
        );

        let bobs = db.list_events(&bob, "THREAD#T1").await.unwrap();
        assert_eq!(bobs.len(), 1);
        assert_eq!(bobs[0].event_id, "bob-m1");
        let alices = db.list_events(&alice, "THREAD#T1").await.unwrap();
        assert_eq!(alices.len(), 1);
        assert_eq!(alices[0].event_id, "alice-m1");
    }

    #[tokio::test]
    async fn events_listed_newest_first_with_provenance() {
        let db = test_db().await;
        let first = Utc::now() - Duration::hours(2);
        let second = Utc::now();
        db.insert_event_if_absent(&user(), &email_event("J", "m1", first))
            .await
            .unwrap();
        let mut manual = JobEvent::manual("J", EventType::Update, Some("called them".into()));
        manual.created_at = second;
        db.insert_event_if_absent(&user(), &manual).await.unwrap();

        let events = db.list_events(&user(), "J").await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].provenance, EventProvenance::Manual);
        assert_eq!(events[0].summary.as_deref(), Some("called them"));
        match &events[1].provenance {
            EventProvenance::Email {
                message_id, from, ..
            } => {
                assert_eq!(message_id, "m1");
                assert_eq!(from, "recruiting@acme.com");
            }
            other => panic!("Expected email provenance, got {:?}", other),
        }
        assert_eq!(events[1].event_type, EventType::InterviewInvite);
    }

    // ── Claim tests ─────────────────────────────────────────────────

    #[tokio::test]
    async fn live_claim_blocks_second_insert() {
        let db = test_db().await;
        let now = Utc::now();
        let expiry = now + Duration::days(14);

        assert!(db.insert_claim(&user(), "m1", now, expiry).await.unwrap());
        assert!(!db.insert_claim(&user(), "m1", now, expiry).await.unwrap());
        assert!(db.insert_claim(&user(), "m2", now, expiry).await.unwrap());
    }

    #[tokio::test]
    async fn expired_claim_can_be_retaken() {
        let db = test_db().await;
        let then = Utc::now() - Duration::days(20);
        db.insert_claim(&user(), "m1", then, then + Duration::days(14))
            .await
            .unwrap();

        let now = Utc::now();
        assert!(
            db.insert_claim(&user(), "m1", now, now + Duration::days(14))
                .await
                .unwrap()
        );
        assert!(
            !db.insert_claim(&user(), "m1", now, now + Duration::days(14))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn purge_removes_only_expired_claims() {
        let db = test_db().await;
        let now = Utc::now();
        db.insert_claim(&user(), "old", now - Duration::days(15), now - Duration::days(1))
            .await
            .unwrap();
        db.insert_claim(&user(), "fresh", now, now + Duration::days(14))
            .await
            .unwrap();

        assert_eq!(db.purge_expired_claims(now).await.unwrap(), 1);
        assert_eq!(db.purge_expired_claims(now).await.unwrap(), 0);
        assert!(db.get_claim(&user(), "old").await.unwrap().is_none());
        assert!(db.get_claim(&user(), "fresh").await.unwrap().is_some());
        assert!(
            !db.insert_claim(&user(), "fresh", now, now + Duration::days(14))
                .await
                .unwrap()
        );
    }

    // ── Token tests ─────────────────────────────────────────────────

    #[tokio::test]
    async fn refresh_token_roundtrip_and_overwrite() {
        let db = test_db().await;
        assert!(db.get_refresh_token(&user()).await.unwrap().is_none());

        db.save_refresh_token(&user(), "1//first").await.unwrap();
        db.save_refresh_token(&user(), "1//second").await.unwrap();
        assert_eq!(
            db.get_refresh_token(&user()).await.unwrap().as_deref(),
            Some("1//second")
        );
    }

    #[tokio::test]
    async fn local_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tracker.db");

        {
            let db = LibSqlBackend::new_local(&path).await.unwrap();
            db.insert_job_if_absent(&user(), &email_job("T1", "Acme"))
                .await
                .unwrap();
        }

        let reopened = LibSqlBackend::new_local(&path).await.unwrap();
        assert!(reopened.get_job(&user(), "THREAD#T1").await.unwrap().is_some());
    }
}
