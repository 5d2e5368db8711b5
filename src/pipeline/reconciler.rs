//! Reconciler — applies a validated decision to the job/event store.
//!
//! Every write is existence-conditional (insert-if-absent or
//! update-if-exists), so re-applying the same decision for the same email
//! leaves the store unchanged and a partially applied decision can be
//! completed by a later one.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::DatabaseError;
use crate::model::{Application, EventProvenance, EventType, JobEvent, JobSource, UserId};
use crate::pipeline::types::{Action, Decision, InboundEmail};
use crate::store::{Database, keys};

/// Which job a decision applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// The classifier matched an existing job; assumed to exist, never created.
    Matched(String),
    /// No match; the job is identified by the email's conversation.
    Thread(String),
}

impl Target {
    pub fn job_id(&self) -> &str {
        match self {
            Self::Matched(id) | Self::Thread(id) => id,
        }
    }
}

/// What one `apply` call changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub target: Target,
    pub job_created: bool,
    pub event_created: bool,
    /// `None` when no stage was suggested; `Some(false)` when the target job
    /// was missing.
    pub stage_updated: Option<bool>,
}

/// Resolve the target job. `None` means the decision cannot be placed.
///
/// `match.threadId` from the classifier is not trusted as an identity; only
/// the thread id reported by the mail provider is.
pub fn resolve_target(decision: &Decision, email: &InboundEmail) -> Option<Target> {
    if let Some(job_id) = decision.job.matched.job_id() {
        return Some(Target::Matched(job_id.to_string()));
    }
    email
        .thread()
        .map(|thread| Target::Thread(keys::thread_job_id(thread)))
}

pub struct Reconciler {
    db: Arc<dyn Database>,
    user: UserId,
}

impl Reconciler {
    pub fn new(db: Arc<dyn Database>, user: UserId) -> Self {
        Self { db, user }
    }

    /// Apply `decision` for `email`. Returns `Ok(None)` when the decision was
    /// aborted because it had neither a match nor a thread to attach to.
    pub async fn apply(
        &self,
        decision: &Decision,
        email: &InboundEmail,
    ) -> Result<Option<Reconciliation>, DatabaseError> {
        let Some(target) = resolve_target(decision, email) else {
            info!(
                message_id = %email.message_id,
                "No match and no thread id, skipping decision"
            );
            return Ok(None);
        };
        let job_id = target.job_id().to_string();
        let now = Utc::now();

        // 1) Create the job for an unmatched conversation.
        let wants_job =
            decision.action == Action::CreateJob || decision.job.create_if_missing;
        let job_created = if matches!(target, Target::Thread(_)) && wants_job {
            let job = Application {
                job_id: job_id.clone(),
                company: decision.job.new_job.company.clone(),
                role: decision.job.new_job.role.clone(),
                stage: decision.event.stage_suggestion.unwrap_or_default(),
                source: JobSource::Email,
                thread_id: email.thread().map(str::to_string),
                created_at: now,
                updated_at: now,
            };
            self.db.insert_job_if_absent(&self.user, &job).await?
        } else {
            false
        };

        // 2) Append the event, keyed by the message so replays collide.
        let event_created = if decision.event.should_create {
            let event = JobEvent {
                event_id: email.message_id.clone(),
                job_id: job_id.clone(),
                event_type: decision.event.event_type.unwrap_or(EventType::Update),
                summary: decision.event.summary.clone(),
                created_at: email.received_at,
                provenance: EventProvenance::Email {
                    message_id: email.message_id.clone(),
                    thread_id: email.thread_id.clone(),
                    from: email.from.clone(),
                    subject: email.subject.clone(),
                },
            };
            self.db.insert_event_if_absent(&self.user, &event).await?
        } else {
            false
        };

        // 3) Move the stage if one was suggested. A missing job is a gap, not a create.
        let stage_updated = match decision.event.stage_suggestion {
            Some(stage) => {
                let updated = self
                    .db
                    .update_job_stage(&self.user, &job_id, stage, now)
                    .await?;
                if !updated {
                    warn!(
                        job_id = %job_id,
                        stage = %stage,
                        message_id = %email.message_id,
                        "Stage update skipped: job not found"
                    );
                }
                Some(updated)
            }
            None => None,
        };

        debug!(
            job_id = %job_id,
            job_created,
            event_created,
            ?stage_updated,
            "Decision applied"
        );

        Ok(Some(Reconciliation {
            target,
            job_created,
            event_created,
            stage_updated,
        }))
    }
}
