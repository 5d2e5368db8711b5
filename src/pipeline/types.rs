//! Shared types for the reconciliation pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{EventType, Stage};

// ── Inbound email ───────────────────────────────────────────────────

/// One candidate email, reduced to what classification needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEmail {
    pub message_id: String,
    /// Conversation id; `None` when the provider did not report one.
    pub thread_id: Option<String>,
    pub from: String,
    pub subject: String,
    /// Raw `Date` header, passed through to the prompt.
    pub date: String,
    pub snippet: String,
    pub received_at: DateTime<Utc>,
}

impl InboundEmail {
    /// Thread id with blank values treated as absent.
    pub fn thread(&self) -> Option<&str> {
        self.thread_id
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

// ── Matching context ────────────────────────────────────────────────

/// Minimal view of an existing application, sent to the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobContext {
    pub id: String,
    pub company: Option<String>,
    pub role: Option<String>,
    pub stage: Stage,
}

// ── Decision ────────────────────────────────────────────────────────

/// What the classifier wants done with an email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    CreateJob,
    UpdateJob,
    AddEvent,
    Ignore,
    NeedsReview,
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Self::CreateJob => "CREATE_JOB",
            Self::UpdateJob => "UPDATE_JOB",
            Self::AddEvent => "ADD_EVENT",
            Self::Ignore => "IGNORE",
            Self::NeedsReview => "NEEDS_REVIEW",
        }
    }
}

/// Validated classifier output. Never persisted as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Decision {
    pub action: Action,
    pub confidence: f64,
    pub reason: String,
    pub job: JobDirective,
    pub event: EventDirective,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct JobDirective {
    #[serde(rename = "match")]
    pub matched: JobMatch,
    pub create_if_missing: bool,
    pub new_job: NewJob,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct JobMatch {
    pub thread_id: Option<String>,
    pub job_id: Option<String>,
}

impl JobMatch {
    /// Matched job id, trimmed; blank ids count as no match.
    pub fn job_id(&self) -> Option<&str> {
        self.job_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewJob {
    pub company: Option<String>,
    pub role: Option<String>,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EventDirective {
    pub should_create: bool,
    #[serde(rename = "type")]
    pub event_type: Option<EventType>,
    pub summary: Option<String>,
    pub stage_suggestion: Option<Stage>,
}
