//! Domain records owned by the job/event store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Tenant ──────────────────────────────────────────────────────────

/// Identifier of the user whose mailbox and jobs are being tracked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Stage ───────────────────────────────────────────────────────────

/// Lifecycle state of a job application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    #[default]
    Applied,
    Assessment,
    #[serde(alias = "Interviewing")]
    Interview,
    Offer,
    Rejected,
    Accepted,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Applied => "Applied",
            Self::Assessment => "Assessment",
            Self::Interview => "Interview",
            Self::Offer => "Offer",
            Self::Rejected => "Rejected",
            Self::Accepted => "Accepted",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Applied" => Ok(Self::Applied),
            "Assessment" => Ok(Self::Assessment),
            "Interview" | "Interviewing" => Ok(Self::Interview),
            "Offer" => Ok(Self::Offer),
            "Rejected" => Ok(Self::Rejected),
            "Accepted" => Ok(Self::Accepted),
            _ => Err(format!("Unknown stage: {}", s)),
        }
    }
}

// ── Event type ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    ApplicationConfirmation,
    AssessmentInvite,
    InterviewInvite,
    Rejection,
    Offer,
    Update,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApplicationConfirmation => "ApplicationConfirmation",
            Self::AssessmentInvite => "AssessmentInvite",
            Self::InterviewInvite => "InterviewInvite",
            Self::Rejection => "Rejection",
            Self::Offer => "Offer",
            Self::Update => "Update",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ApplicationConfirmation" => Ok(Self::ApplicationConfirmation),
            "AssessmentInvite" => Ok(Self::AssessmentInvite),
            "InterviewInvite" => Ok(Self::InterviewInvite),
            "Rejection" => Ok(Self::Rejection),
            "Offer" => Ok(Self::Offer),
            "Update" => Ok(Self::Update),
            _ => Err(format!("Unknown event type: {}", s)),
        }
    }
}

// ── Application ─────────────────────────────────────────────────────

/// Where an application record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobSource {
    Email,
    Manual,
}

impl JobSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "Email",
            Self::Manual => "Manual",
        }
    }
}

impl std::str::FromStr for JobSource {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Email" | "email" => Ok(Self::Email),
            "Manual" | "manual" => Ok(Self::Manual),
            _ => Err(format!("Unknown job source: {}", s)),
        }
    }
}

/// A tracked job application.
///
/// `job_id` never changes once assigned. Manually created jobs get a UUID;
/// email-originated jobs get a thread-derived id (`THREAD#<threadId>`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub job_id: String,
    pub company: Option<String>,
    pub role: Option<String>,
    pub stage: Stage,
    pub source: JobSource,
    pub thread_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    /// A job created by hand (no mail thread behind it).
    pub fn manual(company: impl Into<String>, role: impl Into<String>, stage: Stage) -> Self {
        let now = Utc::now();
        Self {
            job_id: Uuid::new_v4().to_string(),
            company: Some(company.into()),
            role: Some(role.into()),
            stage,
            source: JobSource::Manual,
            thread_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// ── Event ───────────────────────────────────────────────────────────

/// How an event entered the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventProvenance {
    Manual,
    Email {
        message_id: String,
        thread_id: Option<String>,
        from: String,
        subject: String,
    },
}

impl EventProvenance {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Email { .. } => "email",
        }
    }
}

/// Append-only timeline entry for a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEvent {
    pub event_id: String,
    pub job_id: String,
    pub event_type: EventType,
    pub summary: Option<String>,
    /// When it happened; for email events, the message's receive time.
    pub created_at: DateTime<Utc>,
    pub provenance: EventProvenance,
}

impl JobEvent {
    /// A note added by hand against an existing job.
    pub fn manual(job_id: impl Into<String>, event_type: EventType, note: Option<String>) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            job_id: job_id.into(),
            event_type,
            summary: note,
            created_at: Utc::now(),
            provenance: EventProvenance::Manual,
        }
    }
}

// ── Claim ───────────────────────────────────────────────────────────

/// Marker that an inbound message has been taken for processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimRecord {
    pub message_id: String,
    pub claimed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
