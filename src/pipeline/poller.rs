//! Poll driver — one scheduled pass over candidate emails.
//!
//! Per candidate: CLAIM → FETCH → CLASSIFY (+validate) → RECONCILE → PACE.
//! Candidates are handled strictly in order. A claim that is refused or
//! errors skips the candidate without pacing; classification and
//! reconciliation failures are logged and skip only that candidate.
//! Overlapping invocations are safe because the claim is the commit point.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::TrackerConfig;
use crate::error::{ClassifyError, ConfigError, Error};
use crate::llm::LlmProvider;
use crate::mail::{MailSource, build_query};
use crate::model::UserId;
use crate::pipeline::claims::ClaimLedger;
use crate::pipeline::classifier::Classifier;
use crate::pipeline::context::build_context;
use crate::pipeline::reconciler::Reconciler;
use crate::pipeline::types::Action;
use crate::store::Database;

/// Knobs for one invocation.
#[derive(Debug, Clone)]
pub struct PollSettings {
    pub query: String,
    pub max_results: u32,
    /// Delay after each reconciled candidate.
    pub pace: Duration,
    pub max_context_jobs: usize,
    pub claim_retention: chrono::Duration,
}

impl PollSettings {
    pub fn from_config(config: &TrackerConfig) -> Self {
        Self {
            query: build_query(config.window_days),
            max_results: config.max_results,
            pace: config.pace,
            max_context_jobs: config.max_context_jobs,
            claim_retention: chrono::Duration::days(config.claim_retention_days),
        }
    }
}

/// Tally of one invocation. `seen` counts every candidate returned by search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    pub seen: usize,
    pub already_claimed: usize,
    pub claim_errors: usize,
    pub fetch_failed: usize,
    pub classify_failed: usize,
    pub invalid: usize,
    pub ignored: usize,
    pub aborted: usize,
    pub reconcile_failed: usize,
    pub reconciled: usize,
}

pub struct PollDriver {
    db: Arc<dyn Database>,
    mail: Arc<dyn MailSource>,
    user: UserId,
    classifier: Classifier,
    ledger: ClaimLedger,
    reconciler: Reconciler,
    settings: PollSettings,
}

impl PollDriver {
    pub fn new(
        db: Arc<dyn Database>,
        mail: Arc<dyn MailSource>,
        llm: Arc<dyn LlmProvider>,
        user: UserId,
        settings: PollSettings,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            classifier: Classifier::new(llm)?,
            ledger: ClaimLedger::with_retention(
                Arc::clone(&db),
                user.clone(),
                settings.claim_retention,
            ),
            reconciler: Reconciler::new(Arc::clone(&db), user.clone()),
            db,
            mail,
            user,
            settings,
        })
    }

    /// Run one pass. Only a failed search ends the pass early.
    pub async fn run_once(&self) -> Result<PollReport, Error> {
        info!(user = %self.user, "Poll started");
        let mut report = PollReport::default();

        if let Err(e) = self.ledger.purge_expired().await {
            warn!(error = %e, "Failed to purge expired claims");
        }

        let context = match build_context(
            self.db.as_ref(),
            &self.user,
            self.settings.max_context_jobs,
        )
        .await
        {
            Ok(ctx) => ctx,
            Err(e) => {
                warn!(error = %e, "Failed to load existing jobs, classifying without context");
                Vec::new()
            }
        };
        debug!(jobs = context.len(), "Context built");

        let ids = self
            .mail
            .search(&self.settings.query, self.settings.max_results)
            .await?;
        report.seen = ids.len();
        info!(found = ids.len(), "Candidate messages");

        for message_id in &ids {
            match self.ledger.try_claim(message_id).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(message_id = %message_id, "Already processed, skipping");
                    report.already_claimed += 1;
                    continue;
                }
                Err(e) => {
                    warn!(message_id = %message_id, error = %e, "Claim failed, skipping");
                    report.claim_errors += 1;
                    continue;
                }
            }

            let email = match self.mail.fetch(message_id).await {
                Ok(email) => email,
                Err(e) => {
                    error!(message_id = %message_id, error = %e, "Failed to fetch message");
                    report.fetch_failed += 1;
                    continue;
                }
            };

            let decision = match self.classifier.classify(&email, &context).await {
                Ok(decision) => decision,
                Err(ClassifyError::Invalid(violations)) => {
                    let details: Vec<String> = violations.iter().map(|v| v.to_string()).collect();
                    warn!(
                        message_id = %message_id,
                        violations = ?details,
                        "Invalid decision, skipping"
                    );
                    report.invalid += 1;
                    continue;
                }
                Err(e @ ClassifyError::Extraction(_)) => {
                    warn!(message_id = %message_id, error = %e, "Unparseable decision, skipping");
                    report.invalid += 1;
                    continue;
                }
                Err(e) => {
                    error!(message_id = %message_id, error = %e, "Classification failed");
                    report.classify_failed += 1;
                    continue;
                }
            };

            if decision.action == Action::Ignore {
                info!(
                    message_id = %message_id,
                    reason = %decision.reason,
                    "Decision is IGNORE"
                );
                report.ignored += 1;
                continue;
            }

            match self.reconciler.apply(&decision, &email).await {
                Ok(Some(outcome)) => {
                    info!(
                        message_id = %message_id,
                        subject = %email.subject,
                        action = decision.action.label(),
                        job_id = outcome.target.job_id(),
                        job_created = outcome.job_created,
                        event_created = outcome.event_created,
                        "Email reconciled"
                    );
                    report.reconciled += 1;
                }
                Ok(None) => {
                    report.aborted += 1;
                    continue;
                }
                Err(e) => {
                    error!(message_id = %message_id, error = %e, "Reconciliation failed");
                    report.reconcile_failed += 1;
                    continue;
                }
            }

            if !self.settings.pace.is_zero() {
                tokio::time::sleep(self.settings.pace).await;
            }
        }

        info!(?report, "Poll finished");
        Ok(report)
    }
}

/// Spawn a background task that runs the poll driver on an interval.
///
/// Returns a `JoinHandle` and a shutdown flag. Set the flag to stop polling.
pub fn spawn_poll_scheduler(
    driver: Arc<PollDriver>,
    every: Duration,
) -> (JoinHandle<()>, Arc<AtomicBool>) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);

    let handle = tokio::spawn(async move {
        info!("Poll scheduler started, running every {}s", every.as_secs());

        let mut tick = tokio::time::interval(every);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tick.tick().await;

            if shutdown.load(Ordering::Relaxed) {
                info!("Poll scheduler shutting down");
                return;
            }

            if let Err(e) = driver.run_once().await {
                error!(error = %e, "Poll failed");
            }
        }
    });

    (handle, shutdown_flag)
}
