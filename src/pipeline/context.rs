//! Context builder. Produces the existing-application list the classifier matches
//! against.

use crate::error::DatabaseError;
use crate::model::UserId;
use crate::pipeline::types::JobContext;
use crate::store::Database;

/// Default bound on how many jobs are offered to the classifier.
pub const DEFAULT_MAX_CONTEXT_JOBS: usize = 200;

/// The `limit` most recently updated jobs for `user`, reduced to
/// `{id, company, role, stage}`.
pub async fn build_context(
    db: &dyn Database,
    user: &UserId,
    limit: usize,
) -> Result<Vec<JobContext>, DatabaseError> {
    let jobs = db.list_jobs(user, limit).await?;
    Ok(jobs
        .into_iter()
        .map(|j| JobContext {
            id: j.job_id,
            company: j.company,
            role: j.role,
            stage: j.stage,
        })
        .collect())
}
