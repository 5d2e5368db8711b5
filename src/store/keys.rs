//! Composite (partition, sort) key layout shared by every writer.
//!
//! | record  | pk                         | sk                          |
//! |---------|----------------------------|-----------------------------|
//! | job     | `USER#<user>`              | `JOB#<jobId>`               |
//! | event   | `USER#<user>#JOB#<jobId>`  | `EVT#<messageId or uuid>`   |
//! | claim   | `USER#<user>`              | `MSG#<messageId>`           |
//! | token   | `USER#<user>`              | `GOOGLE`                    |
//!
//! Email-originated jobs use `THREAD#<threadId>` as their job id, so their
//! sort key is `JOB#THREAD#<threadId>`. Every partition starts with the
//! user, so a job id supplied by the classifier can never reach another
//! user's records.

use crate::model::UserId;

pub const JOB_PREFIX: &str = "JOB#";
pub const EVENT_PREFIX: &str = "EVT#";
pub const CLAIM_PREFIX: &str = "MSG#";
pub const THREAD_PREFIX: &str = "THREAD#";
pub const GOOGLE_TOKEN_SK: &str = "GOOGLE";

pub fn user_pk(user: &UserId) -> String {
    format!("USER#{}", user.as_str())
}

pub fn job_sk(job_id: &str) -> String {
    format!("{JOB_PREFIX}{job_id}")
}

/// Inverse of [`job_sk`]. Rows written before `job_id` was a column only
/// carry the sort key.
pub fn job_id_from_sk(sk: &str) -> &str {
    sk.strip_prefix(JOB_PREFIX).unwrap_or(sk)
}

/// Stable job id for a conversation that has no matched job yet.
pub fn thread_job_id(thread_id: &str) -> String {
    format!("{THREAD_PREFIX}{thread_id}")
}

pub fn event_pk(user: &UserId, job_id: &str) -> String {
    format!("{}#{JOB_PREFIX}{job_id}", user_pk(user))
}

/// Email events use the message id, so a replayed message maps to the same
/// key no matter when it is fetched.
pub fn event_sk(event_id: &str) -> String {
    format!("{EVENT_PREFIX}{event_id}")
}

pub fn claim_sk(message_id: &str) -> String {
    format!("{CLAIM_PREFIX}{message_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_job_sort_key() {
        let id = thread_job_id("T1");
        assert_eq!(job_sk(&id), "JOB#THREAD#T1");
        assert_eq!(job_id_from_sk("JOB#THREAD#T1"), "THREAD#T1");
    }

    #[test]
    fn legacy_sort_key_without_prefix_is_kept() {
        assert_eq!(job_id_from_sk("abc"), "abc");
    }

    #[test]
    fn event_partition_is_per_user() {
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");
        assert_eq!(event_pk(&alice, "THREAD#T1"), "USER#alice#JOB#THREAD#T1");
        assert_ne!(event_pk(&alice, "THREAD#T1"), event_pk(&bob, "THREAD#T1"));
        assert_eq!(event_sk("18c"), "EVT#18c");
    }

    #[test]
    fn user_and_claim_keys() {
        let user = UserId::new("demo-user");
        assert_eq!(user_pk(&user), "USER#demo-user");
        assert_eq!(claim_sk("18c"), "MSG#18c");
    }
}
