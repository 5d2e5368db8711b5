//! Gmail search query for job-related mail.

const SUBJECT_TERMS: &[&str] = &[
    "application",
    "interview",
    "assessment",
    "test",
    "rejected",
    "offer",
];

/// Applicant-tracking systems and assessment platforms.
const SENDER_DOMAINS: &[&str] = &[
    "greenhouse.io",
    "lever.co",
    "workday",
    "icims",
    "smartrecruiters",
    "hackerrank.com",
    "codility.com",
];

/// Build the search query: a recency window, promotions/social excluded,
/// and either a job-ish subject term or a known ATS sender.
pub fn build_query(window_days: u32) -> String {
    let subjects = SUBJECT_TERMS
        .iter()
        .map(|t| format!("\"{t}\""))
        .collect::<Vec<_>>()
        .join(" OR ");
    let senders = SENDER_DOMAINS.join(" OR ");

    format!(
        "newer_than:{window_days}d -category:promotions -category:social (subject:({subjects}) OR from:({senders}))"
    )
}
