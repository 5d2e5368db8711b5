//! Classifier adapter — turns (email, existing jobs) into a validated
//! [`Decision`].
//!
//! Flow:
//! 1. Build a deterministic prompt with the job list and the email
//! 2. Call the LLM provider
//! 3. Extract the first JSON object from the free-form reply
//! 4. Validate against the closed decision schema, then deserialize

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ClassifyError, ConfigError};
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::pipeline::schema::DecisionValidator;
use crate::pipeline::types::{Decision, InboundEmail, JobContext};

/// The snippet is cut to this many characters before prompting.
const SNIPPET_PROMPT_CHARS: usize = 500;

/// Generation settings for classification calls.
const TEMPERATURE: f64 = 0.1;
const MAX_TOKENS: u64 = 8192;

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)```(?:json)?\s*([\s\S]*?)\s*```").expect("static regex")
});

pub struct Classifier {
    llm: Arc<dyn LlmProvider>,
    validator: DecisionValidator,
}

impl Classifier {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Result<Self, ConfigError> {
        Ok(Self {
            llm,
            validator: DecisionValidator::new()?,
        })
    }

    /// Classify one email. Any failure here aborts this email only.
    pub async fn classify(
        &self,
        email: &InboundEmail,
        context: &[JobContext],
    ) -> Result<Decision, ClassifyError> {
        let prompt = build_prompt(email, context);
        let request = CompletionRequest::new(vec![ChatMessage::user(prompt)])
            .with_temperature(TEMPERATURE)
            .with_max_tokens(MAX_TOKENS);
        let raw = self.llm.complete(request).await?.content;

        let value = extract_json(&raw).map_err(|e| {
            warn!(
                message_id = %email.message_id,
                model = self.llm.model_name(),
                raw = %preview(&raw, 200),
                "Classifier output had no usable JSON"
            );
            e
        })?;

        let decision = self.validator.parse(value)?;
        debug!(
            message_id = %email.message_id,
            model = self.llm.model_name(),
            action = decision.action.label(),
            confidence = decision.confidence,
            "Decision validated"
        );
        Ok(decision)
    }
}

// ── Prompt construction ─────────────────────────────────────────────

const SCHEMA_INSTRUCTION: &str = r#"Return ONLY valid JSON (no markdown). Structure:
{
  "action": "CREATE_JOB" | "UPDATE_JOB" | "ADD_EVENT" | "IGNORE" | "NEEDS_REVIEW",
  "confidence": number between 0 and 1,
  "reason": string,
  "job": {
    "match": { "threadId": string|null, "jobId": string|null },
    "createIfMissing": boolean,
    "newJob": { "company": string|null, "role": string|null, "source": "Email" }
  },
  "event": {
    "shouldCreate": boolean,
    "type": "ApplicationConfirmation"|"AssessmentInvite"|"InterviewInvite"|"Rejection"|"Offer"|"Update"|null,
    "summary": string|null,
    "stageSuggestion": "Applied"|"Assessment"|"Interview"|"Offer"|"Rejected"|null
  }
}
Every field is required. Use null where a value is unknown. Do not add other fields."#;

/// Build the classification prompt. Same inputs, same prompt.
pub fn build_prompt(email: &InboundEmail, context: &[JobContext]) -> String {
    let mut prompt = String::with_capacity(2048);

    prompt.push_str("You are an agent maintaining a job-application tracker.\n\n");

    prompt.push_str("EXISTING JOBS:\n");
    if context.is_empty() {
        prompt.push_str("(none)\n");
    }
    for job in context {
        prompt.push_str(&format!(
            "- Role: \"{}\", Company: \"{}\", Stage: \"{}\", ID: \"{}\"\n",
            job.role.as_deref().unwrap_or("unknown"),
            job.company.as_deref().unwrap_or("unknown"),
            job.stage,
            job.id
        ));
    }
    prompt.push_str("--------------------------------------------------\n\n");

    let snippet: String = email.snippet.chars().take(SNIPPET_PROMPT_CHARS).collect();
    prompt.push_str("Incoming email:\n");
    prompt.push_str(&format!("from: {}\n", email.from));
    prompt.push_str(&format!("subject: {}\n", email.subject));
    prompt.push_str(&format!("date: {}\n", email.date));
    prompt.push_str(&format!("snippet: {}\n\n", snippet));

    prompt.push_str(
        "Task:\n\
         1. FILTER JUNK: if this is a generic nudge from a job platform (\"apply now\", \
         \"complete your profile\", job alerts) and NOT a direct communication from a \
         specific company about a specific application, return action=\"IGNORE\".\n\
         2. MATCH: if the email concerns one of the EXISTING JOBS (fuzzy match on \
         company and role), set job.match.jobId to that job's ID exactly as listed and \
         use action=\"UPDATE_JOB\" or \"ADD_EVENT\".\n\
         3. NEW: otherwise, if it is a genuine application, assessment, interview, offer \
         or rejection from a company, set job.createIfMissing=true and \
         action=\"CREATE_JOB\".\n\
         If you cannot decide, use action=\"NEEDS_REVIEW\".\n\n",
    );
    prompt.push_str(SCHEMA_INSTRUCTION);
    prompt
}

// ── Response extraction ─────────────────────────────────────────────

/// Pull the first JSON object out of free-form classifier text.
///
/// A fenced code block wins if present; otherwise the first balanced
/// top-level `{...}` span is decoded.
pub fn extract_json(text: &str) -> Result<Value, ClassifyError> {
    if text.trim().is_empty() {
        return Err(ClassifyError::Extraction("empty response".into()));
    }

    let body = FENCED_BLOCK
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(text)
        .trim();

    let span = first_object_span(body).ok_or_else(|| {
        ClassifyError::Extraction(format!("no JSON object in: {}", preview(body, 200)))
    })?;

    let value: Value = serde_json::from_str(span)
        .map_err(|e| ClassifyError::Extraction(format!("invalid JSON: {e}")))?;
    Ok(value)
}

/// Byte span of the first balanced `{...}`, ignoring braces inside strings.
fn first_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn preview(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
