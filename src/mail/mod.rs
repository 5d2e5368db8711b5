//! Email retrieval: candidate search and metadata fetch.

pub mod gmail;
pub mod query;

use async_trait::async_trait;

use crate::error::MailError;
use crate::pipeline::types::InboundEmail;

pub use gmail::{GmailClient, GoogleOAuthConfig};
pub use query::build_query;

/// A mailbox the poll driver can read from.
#[async_trait]
pub trait MailSource: Send + Sync {
    /// Message ids matching `query`, at most `max_results` of them.
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<String>, MailError>;

    /// Headers, snippet and thread id of one message.
    async fn fetch(&self, message_id: &str) -> Result<InboundEmail, MailError>;
}
