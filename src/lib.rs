//! Email-driven job application tracking.

pub mod config;
pub mod error;
pub mod llm;
pub mod mail;
pub mod model;
pub mod pipeline;
pub mod store;
