//! Conversational TV and movie discovery assistant.
//!
//! The pipeline: [`memory::SessionStore`] holds per-conversation state,
//! [`llm::LanguageModel`] classifies queries and narrates results,
//! [`dispatch::Dispatcher`] maps intents to [`metadata`] lookups with
//! fallback strategies, [`degrade`] bounds payload size, and [`bot::Bot`]
//! orchestrates one never-failing turn across all of them.

pub mod bot;
pub mod config;
pub mod degrade;
pub mod dispatch;
pub mod error;
pub mod intent;
pub mod llm;
pub mod logger;
pub mod memory;
pub mod metadata;

pub use bot::Bot;
pub use config::Config;
pub use error::AppError;
