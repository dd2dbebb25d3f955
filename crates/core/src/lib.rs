//! Core domain for the FAQ bot: answer candidates, pending questions,
//! conversation metadata, the candidate threshold policy, the shared error
//! taxonomy and layered configuration.

pub mod config;
pub mod domain;
pub mod errors;
pub mod threshold;

pub use domain::{
    AnswerCandidate, AnswerRef, ConversationId, ConversationMeta, ConversationType, EntryRef,
    FormId, MessageRef, PendingQuestion, PendingStage,
};
pub use errors::{Audience, BotError};
pub use threshold::ThresholdPolicy;
