//! Chat-side half of the FAQ bot: event routing, the question dispatcher,
//! the moderation workflow and the in-memory state they share.

pub mod blocks;
pub mod conversations;
pub mod events;
pub mod forms;
pub mod mentions;
pub mod moderation;
pub mod pending;
pub mod platform;
pub mod questions;
pub mod runner;

#[cfg(test)]
mod testing;

pub use conversations::ConversationCache;
pub use events::{
    ChatEnvelope, ChatEvent, EventDispatcher, FormSubmissionEvent, FormSubmissionHandler,
    ItemAddedEvent, ItemAddedHandler, ItemKind,
};
pub use forms::FormRouter;
pub use moderation::{ModerationOutcome, ModerationWorkflow};
pub use pending::PendingQuestionStore;
pub use platform::{ChatPlatform, InMemoryChatPlatform, PlatformError};
pub use questions::{DispatchOutcome, DispatchSettings, QuestionDispatcher, SelectionOutcome};
pub use runner::{EventStreamRunner, EventTransport, NoopEventTransport, ReconnectPolicy};
