pub mod answer;
pub mod conversation;
pub mod question;

pub use answer::{AnswerCandidate, AnswerRef, EntryRef};
pub use conversation::{ConversationId, ConversationMeta, ConversationType};
pub use question::{FormId, MessageRef, PendingQuestion, PendingStage};
