use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::answer::AnswerCandidate;
use crate::domain::conversation::ConversationId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FormId(pub String);

impl FormId {
    pub fn generate() -> Self {
        Self(format!("faq-{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FormId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A posted message that may be updated later.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    pub conversation_id: ConversationId,
    pub item_id: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingStage {
    /// Waiting for the asker to pick one of the candidates.
    Disambiguation,
    /// Waiting for a moderator to answer or reject.
    Moderation,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingQuestion {
    pub form_id: FormId,
    pub stage: PendingStage,
    pub question: String,
    pub asker_id: String,
    candidates: Vec<AnswerCandidate>,
    pub origin: MessageRef,
    pub moderation_message: Option<MessageRef>,
    pub created_at: DateTime<Utc>,
}

impl PendingQuestion {
    pub fn new(
        stage: PendingStage,
        question: impl Into<String>,
        asker_id: impl Into<String>,
        candidates: Vec<AnswerCandidate>,
        origin: MessageRef,
    ) -> Self {
        Self::with_form_id(FormId::generate(), stage, question, asker_id, candidates, origin)
    }

    pub fn with_form_id(
        form_id: FormId,
        stage: PendingStage,
        question: impl Into<String>,
        asker_id: impl Into<String>,
        candidates: Vec<AnswerCandidate>,
        origin: MessageRef,
    ) -> Self {
        Self {
            form_id,
            stage,
            question: question.into(),
            asker_id: asker_id.into(),
            candidates,
            origin,
            moderation_message: None,
            created_at: Utc::now(),
        }
    }

    pub fn candidates(&self) -> &[AnswerCandidate] {
        &self.candidates
    }

    /// Moves the question into moderation under a fresh form id. The
    /// candidate list travels along unchanged.
    pub fn escalate(&self, form_id: FormId) -> Self {
        Self {
            form_id,
            stage: PendingStage::Moderation,
            question: self.question.clone(),
            asker_id: self.asker_id.clone(),
            candidates: self.candidates.clone(),
            origin: self.origin.clone(),
            moderation_message: None,
            created_at: Utc::now(),
        }
    }
}
