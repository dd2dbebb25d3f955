use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use faqbot_core::{BotError, ConversationId, ConversationMeta, ConversationType, MessageRef};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::blocks::MessageTemplate;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PlatformError {
    #[error("conversation `{0}` was not found")]
    UnknownConversation(String),
    #[error("message `{0}` was not found")]
    UnknownMessage(String),
    #[error("messaging platform unavailable: {0}")]
    Unavailable(String),
}

impl From<PlatformError> for BotError {
    fn from(error: PlatformError) -> Self {
        BotError::UpstreamUnavailable(error.to_string())
    }
}

/// Messaging operations the bot needs from the chat platform.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    async fn fetch_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<ConversationMeta, PlatformError>;

    /// Posts a message, threaded under `parent_item_id` when given.
    async fn post_message(
        &self,
        conversation_id: &ConversationId,
        parent_item_id: Option<&str>,
        message: &MessageTemplate,
    ) -> Result<MessageRef, PlatformError>;

    async fn update_message(
        &self,
        target: &MessageRef,
        message: &MessageTemplate,
    ) -> Result<(), PlatformError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostedMessage {
    pub message_ref: MessageRef,
    pub parent_item_id: Option<String>,
    pub message: MessageTemplate,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageUpdate {
    pub target: MessageRef,
    pub message: MessageTemplate,
}

/// Platform kept entirely in memory. Records every post and update.
#[derive(Default)]
pub struct InMemoryChatPlatform {
    conversations: RwLock<HashMap<ConversationId, ConversationType>>,
    posted: RwLock<Vec<PostedMessage>>,
    updates: RwLock<Vec<MessageUpdate>>,
    conversation_fetches: AtomicU64,
    next_item: AtomicU64,
    rejected_conversations: RwLock<HashSet<ConversationId>>,
}

impl InMemoryChatPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_conversation(
        &self,
        conversation_id: impl Into<String>,
        conversation_type: ConversationType,
    ) {
        self.conversations
            .write()
            .await
            .insert(ConversationId(conversation_id.into()), conversation_type);
    }

    pub async fn posted(&self) -> Vec<PostedMessage> {
        self.posted.read().await.clone()
    }

    pub async fn posted_to(&self, conversation_id: &str) -> Vec<PostedMessage> {
        self.posted
            .read()
            .await
            .iter()
            .filter(|posted| posted.message_ref.conversation_id.as_str() == conversation_id)
            .cloned()
            .collect()
    }

    pub async fn updates(&self) -> Vec<MessageUpdate> {
        self.updates.read().await.clone()
    }

    /// Latest content of a message, taking updates into account.
    pub async fn current_message(&self, target: &MessageRef) -> Option<MessageTemplate> {
        let updated = self
            .updates
            .read()
            .await
            .iter()
            .rev()
            .find(|update| &update.target == target)
            .map(|update| update.message.clone());
        if updated.is_some() {
            return updated;
        }

        self.posted
            .read()
            .await
            .iter()
            .find(|posted| &posted.message_ref == target)
            .map(|posted| posted.message.clone())
    }

    pub fn conversation_fetches(&self) -> u64 {
        self.conversation_fetches.load(Ordering::SeqCst)
    }

    /// Makes every following post to the conversation fail.
    pub async fn reject_posts_to(&self, conversation_id: impl Into<String>) {
        self.rejected_conversations.write().await.insert(ConversationId(conversation_id.into()));
    }
}

#[async_trait]
impl ChatPlatform for InMemoryChatPlatform {
    async fn fetch_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<ConversationMeta, PlatformError> {
        self.conversation_fetches.fetch_add(1, Ordering::SeqCst);
        let conversations = self.conversations.read().await;
        let conversation_type = conversations
            .get(conversation_id)
            .copied()
            .ok_or_else(|| PlatformError::UnknownConversation(conversation_id.to_string()))?;
        Ok(ConversationMeta { id: conversation_id.clone(), conversation_type })
    }

    async fn post_message(
        &self,
        conversation_id: &ConversationId,
        parent_item_id: Option<&str>,
        message: &MessageTemplate,
    ) -> Result<MessageRef, PlatformError> {
        if self.rejected_conversations.read().await.contains(conversation_id) {
            return Err(PlatformError::Unavailable(format!(
                "posting to `{conversation_id}` is disabled"
            )));
        }

        let item_number = self.next_item.fetch_add(1, Ordering::SeqCst) + 1;
        let message_ref = MessageRef {
            conversation_id: conversation_id.clone(),
            item_id: format!("item-{item_number}"),
        };
        self.posted.write().await.push(PostedMessage {
            message_ref: message_ref.clone(),
            parent_item_id: parent_item_id.map(str::to_owned),
            message: message.clone(),
        });
        Ok(message_ref)
    }

    async fn update_message(
        &self,
        target: &MessageRef,
        message: &MessageTemplate,
    ) -> Result<(), PlatformError> {
        let known = self.posted.read().await.iter().any(|posted| &posted.message_ref == target);
        if !known {
            return Err(PlatformError::UnknownMessage(target.item_id.clone()));
        }

        self.updates
            .write()
            .await
            .push(MessageUpdate { target: target.clone(), message: message.clone() });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use faqbot_core::{ConversationId, ConversationType, MessageRef};

    use super::{ChatPlatform, InMemoryChatPlatform, PlatformError};
    use crate::blocks::answer_message;

    #[tokio::test]
    async fn posts_and_updates_are_recorded() {
        let platform = InMemoryChatPlatform::new();
        let conversation = ConversationId("C1".to_owned());

        let posted = platform
            .post_message(&conversation, Some("I1"), &answer_message("first"))
            .await
            .expect("post");
        platform.update_message(&posted, &answer_message("second")).await.expect("update");

        assert_eq!(platform.posted().await[0].parent_item_id.as_deref(), Some("I1"));
        assert_eq!(platform.updates().await.len(), 1);
        let current = platform.current_message(&posted).await.expect("message");
        assert_eq!(current.content, "second");
    }

    #[tokio::test]
    async fn unknown_conversations_and_messages_are_errors() {
        let platform = InMemoryChatPlatform::new();
        platform.add_conversation("C1", ConversationType::Group).await;

        let meta = platform
            .fetch_conversation(&ConversationId("C1".to_owned()))
            .await
            .expect("known conversation");
        assert_eq!(meta.conversation_type, ConversationType::Group);

        let missing = platform.fetch_conversation(&ConversationId("C2".to_owned())).await;
        assert!(matches!(missing, Err(PlatformError::UnknownConversation(_))));

        let stray = MessageRef {
            conversation_id: ConversationId("C1".to_owned()),
            item_id: "nope".to_owned(),
        };
        let update = platform.update_message(&stray, &answer_message("x")).await;
        assert!(matches!(update, Err(PlatformError::UnknownMessage(_))));
    }

    #[tokio::test]
    async fn rejected_posts_fail_with_unavailable() {
        let platform = InMemoryChatPlatform::new();
        platform.reject_posts_to("C1").await;

        let result = platform
            .post_message(&ConversationId("C1".to_owned()), None, &answer_message("x"))
            .await;
        assert!(matches!(result, Err(PlatformError::Unavailable(_))));

        let other = platform
            .post_message(&ConversationId("C2".to_owned()), None, &answer_message("y"))
            .await;
        assert!(other.is_ok());
    }
}
