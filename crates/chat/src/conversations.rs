use std::collections::HashMap;
use std::sync::Arc;

use faqbot_core::{ConversationId, ConversationMeta, ConversationType};
use tokio::sync::RwLock;
use tracing::debug;

use crate::platform::{ChatPlatform, PlatformError};

/// Conversation metadata fetched on first use and kept for the process
/// lifetime. Entries are never invalidated.
pub struct ConversationCache {
    platform: Arc<dyn ChatPlatform>,
    entries: RwLock<HashMap<ConversationId, ConversationMeta>>,
}

impl ConversationCache {
    pub fn new(platform: Arc<dyn ChatPlatform>) -> Self {
        Self { platform, entries: RwLock::new(HashMap::new()) }
    }

    pub async fn get(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<ConversationMeta, PlatformError> {
        if let Some(meta) = self.entries.read().await.get(conversation_id) {
            return Ok(meta.clone());
        }

        let meta = self.platform.fetch_conversation(conversation_id).await?;
        debug!(
            conversation_id = %conversation_id,
            conversation_type = ?meta.conversation_type,
            "conversation metadata cached"
        );

        let mut entries = self.entries.write().await;
        Ok(entries.entry(conversation_id.clone()).or_insert(meta).clone())
    }

    pub async fn conversation_type(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<ConversationType, PlatformError> {
        Ok(self.get(conversation_id).await?.conversation_type)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
