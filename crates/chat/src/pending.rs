use std::collections::HashMap;

use chrono::{DateTime, Utc};
use faqbot_core::{FormId, MessageRef, PendingQuestion};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PendingStoreError {
    #[error("form `{0}` already has a pending question")]
    DuplicateFormId(FormId),
}

/// Questions waiting for a form submission, keyed by form id.
///
/// `take` removes the entry under the write lock, so two submissions of the
/// same form resolve at most once.
#[derive(Default)]
pub struct PendingQuestionStore {
    entries: RwLock<HashMap<FormId, PendingQuestion>>,
}

impl PendingQuestionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, pending: PendingQuestion) -> Result<(), PendingStoreError> {
        let mut entries = self.entries.write().await;
        if entries.contains_key(&pending.form_id) {
            return Err(PendingStoreError::DuplicateFormId(pending.form_id));
        }
        entries.insert(pending.form_id.clone(), pending);
        Ok(())
    }

    pub async fn take(&self, form_id: &FormId) -> Option<PendingQuestion> {
        self.entries.write().await.remove(form_id)
    }

    /// Puts a taken question back after a submission could not be applied.
    pub async fn restore(&self, pending: PendingQuestion) {
        self.entries.write().await.insert(pending.form_id.clone(), pending);
    }

    pub async fn get(&self, form_id: &FormId) -> Option<PendingQuestion> {
        self.entries.read().await.get(form_id).cloned()
    }

    pub async fn contains(&self, form_id: &FormId) -> bool {
        self.entries.read().await.contains_key(form_id)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drops entries created before `cutoff` and returns their form ids.
    pub async fn purge_created_before(&self, cutoff: DateTime<Utc>) -> Vec<FormId> {
        let mut entries = self.entries.write().await;
        let expired: Vec<FormId> = entries
            .values()
            .filter(|pending| pending.created_at < cutoff)
            .map(|pending| pending.form_id.clone())
            .collect();
        for form_id in &expired {
            entries.remove(form_id);
        }
        expired
    }

    pub async fn record_moderation_message(&self, form_id: &FormId, message: MessageRef) -> bool {
        let mut entries = self.entries.write().await;
        match entries.get_mut(form_id) {
            Some(pending) => {
                pending.moderation_message = Some(message);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use faqbot_core::{ConversationId, FormId, MessageRef, PendingQuestion, PendingStage};

    use super::{PendingQuestionStore, PendingStoreError};

    fn pending(form_id: &str) -> PendingQuestion {
        PendingQuestion::with_form_id(
            FormId(form_id.to_owned()),
            PendingStage::Disambiguation,
            "How do I mute?",
            "U1",
            Vec::new(),
            MessageRef {
                conversation_id: ConversationId("C1".to_owned()),
                item_id: "I1".to_owned(),
            },
        )
    }

    #[tokio::test]
    async fn form_ids_are_unique_within_the_store() {
        let store = PendingQuestionStore::new();
        store.insert(pending("faq-1")).await.expect("first insert");

        let duplicate = store.insert(pending("faq-1")).await;
        assert_eq!(duplicate, Err(PendingStoreError::DuplicateFormId(FormId("faq-1".to_owned()))));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn concurrent_takes_resolve_a_form_at_most_once() {
        let store = Arc::new(PendingQuestionStore::new());
        store.insert(pending("faq-2")).await.expect("insert");

        let form_id = FormId("faq-2".to_owned());
        let first = tokio::spawn({
            let store = store.clone();
            let form_id = form_id.clone();
            async move { store.take(&form_id).await }
        });
        let second = tokio::spawn({
            let store = store.clone();
            let form_id = form_id.clone();
            async move { store.take(&form_id).await }
        });

        let first = first.await.expect("join");
        let second = second.await.expect("join");
        assert_eq!(usize::from(first.is_some()) + usize::from(second.is_some()), 1);
        assert!(!store.contains(&form_id).await);
    }

    #[tokio::test]
    async fn restore_makes_a_taken_question_available_again() {
        let store = PendingQuestionStore::new();
        store.insert(pending("faq-3")).await.expect("insert");

        let taken = store.take(&FormId("faq-3".to_owned())).await.expect("taken");
        assert!(store.is_empty().await);

        store.restore(taken).await;
        assert!(store.contains(&FormId("faq-3".to_owned())).await);
    }

    #[tokio::test]
    async fn purge_drops_only_expired_entries() {
        let store = PendingQuestionStore::new();
        let mut stale = pending("faq-old");
        stale.created_at = Utc::now() - Duration::hours(30);
        store.insert(stale).await.expect("insert stale");
        store.insert(pending("faq-new")).await.expect("insert fresh");

        let purged = store.purge_created_before(Utc::now() - Duration::hours(24)).await;

        assert_eq!(purged, vec![FormId("faq-old".to_owned())]);
        assert!(store.contains(&FormId("faq-new".to_owned())).await);
    }

    #[tokio::test]
    async fn moderation_message_is_recorded_on_the_entry() {
        let store = PendingQuestionStore::new();
        store.insert(pending("faq-4")).await.expect("insert");
        let message =
            MessageRef { conversation_id: ConversationId("M".to_owned()), item_id: "X".to_owned() };

        let known = FormId("faq-4".to_owned());
        let unknown = FormId("faq-5".to_owned());
        assert!(store.record_moderation_message(&known, message.clone()).await);
        assert!(!store.record_moderation_message(&unknown, message.clone()).await);

        let stored = store.get(&known).await.expect("entry");
        assert_eq!(stored.moderation_message, Some(message));
    }
}
