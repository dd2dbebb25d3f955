use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use faqbot_core::{ConversationId, FormId};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatEnvelope {
    pub envelope_id: String,
    pub event: ChatEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatEvent {
    ItemAdded(ItemAddedEvent),
    FormSubmission(FormSubmissionEvent),
    Unsupported { event_type: String },
}

impl ChatEvent {
    pub fn event_type(&self) -> ChatEventType {
        match self {
            Self::ItemAdded(_) => ChatEventType::ItemAdded,
            Self::FormSubmission(_) => ChatEventType::FormSubmission,
            Self::Unsupported { .. } => ChatEventType::Unsupported,
        }
    }

    pub fn conversation_id(&self) -> Option<&ConversationId> {
        match self {
            Self::ItemAdded(event) => Some(&event.conversation_id),
            Self::FormSubmission(event) => Some(&event.conversation_id),
            Self::Unsupported { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChatEventType {
    ItemAdded,
    FormSubmission,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ItemKind {
    Text,
    Other(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemAddedEvent {
    pub conversation_id: ConversationId,
    pub item_id: String,
    /// Set when the item is a reply inside a thread.
    pub parent_item_id: Option<String>,
    pub creator_id: String,
    pub kind: ItemKind,
    pub content: Option<String>,
    pub subject: Option<String>,
}

impl ItemAddedEvent {
    /// Rich-text body, falling back to the subject line.
    pub fn text(&self) -> Option<&str> {
        [self.content.as_deref(), self.subject.as_deref()]
            .into_iter()
            .flatten()
            .find(|text| !text.trim().is_empty())
    }

    /// Item that replies to this one should be threaded under.
    pub fn thread_root(&self) -> &str {
        self.parent_item_id.as_deref().unwrap_or(&self.item_id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormSubmissionEvent {
    pub conversation_id: ConversationId,
    /// Item that carries the submitted form.
    pub item_id: String,
    pub form_id: FormId,
    pub submitter_id: String,
    pub values: BTreeMap<String, String>,
}

impl FormSubmissionEvent {
    /// Trimmed value of a field; blank values count as absent.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(|value| value.trim()).filter(|value| !value.is_empty())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error("item handler failure: {0}")]
    Item(String),
    #[error("form submission handler failure: {0}")]
    FormSubmission(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> ChatEventType;
    async fn handle(
        &self,
        envelope: &ChatEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<ChatEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &ChatEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

#[async_trait]
pub trait ItemService: Send + Sync {
    async fn handle_item(
        &self,
        event: &ItemAddedEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

pub struct ItemAddedHandler<S> {
    service: S,
}

impl<S> ItemAddedHandler<S>
where
    S: ItemService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for ItemAddedHandler<S>
where
    S: ItemService + 'static,
{
    fn event_type(&self) -> ChatEventType {
        ChatEventType::ItemAdded
    }

    async fn handle(
        &self,
        envelope: &ChatEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let ChatEvent::ItemAdded(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        self.service.handle_item(event, ctx).await
    }
}

#[async_trait]
pub trait FormService: Send + Sync {
    async fn handle_form_submission(
        &self,
        event: &FormSubmissionEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

pub struct FormSubmissionHandler<S> {
    service: S,
}

impl<S> FormSubmissionHandler<S>
where
    S: FormService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for FormSubmissionHandler<S>
where
    S: FormService + 'static,
{
    fn event_type(&self) -> ChatEventType {
        ChatEventType::FormSubmission
    }

    async fn handle(
        &self,
        envelope: &ChatEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let ChatEvent::FormSubmission(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        self.service.handle_form_submission(event, ctx).await
    }
}

#[async_trait]
impl<T> ItemService for Arc<T>
where
    T: ItemService + ?Sized,
{
    async fn handle_item(
        &self,
        event: &ItemAddedEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        (**self).handle_item(event, ctx).await
    }
}

#[async_trait]
impl<T> FormService for Arc<T>
where
    T: FormService + ?Sized,
{
    async fn handle_form_submission(
        &self,
        event: &FormSubmissionEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        (**self).handle_form_submission(event, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use faqbot_core::{ConversationId, FormId};

    use super::{
        ChatEnvelope, ChatEvent, EventContext, EventDispatcher, EventHandlerError, FormService,
        FormSubmissionEvent, FormSubmissionHandler, HandlerResult, ItemAddedEvent,
        ItemAddedHandler, ItemKind, ItemService,
    };

    #[derive(Default)]
    struct CountingService {
        items: AtomicUsize,
        forms: AtomicUsize,
    }

    #[async_trait]
    impl ItemService for CountingService {
        async fn handle_item(
            &self,
            _event: &ItemAddedEvent,
            _ctx: &EventContext,
        ) -> Result<HandlerResult, EventHandlerError> {
            self.items.fetch_add(1, Ordering::SeqCst);
            Ok(HandlerResult::Processed)
        }
    }

    #[async_trait]
    impl FormService for CountingService {
        async fn handle_form_submission(
            &self,
            _event: &FormSubmissionEvent,
            _ctx: &EventContext,
        ) -> Result<HandlerResult, EventHandlerError> {
            self.forms.fetch_add(1, Ordering::SeqCst);
            Ok(HandlerResult::Processed)
        }
    }

    fn item(content: Option<&str>, subject: Option<&str>) -> ItemAddedEvent {
        ItemAddedEvent {
            conversation_id: ConversationId("C1".to_owned()),
            item_id: "I1".to_owned(),
            parent_item_id: None,
            creator_id: "U1".to_owned(),
            kind: ItemKind::Text,
            content: content.map(str::to_owned),
            subject: subject.map(str::to_owned),
        }
    }

    #[tokio::test]
    async fn dispatcher_routes_items_and_form_submissions() {
        let service = Arc::new(CountingService::default());
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(ItemAddedHandler::new(service.clone()));
        dispatcher.register(FormSubmissionHandler::new(service.clone()));

        let item = ChatEnvelope {
            envelope_id: "env-1".to_owned(),
            event: ChatEvent::ItemAdded(item(Some("hello"), None)),
        };
        let form = ChatEnvelope {
            envelope_id: "env-2".to_owned(),
            event: ChatEvent::FormSubmission(FormSubmissionEvent {
                conversation_id: ConversationId("C1".to_owned()),
                item_id: "I2".to_owned(),
                form_id: FormId("faq-1".to_owned()),
                submitter_id: "U1".to_owned(),
                values: BTreeMap::new(),
            }),
        };

        let ctx = EventContext::default();
        assert_eq!(dispatcher.dispatch(&item, &ctx).await.expect("item"), HandlerResult::Processed);
        assert_eq!(dispatcher.dispatch(&form, &ctx).await.expect("form"), HandlerResult::Processed);
        assert_eq!(dispatcher.handler_count(), 2);
        assert_eq!(service.items.load(Ordering::SeqCst), 1);
        assert_eq!(service.forms.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dispatcher_returns_ignored_when_no_handler_registered() {
        let dispatcher = EventDispatcher::new();
        let envelope = ChatEnvelope {
            envelope_id: "env-3".to_owned(),
            event: ChatEvent::Unsupported { event_type: "userUpdated".to_owned() },
        };

        let result =
            dispatcher.dispatch(&envelope, &EventContext::default()).await.expect("dispatch");

        assert_eq!(result, HandlerResult::Ignored);
    }

    #[test]
    fn item_text_prefers_content_over_subject() {
        assert_eq!(item(Some("body"), Some("subject")).text(), Some("body"));
        assert_eq!(item(Some("  "), Some("subject")).text(), Some("subject"));
        assert_eq!(item(None, None).text(), None);
    }

    #[test]
    fn replies_thread_under_the_parent_item() {
        let mut event = item(Some("q"), None);
        assert_eq!(event.thread_root(), "I1");

        event.parent_item_id = Some("P1".to_owned());
        assert_eq!(event.thread_root(), "P1");
    }
}
