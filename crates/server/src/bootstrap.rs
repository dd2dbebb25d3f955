use std::sync::Arc;

use faqbot_chat::{
    ConversationCache, DispatchSettings, EventDispatcher, EventStreamRunner, FormRouter,
    FormSubmissionHandler, InMemoryChatPlatform, ItemAddedHandler, ModerationWorkflow,
    NoopEventTransport, PendingQuestionStore, QuestionDispatcher, ReconnectPolicy,
};
use faqbot_core::config::{AppConfig, ConfigError};
use faqbot_core::{ConversationId, ConversationType};
use faqbot_knowledge::{
    HttpKnowledgeClient, KnowledgeClient, KnowledgeError, KnowledgeSettings, SupportPageResolver,
};
use thiserror::Error;
use tracing::{info, warn};

pub struct Application {
    pub config: AppConfig,
    pub knowledge: Arc<HttpKnowledgeClient>,
    pub pending: Arc<PendingQuestionStore>,
    pub runner: EventStreamRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("knowledge client setup failed: {0}")]
    Knowledge(#[from] KnowledgeError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let top = config.dispatch.max_candidates;
    let settings = KnowledgeSettings::from_config(&config.knowledge, top);
    let knowledge = Arc::new(HttpKnowledgeClient::new(settings)?);
    let resolver = Arc::new(SupportPageResolver::new(&config.answers)?);

    let moderation_conversation = ConversationId(config.chat.moderation_conversation_id.clone());
    let platform = Arc::new(InMemoryChatPlatform::new());
    platform.add_conversation(moderation_conversation.as_str(), ConversationType::Group).await;

    let pending = Arc::new(PendingQuestionStore::new());
    let moderation = Arc::new(ModerationWorkflow::new(
        knowledge.clone(),
        resolver.clone(),
        platform.clone(),
        pending.clone(),
        moderation_conversation,
    ));
    let questions = Arc::new(QuestionDispatcher::new(
        knowledge.clone(),
        resolver,
        platform.clone(),
        Arc::new(ConversationCache::new(platform)),
        pending.clone(),
        moderation.clone(),
        DispatchSettings::from_config(&config),
    ));

    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(ItemAddedHandler::new(questions.clone()));
    dispatcher.register(FormSubmissionHandler::new(FormRouter::new(
        pending.clone(),
        questions,
        moderation,
    )));
    let runner = EventStreamRunner::new(
        Arc::new(NoopEventTransport),
        dispatcher,
        ReconnectPolicy::default(),
    );

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        transport_mode = "noop",
        "application wired"
    );
    Ok(Application { config, knowledge, pending, runner })
}

/// Builds the article index in the background. A failure leaves article
/// answers untaught until restart but does not stop the bot.
pub async fn load_article_index(knowledge: Arc<HttpKnowledgeClient>) {
    match knowledge.load_article_index().await {
        Ok(articles) => info!(
            event_name = "system.bootstrap.article_index_loaded",
            articles,
            "article index loaded"
        ),
        Err(error) => warn!(
            event_name = "system.bootstrap.article_index_failed",
            error = %error,
            "article index could not be loaded; teaching by article id is unavailable"
        ),
    }
}
