use std::sync::Arc;

use async_trait::async_trait;
use faqbot_core::config::{AppConfig, AutoAnswerPolicy};
use faqbot_core::{
    AnswerCandidate, BotError, ConversationId, FormId, PendingQuestion, PendingStage,
    ThresholdPolicy,
};
use faqbot_knowledge::{resolve_answer, teach, AnswerResolver, KnowledgeClient, Lesson};
use tracing::{debug, info, warn};

use crate::blocks::{
    answer_message, apology_message, disambiguation_message, escalation_notice, CHOICE_FIELD,
    NONE_OF_THE_ABOVE,
};
use crate::conversations::ConversationCache;
use crate::events::{
    EventContext, EventHandlerError, FormSubmissionEvent, HandlerResult, ItemAddedEvent,
    ItemKind, ItemService,
};
use crate::mentions::{mentions_user, normalize_question};
use crate::moderation::ModerationWorkflow;
use crate::pending::PendingQuestionStore;
use crate::platform::ChatPlatform;

#[derive(Clone, Debug, PartialEq)]
pub struct DispatchSettings {
    pub bot_user_id: String,
    pub threshold: ThresholdPolicy,
    pub auto_answer: AutoAnswerPolicy,
    pub support_url: String,
}

impl DispatchSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            bot_user_id: config.chat.bot_user_id.clone(),
            threshold: config.dispatch.threshold(),
            auto_answer: config.dispatch.auto_answer,
            support_url: config.answers.support_url.clone(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    SelfAuthored,
    NotText,
    NoContent,
    NotMentioned,
    EmptyQuestion,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    Ignored(IgnoreReason),
    Answered,
    Disambiguating(FormId),
    Escalated(FormId),
    /// Moderation could not be reached; the notice was replaced by an apology.
    EscalationFailed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SelectionOutcome {
    Answered,
    Escalated(FormId),
    /// The choice did not match the form; the question stays open.
    Restored,
}

/// Per-message state machine: ignore, answer, offer a choice, or escalate.
pub struct QuestionDispatcher {
    knowledge: Arc<dyn KnowledgeClient>,
    resolver: Arc<dyn AnswerResolver>,
    platform: Arc<dyn ChatPlatform>,
    conversations: Arc<ConversationCache>,
    pending: Arc<PendingQuestionStore>,
    moderation: Arc<ModerationWorkflow>,
    settings: DispatchSettings,
}

impl QuestionDispatcher {
    pub fn new(
        knowledge: Arc<dyn KnowledgeClient>,
        resolver: Arc<dyn AnswerResolver>,
        platform: Arc<dyn ChatPlatform>,
        conversations: Arc<ConversationCache>,
        pending: Arc<PendingQuestionStore>,
        moderation: Arc<ModerationWorkflow>,
        settings: DispatchSettings,
    ) -> Self {
        Self { knowledge, resolver, platform, conversations, pending, moderation, settings }
    }

    pub async fn dispatch(&self, event: &ItemAddedEvent) -> Result<DispatchOutcome, BotError> {
        if event.creator_id == self.settings.bot_user_id {
            return Ok(DispatchOutcome::Ignored(IgnoreReason::SelfAuthored));
        }
        if event.kind != ItemKind::Text {
            return Ok(DispatchOutcome::Ignored(IgnoreReason::NotText));
        }
        let Some(content) = event.text() else {
            return Ok(DispatchOutcome::Ignored(IgnoreReason::NoContent));
        };

        let conversation_type = self.conversations.conversation_type(&event.conversation_id).await?;
        if conversation_type.requires_mention()
            && !mentions_user(content, &self.settings.bot_user_id)
        {
            return Ok(DispatchOutcome::Ignored(IgnoreReason::NotMentioned));
        }

        let question = normalize_question(content);
        if question.is_empty() {
            return Ok(DispatchOutcome::Ignored(IgnoreReason::EmptyQuestion));
        }

        let candidates = self.settings.threshold.apply(self.knowledge.ask(&question).await?);
        debug!(
            conversation_id = %event.conversation_id,
            item_id = %event.item_id,
            candidates = candidates.len(),
            "knowledge base candidates after threshold"
        );

        match candidates.len() {
            0 => self.escalate_unanswered(event, question).await,
            1 if self.settings.auto_answer == AutoAnswerPolicy::SingleCandidate => {
                self.answer_directly(event, &candidates[0]).await
            }
            _ => self.offer_candidates(event, question, candidates).await,
        }
    }

    async fn escalate_unanswered(
        &self,
        event: &ItemAddedEvent,
        question: String,
    ) -> Result<DispatchOutcome, BotError> {
        let notice = escalation_notice(&self.settings.support_url);
        let origin = self
            .platform
            .post_message(&event.conversation_id, Some(event.thread_root()), &notice)
            .await?;
        let pending = PendingQuestion::new(
            PendingStage::Moderation,
            question,
            event.creator_id.clone(),
            Vec::new(),
            origin.clone(),
        );

        match self.moderation.escalate(pending).await {
            Ok(form_id) => Ok(DispatchOutcome::Escalated(form_id)),
            Err(error) => {
                warn!(
                    event_name = "moderation.escalation_failed",
                    conversation_id = %event.conversation_id,
                    item_id = %event.item_id,
                    error = %error,
                    "could not escalate unanswered question"
                );
                let apology = apology_message(&error, &self.settings.support_url);
                self.platform.update_message(&origin, &apology).await?;
                Ok(DispatchOutcome::EscalationFailed)
            }
        }
    }

    async fn answer_directly(
        &self,
        event: &ItemAddedEvent,
        candidate: &AnswerCandidate,
    ) -> Result<DispatchOutcome, BotError> {
        let answer = resolve_answer(self.resolver.as_ref(), &candidate.answer_ref).await?;
        let reply = answer_message(answer);
        self.platform
            .post_message(&event.conversation_id, Some(event.thread_root()), &reply)
            .await?;
        Ok(DispatchOutcome::Answered)
    }

    async fn offer_candidates(
        &self,
        event: &ItemAddedEvent,
        question: String,
        candidates: Vec<AnswerCandidate>,
    ) -> Result<DispatchOutcome, BotError> {
        let form_id = FormId::generate();
        let message = disambiguation_message(&form_id, &candidates);
        let origin = self
            .platform
            .post_message(&event.conversation_id, Some(event.thread_root()), &message)
            .await?;

        // Submissions for this conversation queue behind the current event,
        // so registering after the post cannot miss one.
        let pending = PendingQuestion::with_form_id(
            form_id.clone(),
            PendingStage::Disambiguation,
            question,
            event.creator_id.clone(),
            candidates,
            origin,
        );
        self.pending
            .insert(pending)
            .await
            .map_err(|error| BotError::MalformedForm(error.to_string()))?;
        Ok(DispatchOutcome::Disambiguating(form_id))
    }

    /// Applies the asker's choice on a disambiguation form. The question is
    /// put back in the store when the choice cannot be applied.
    pub async fn handle_selection(
        &self,
        pending: PendingQuestion,
        submission: &FormSubmissionEvent,
    ) -> Result<SelectionOutcome, BotError> {
        let choice = submission.value(CHOICE_FIELD);
        if choice == Some(NONE_OF_THE_ABOVE) {
            return self.escalate_rejected_candidates(pending).await;
        }

        let selected = choice
            .and_then(|choice| choice.parse::<usize>().ok())
            .and_then(|index| pending.candidates().get(index))
            .cloned();
        let Some(candidate) = selected else {
            warn!(
                form_id = %pending.form_id,
                choice = choice.unwrap_or("none"),
                "selection does not match any offered candidate"
            );
            self.pending.restore(pending).await;
            return Ok(SelectionOutcome::Restored);
        };

        let shown = match resolve_answer(self.resolver.as_ref(), &candidate.answer_ref).await {
            Ok(answer) => {
                self.platform.update_message(&pending.origin, &answer_message(answer)).await
            }
            Err(error) => {
                self.pending.restore(pending).await;
                return Err(error.into());
            }
        };
        if let Err(error) = shown {
            self.pending.restore(pending).await;
            return Err(error.into());
        }

        self.teach_selection(&pending, &candidate).await;
        Ok(SelectionOutcome::Answered)
    }

    async fn escalate_rejected_candidates(
        &self,
        pending: PendingQuestion,
    ) -> Result<SelectionOutcome, BotError> {
        let escalated = pending.escalate(FormId::generate());
        let form_id = match self.moderation.escalate(escalated).await {
            Ok(form_id) => form_id,
            Err(error) => {
                self.pending.restore(pending).await;
                return Err(error);
            }
        };

        let notice = escalation_notice(&self.settings.support_url);
        if let Err(error) = self.platform.update_message(&pending.origin, &notice).await {
            warn!(form_id = %form_id, error = %error, "failed to show escalation notice");
        }
        Ok(SelectionOutcome::Escalated(form_id))
    }

    /// Teaches the question as another phrasing of the chosen answer. A
    /// failure is logged; the asker already has the answer.
    async fn teach_selection(&self, pending: &PendingQuestion, candidate: &AnswerCandidate) {
        let Some(target) = candidate.teach_target() else {
            debug!(form_id = %pending.form_id, "selected answer has no entry to teach");
            return;
        };

        let questions = vec![pending.question.clone()];
        let lesson = Lesson::AlternateQuestions { target, questions };
        if let Err(error) = teach(self.knowledge.as_ref(), lesson).await {
            warn!(
                event_name = "knowledge.teach.failed",
                form_id = %pending.form_id,
                error = %error,
                "failed to teach selected answer"
            );
        }
    }

    /// Posts the user-safe apology for a failure, threaded under `parent_item_id`.
    pub async fn apologize(
        &self,
        conversation_id: &ConversationId,
        parent_item_id: &str,
        error: &BotError,
    ) {
        let apology = apology_message(error, &self.settings.support_url);
        if let Err(post_error) =
            self.platform.post_message(conversation_id, Some(parent_item_id), &apology).await
        {
            warn!(
                conversation_id = %conversation_id,
                error = %post_error,
                "failed to post apology"
            );
        }
    }
}

#[async_trait]
impl ItemService for QuestionDispatcher {
    async fn handle_item(
        &self,
        event: &ItemAddedEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        match self.dispatch(event).await {
            Ok(DispatchOutcome::Ignored(reason)) => {
                debug!(
                    correlation_id = %ctx.correlation_id,
                    item_id = %event.item_id,
                    reason = ?reason,
                    "item ignored"
                );
                Ok(HandlerResult::Ignored)
            }
            Ok(outcome) => {
                info!(
                    event_name = "questions.dispatched",
                    correlation_id = %ctx.correlation_id,
                    conversation_id = %event.conversation_id,
                    item_id = %event.item_id,
                    outcome = ?outcome,
                    "question handled"
                );
                Ok(HandlerResult::Processed)
            }
            Err(error) => {
                warn!(
                    event_name = "questions.failed",
                    correlation_id = %ctx.correlation_id,
                    conversation_id = %event.conversation_id,
                    item_id = %event.item_id,
                    error = %error,
                    "question could not be answered"
                );
                self.apologize(&event.conversation_id, event.thread_root(), &error).await;
                Ok(HandlerResult::Processed)
            }
        }
    }
}
