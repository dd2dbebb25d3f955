use std::sync::Arc;

use faqbot_core::{AnswerRef, BotError, ConversationId, EntryRef, FormId, PendingQuestion};
use faqbot_knowledge::{resolve_answer, teach, AnswerResolver, KnowledgeClient, Lesson};
use tracing::{info, warn};

use crate::blocks::{
    answer_message, moderation_closed_message, moderation_request_message,
    moderator_error_message, not_relevant_message, ACTION_FIELD, ANSWER_FIELD, ARTICLE_ID_FIELD,
    BETTER_QUESTION_FIELD, REJECT_ACTION, SUBMIT_ACTION,
};
use crate::events::FormSubmissionEvent;
use crate::pending::PendingQuestionStore;
use crate::platform::ChatPlatform;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModerationOutcome {
    Rejected,
    Answered,
    /// The submission could not be applied. The moderator was told why and
    /// the form is open again.
    Restored(BotError),
}

/// Moderator-facing half of the bot: posts moderation forms and applies
/// their submissions.
pub struct ModerationWorkflow {
    knowledge: Arc<dyn KnowledgeClient>,
    resolver: Arc<dyn AnswerResolver>,
    platform: Arc<dyn ChatPlatform>,
    pending: Arc<PendingQuestionStore>,
    moderation_conversation: ConversationId,
}

impl ModerationWorkflow {
    pub fn new(
        knowledge: Arc<dyn KnowledgeClient>,
        resolver: Arc<dyn AnswerResolver>,
        platform: Arc<dyn ChatPlatform>,
        pending: Arc<PendingQuestionStore>,
        moderation_conversation: ConversationId,
    ) -> Self {
        Self { knowledge, resolver, platform, pending, moderation_conversation }
    }

    /// Registers the question and posts its moderation form. The entry exists
    /// before the form is visible, so an immediate submission finds it.
    pub async fn escalate(&self, pending: PendingQuestion) -> Result<FormId, BotError> {
        let form_id = pending.form_id.clone();
        let message = moderation_request_message(&pending);
        self.pending
            .insert(pending)
            .await
            .map_err(|error| BotError::MalformedForm(error.to_string()))?;

        let conversation = &self.moderation_conversation;
        let posted = match self.platform.post_message(conversation, None, &message).await {
            Ok(posted) => posted,
            Err(error) => {
                self.pending.take(&form_id).await;
                return Err(error.into());
            }
        };
        self.pending.record_moderation_message(&form_id, posted).await;

        info!(
            event_name = "moderation.escalated",
            form_id = %form_id,
            conversation_id = %self.moderation_conversation,
            "question escalated to moderators"
        );
        Ok(form_id)
    }

    /// Applies a moderation form submission to a question already taken from
    /// the store. Failures are reported to the moderator and the question is
    /// put back.
    pub async fn handle_submission(
        &self,
        pending: PendingQuestion,
        submission: &FormSubmissionEvent,
    ) -> ModerationOutcome {
        let result = match submission.value(ACTION_FIELD) {
            Some(REJECT_ACTION) => self.reject(&pending).await,
            Some(SUBMIT_ACTION) => self.accept(&pending, submission).await,
            Some(other) => Err(BotError::MalformedForm(format!("unknown action `{other}`"))),
            None => Err(BotError::MalformedForm("no action was selected".to_owned())),
        };

        match result {
            Ok(outcome) => {
                info!(
                    event_name = "moderation.resolved",
                    form_id = %pending.form_id,
                    moderator_id = %submission.submitter_id,
                    outcome = ?outcome,
                    "moderation form resolved"
                );
                outcome
            }
            Err(error) => {
                warn!(
                    event_name = "moderation.submission_rejected",
                    form_id = %pending.form_id,
                    moderator_id = %submission.submitter_id,
                    error = %error,
                    "moderation submission not applied; question restored"
                );
                self.notify_moderator(&pending, &error).await;
                self.pending.restore(pending).await;
                ModerationOutcome::Restored(error)
            }
        }
    }

    async fn reject(&self, pending: &PendingQuestion) -> Result<ModerationOutcome, BotError> {
        self.platform.update_message(&pending.origin, &not_relevant_message()).await?;
        self.close_moderation_message(pending, "Marked as not relevant.").await;
        Ok(ModerationOutcome::Rejected)
    }

    async fn accept(
        &self,
        pending: &PendingQuestion,
        submission: &FormSubmissionEvent,
    ) -> Result<ModerationOutcome, BotError> {
        let mut questions = vec![pending.question.clone()];
        if let Some(better) = submission.value(BETTER_QUESTION_FIELD) {
            if better != pending.question {
                questions.push(better.to_owned());
            }
        }

        let (answer, outcome) = if let Some(article_id) = submission.value(ARTICLE_ID_FIELD) {
            let answer =
                resolve_answer(self.resolver.as_ref(), &AnswerRef::Article(article_id.to_owned()))
                    .await?;
            let target = EntryRef::ByArticle(article_id.to_owned());
            teach(self.knowledge.as_ref(), Lesson::AlternateQuestions { target, questions })
                .await?;
            (answer, format!("Answered with article {article_id}."))
        } else if let Some(answer) = submission.value(ANSWER_FIELD) {
            let lesson = Lesson::NewAnswer {
                questions,
                answer: answer.to_owned(),
                creator_id: submission.submitter_id.clone(),
            };
            teach(self.knowledge.as_ref(), lesson).await?;
            (answer.to_owned(), "Answered with a new answer.".to_owned())
        } else {
            return Err(BotError::MalformedForm(
                "enter a support article ID or an answer text".to_owned(),
            ));
        };

        // Already taught at this point, so a failed update does not reopen the form.
        let reply = answer_message(answer);
        if let Err(error) = self.platform.update_message(&pending.origin, &reply).await {
            warn!(
                form_id = %pending.form_id,
                error = %error,
                "failed to show moderated answer to the asker"
            );
        }
        self.close_moderation_message(pending, &outcome).await;
        Ok(ModerationOutcome::Answered)
    }

    async fn close_moderation_message(&self, pending: &PendingQuestion, outcome: &str) {
        let Some(message) = &pending.moderation_message else {
            return;
        };
        let closed = moderation_closed_message(&pending.question, outcome);
        if let Err(error) = self.platform.update_message(message, &closed).await {
            warn!(form_id = %pending.form_id, error = %error, "failed to close moderation form");
        }
    }

    async fn notify_moderator(&self, pending: &PendingQuestion, error: &BotError) {
        let parent = pending.moderation_message.as_ref().map(|message| message.item_id.as_str());
        let reply = moderator_error_message(error);
        if let Err(post_error) =
            self.platform.post_message(&self.moderation_conversation, parent, &reply).await
        {
            warn!(
                form_id = %pending.form_id,
                error = %post_error,
                "failed to tell the moderator about a rejected submission"
            );
        }
    }
}
