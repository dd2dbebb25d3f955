use std::sync::Arc;

use async_trait::async_trait;
use faqbot_core::PendingStage;
use tracing::{info, warn};

use crate::events::{
    EventContext, EventHandlerError, FormService, FormSubmissionEvent, HandlerResult,
};
use crate::moderation::ModerationWorkflow;
use crate::pending::PendingQuestionStore;
use crate::questions::QuestionDispatcher;

/// Routes form submissions to the flow that posted the form, by the stage
/// recorded on the pending question.
pub struct FormRouter {
    pending: Arc<PendingQuestionStore>,
    questions: Arc<QuestionDispatcher>,
    moderation: Arc<ModerationWorkflow>,
}

impl FormRouter {
    pub fn new(
        pending: Arc<PendingQuestionStore>,
        questions: Arc<QuestionDispatcher>,
        moderation: Arc<ModerationWorkflow>,
    ) -> Self {
        Self { pending, questions, moderation }
    }
}

#[async_trait]
impl FormService for FormRouter {
    async fn handle_form_submission(
        &self,
        event: &FormSubmissionEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let Some(pending) = self.pending.take(&event.form_id).await else {
            info!(
                correlation_id = %ctx.correlation_id,
                form_id = %event.form_id,
                submitter_id = %event.submitter_id,
                "form is unknown or already resolved; ignoring submission"
            );
            return Ok(HandlerResult::Ignored);
        };

        match pending.stage {
            PendingStage::Disambiguation => {
                let origin = pending.origin.clone();
                match self.questions.handle_selection(pending, event).await {
                    Ok(outcome) => {
                        info!(
                            event_name = "forms.selection_applied",
                            correlation_id = %ctx.correlation_id,
                            form_id = %event.form_id,
                            outcome = ?outcome,
                            "disambiguation form resolved"
                        );
                    }
                    Err(error) => {
                        warn!(
                            event_name = "forms.selection_failed",
                            correlation_id = %ctx.correlation_id,
                            form_id = %event.form_id,
                            error = %error,
                            "disambiguation selection failed"
                        );
                        self.questions
                            .apologize(&origin.conversation_id, &origin.item_id, &error)
                            .await;
                    }
                }
            }
            PendingStage::Moderation => {
                let outcome = self.moderation.handle_submission(pending, event).await;
                info!(
                    correlation_id = %ctx.correlation_id,
                    form_id = %event.form_id,
                    outcome = ?outcome,
                    "moderation submission handled"
                );
            }
        }

        Ok(HandlerResult::Processed)
    }
}
