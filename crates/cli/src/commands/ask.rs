use faqbot_core::config::{AppConfig, LoadOptions};
use faqbot_core::AnswerCandidate;
use faqbot_knowledge::{HttpKnowledgeClient, KnowledgeClient, KnowledgeSettings};
use serde::Serialize;

use super::CommandResult;

const COMMAND: &str = "ask";

#[derive(Debug, Serialize)]
struct AskReport {
    question: String,
    /// Number of candidates the service returned before thresholding.
    returned: usize,
    candidates: Vec<AnswerCandidate>,
}

/// Queries the knowledge base the way the bot does and reports the candidates
/// that would be offered to the asker.
pub fn run(question: &str) -> CommandResult {
    let question = question.trim();
    if question.is_empty() {
        return CommandResult::failure(COMMAND, "invalid_input", "question must not be empty", 2);
    }

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(COMMAND, "config_validation", error.to_string(), 2)
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                1,
            )
        }
    };

    let threshold = config.dispatch.threshold();
    let settings = KnowledgeSettings::from_config(&config.knowledge, threshold.max_candidates);
    let result = runtime.block_on(async {
        let client = HttpKnowledgeClient::new(settings)?;
        client.ask(question).await
    });

    match result {
        Ok(candidates) => {
            let returned = candidates.len();
            let report = AskReport {
                question: question.to_owned(),
                returned,
                candidates: threshold.apply(candidates),
            };
            CommandResult::success(COMMAND, report)
        }
        Err(error) => {
            CommandResult::failure(COMMAND, "knowledge_unavailable", error.to_string(), 1)
        }
    }
}
