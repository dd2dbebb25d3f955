use faqbot_core::BotError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("could not build http client: {0}")]
    Client(String),
    #[error("{operation} request failed: {detail}")]
    Transport { operation: &'static str, detail: String },
    #[error("{operation} request timed out")]
    Timeout { operation: &'static str },
    #[error("{operation} returned HTTP {status}")]
    Status { operation: &'static str, status: u16 },
    #[error("{operation} response could not be decoded: {detail}")]
    Decode { operation: &'static str, detail: String },
    #[error("article `{0}` is not in the article index")]
    UnknownArticle(String),
    #[error("answer page for article `{0}` has no answer content")]
    ArticleNotFound(String),
    #[error("invalid content selector `{0}`")]
    InvalidSelector(String),
}

impl KnowledgeError {
    pub(crate) fn from_reqwest(operation: &'static str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            return Self::Timeout { operation };
        }
        if error.is_decode() {
            return Self::Decode { operation, detail: error.to_string() };
        }
        Self::Transport { operation, detail: error.to_string() }
    }
}

impl From<KnowledgeError> for BotError {
    fn from(error: KnowledgeError) -> Self {
        match error {
            KnowledgeError::UnknownArticle(article) => BotError::UnknownArticle(article),
            KnowledgeError::ArticleNotFound(article) => BotError::ArticleNotFound(article),
            other => BotError::UpstreamUnavailable(other.to_string()),
        }
    }
}
