use thiserror::Error;

/// Failure taxonomy shared by the question and moderation paths.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BotError {
    #[error("upstream service unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("article `{0}` is not known to the knowledge base")]
    UnknownArticle(String),
    #[error("answer content for article `{0}` was not found")]
    ArticleNotFound(String),
    #[error("malformed form submission: {0}")]
    MalformedForm(String),
}

/// Who should be told about a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Audience {
    Asker,
    Moderator,
}

impl BotError {
    pub fn audience(&self) -> Audience {
        match self {
            Self::UpstreamUnavailable(_) | Self::ArticleNotFound(_) => Audience::Asker,
            Self::UnknownArticle(_) | Self::MalformedForm(_) => Audience::Moderator,
        }
    }

    /// Text that is safe to show to the person who asked the question.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::UpstreamUnavailable(_) | Self::ArticleNotFound(_) => {
                "There was an error processing your request."
            }
            Self::UnknownArticle(_) | Self::MalformedForm(_) => {
                "Your question could not be processed right now."
            }
        }
    }

    pub fn moderator_message(&self) -> String {
        match self {
            Self::UnknownArticle(article) => format!(
                "Article ID {article} is not supported. It may be a newly added article; \
                 enter the answer text instead."
            ),
            Self::MalformedForm(detail) => {
                format!("The submission was not applied: {detail}. Please submit the form again.")
            }
            Self::UpstreamUnavailable(detail) => {
                format!("The knowledge base is unavailable ({detail}). Please try again later.")
            }
            Self::ArticleNotFound(article) => {
                format!("Article {article} has no readable answer content.")
            }
        }
    }

    /// `ArticleNotFound` is reported to users exactly like an outage.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable(_) | Self::ArticleNotFound(_))
    }
}
