use serde::{Deserialize, Serialize};

/// Where the displayable answer for a candidate comes from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AnswerRef {
    /// Answer text stored verbatim in the knowledge base.
    Text(String),
    /// Identifier of a support article whose page holds the answer.
    Article(String),
}

impl AnswerRef {
    /// Knowledge-base answers made only of ASCII digits are article identifiers
    /// from the FAQ import; everything else is answer text.
    pub fn from_service_answer(answer: &str) -> Self {
        let trimmed = answer.trim();
        if !trimmed.is_empty() && trimmed.bytes().all(|byte| byte.is_ascii_digit()) {
            Self::Article(trimmed.to_owned())
        } else {
            Self::Text(answer.to_owned())
        }
    }

    pub fn article_id(&self) -> Option<&str> {
        match self {
            Self::Article(id) => Some(id),
            Self::Text(_) => None,
        }
    }
}

/// Target of a teach call: an entry known by its numeric id, or an article
/// identifier that still has to be mapped onto one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum EntryRef {
    ById(u64),
    ByArticle(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnswerCandidate {
    pub answer_ref: AnswerRef,
    pub score: f64,
    pub representative_question: String,
    /// Numeric knowledge-base id, when the service reported one.
    pub entry_id: Option<u64>,
}

impl AnswerCandidate {
    pub fn new(
        answer_ref: AnswerRef,
        score: f64,
        representative_question: impl Into<String>,
    ) -> Self {
        Self {
            answer_ref,
            score,
            representative_question: representative_question.into(),
            entry_id: None,
        }
    }

    pub fn with_entry_id(mut self, entry_id: u64) -> Self {
        self.entry_id = Some(entry_id);
        self
    }

    /// Prefers the numeric id and falls back to the article identifier.
    pub fn teach_target(&self) -> Option<EntryRef> {
        if let Some(id) = self.entry_id {
            return Some(EntryRef::ById(id));
        }
        self.answer_ref.article_id().map(|article| EntryRef::ByArticle(article.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::{AnswerCandidate, AnswerRef, EntryRef};

    #[test]
    fn digit_only_answers_are_article_identifiers() {
        assert_eq!(
            AnswerRef::from_service_answer(" 104233 "),
            AnswerRef::Article("104233".to_owned())
        );
        assert_eq!(
            AnswerRef::from_service_answer("Open <b>Settings</b>"),
            AnswerRef::Text("Open <b>Settings</b>".to_owned())
        );
        assert_eq!(AnswerRef::from_service_answer(""), AnswerRef::Text(String::new()));
    }

    #[test]
    fn teach_target_prefers_numeric_entry_id() {
        let by_id =
            AnswerCandidate::new(AnswerRef::Article("77".to_owned()), 50.0, "q").with_entry_id(12);
        assert_eq!(by_id.teach_target(), Some(EntryRef::ById(12)));

        let by_article = AnswerCandidate::new(AnswerRef::Article("77".to_owned()), 50.0, "q");
        assert_eq!(by_article.teach_target(), Some(EntryRef::ByArticle("77".to_owned())));

        let text_only = AnswerCandidate::new(AnswerRef::Text("hi".to_owned()), 50.0, "q");
        assert_eq!(text_only.teach_target(), None);
    }
}
