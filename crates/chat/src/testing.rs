use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use faqbot_core::{AnswerCandidate, EntryRef};
use faqbot_knowledge::{AnswerResolver, KnowledgeClient, KnowledgeError};
use tokio::sync::Mutex;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum KnowledgeCall {
    Ask(String),
    Alternate { target: EntryRef, questions: Vec<String> },
    NewAnswer { questions: Vec<String>, answer: String, creator_id: String },
    Publish,
}

#[derive(Default)]
pub(crate) struct FakeKnowledge {
    candidates: Mutex<Vec<AnswerCandidate>>,
    known_articles: Vec<String>,
    fail_ask: AtomicBool,
    fail_teach: AtomicBool,
    calls: Mutex<Vec<KnowledgeCall>>,
}

impl FakeKnowledge {
    pub(crate) fn with_articles(articles: &[&str]) -> Self {
        Self {
            known_articles: articles.iter().map(|article| (*article).to_owned()).collect(),
            ..Self::default()
        }
    }

    pub(crate) async fn answer_with(&self, candidates: Vec<AnswerCandidate>) {
        *self.candidates.lock().await = candidates;
    }

    pub(crate) fn fail_ask(&self) {
        self.fail_ask.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_teach(&self) {
        self.fail_teach.store(true, Ordering::SeqCst);
    }

    pub(crate) async fn calls(&self) -> Vec<KnowledgeCall> {
        self.calls.lock().await.clone()
    }

    pub(crate) async fn teach_calls(&self) -> Vec<KnowledgeCall> {
        let calls = self.calls().await;
        calls.into_iter().filter(|call| !matches!(call, KnowledgeCall::Ask(_))).collect()
    }
}

#[async_trait]
impl KnowledgeClient for FakeKnowledge {
    async fn ask(&self, question: &str) -> Result<Vec<AnswerCandidate>, KnowledgeError> {
        self.calls.lock().await.push(KnowledgeCall::Ask(question.to_owned()));
        if self.fail_ask.load(Ordering::SeqCst) {
            return Err(KnowledgeError::Timeout { operation: "generate answer" });
        }
        Ok(self.candidates.lock().await.clone())
    }

    async fn add_alternate_questions(
        &self,
        target: &EntryRef,
        questions: &[String],
    ) -> Result<(), KnowledgeError> {
        if self.fail_teach.load(Ordering::SeqCst) {
            let operation = "add alternate questions";
            return Err(KnowledgeError::Status { operation, status: 500 });
        }
        if let EntryRef::ByArticle(article) = target {
            if !self.known_articles.contains(article) {
                return Err(KnowledgeError::UnknownArticle(article.clone()));
            }
        }
        self.calls.lock().await.push(KnowledgeCall::Alternate {
            target: target.clone(),
            questions: questions.to_vec(),
        });
        Ok(())
    }

    async fn add_new_answer(
        &self,
        questions: &[String],
        answer: &str,
        creator_id: &str,
    ) -> Result<u64, KnowledgeError> {
        if self.fail_teach.load(Ordering::SeqCst) {
            return Err(KnowledgeError::Status { operation: "add new answer", status: 500 });
        }
        self.calls.lock().await.push(KnowledgeCall::NewAnswer {
            questions: questions.to_vec(),
            answer: answer.to_owned(),
            creator_id: creator_id.to_owned(),
        });
        Ok(1_700_000_000)
    }

    async fn publish(&self) -> Result<(), KnowledgeError> {
        self.calls.lock().await.push(KnowledgeCall::Publish);
        Ok(())
    }

    async fn load_article_index(&self) -> Result<usize, KnowledgeError> {
        Ok(self.known_articles.len())
    }
}

#[derive(Default)]
pub(crate) struct FakeResolver {
    pages: HashMap<String, String>,
}

impl FakeResolver {
    pub(crate) fn with_pages(pages: &[(&str, &str)]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|(article, html)| ((*article).to_owned(), (*html).to_owned()))
                .collect(),
        }
    }
}

#[async_trait]
impl AnswerResolver for FakeResolver {
    async fn lookup(&self, article_id: &str) -> Result<String, KnowledgeError> {
        self.pages
            .get(article_id)
            .cloned()
            .ok_or_else(|| KnowledgeError::ArticleNotFound(article_id.to_owned()))
    }
}
