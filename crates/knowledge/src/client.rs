use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use faqbot_core::config::KnowledgeConfig;
use faqbot_core::{AnswerCandidate, AnswerRef, EntryRef};
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::article_index::ArticleIndex;
use crate::errors::KnowledgeError;

const NEW_ANSWER_SOURCE: &str = "admin-bot";

#[async_trait]
pub trait KnowledgeClient: Send + Sync {
    /// Scored candidates for a question, in service order. Empty when the
    /// service has no match.
    async fn ask(&self, question: &str) -> Result<Vec<AnswerCandidate>, KnowledgeError>;

    async fn add_alternate_questions(
        &self,
        target: &EntryRef,
        questions: &[String],
    ) -> Result<(), KnowledgeError>;

    /// Creates a new entry and returns its id.
    async fn add_new_answer(
        &self,
        questions: &[String],
        answer: &str,
        creator_id: &str,
    ) -> Result<u64, KnowledgeError>;

    /// Promotes staged edits to the serving index. Edits are not queryable
    /// until the service has finished indexing, which can outlast this call.
    async fn publish(&self) -> Result<(), KnowledgeError>;

    /// Builds the article index. Returns the number of indexed articles.
    async fn load_article_index(&self) -> Result<usize, KnowledgeError>;
}

/// A single teach operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Lesson {
    AlternateQuestions { target: EntryRef, questions: Vec<String> },
    NewAnswer { questions: Vec<String>, answer: String, creator_id: String },
}

/// Applies a lesson and publishes it right away.
pub async fn teach(client: &dyn KnowledgeClient, lesson: Lesson) -> Result<(), KnowledgeError> {
    match &lesson {
        Lesson::AlternateQuestions { target, questions } => {
            client.add_alternate_questions(target, questions).await?;
        }
        Lesson::NewAnswer { questions, answer, creator_id } => {
            let entry_id = client.add_new_answer(questions, answer, creator_id).await?;
            debug!(entry_id, "new knowledge-base entry staged");
        }
    }

    client.publish().await?;
    info!(event_name = "knowledge.teach.published", lesson = ?lesson, "knowledge base taught");
    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KnowledgeEnvironment {
    Test,
    Prod,
}

impl KnowledgeEnvironment {
    /// The index `ask` queries: the staged one when testing, else the published one.
    pub fn queried(query_test_index: bool) -> Self {
        if query_test_index {
            Self::Test
        } else {
            Self::Prod
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Test => "Test",
            Self::Prod => "Prod",
        }
    }
}

#[derive(Clone, Debug)]
pub struct KnowledgeSettings {
    pub runtime_url: String,
    pub management_url: String,
    pub knowledge_base_id: String,
    pub endpoint_key: SecretString,
    pub subscription_key: SecretString,
    pub timeout: Duration,
    /// Wait before publishing so the service has staged the preceding edit.
    pub publish_delay: Duration,
    pub import_source: String,
    pub query_test_index: bool,
    pub top: usize,
}

impl KnowledgeSettings {
    pub fn from_config(config: &KnowledgeConfig, top: usize) -> Self {
        Self {
            runtime_url: config.runtime_url.trim_end_matches('/').to_owned(),
            management_url: config.management_url.trim_end_matches('/').to_owned(),
            knowledge_base_id: config.knowledge_base_id.clone(),
            endpoint_key: config.endpoint_key.clone(),
            subscription_key: config.subscription_key.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            publish_delay: Duration::from_millis(config.publish_delay_ms),
            import_source: config.import_source.clone(),
            query_test_index: config.query_test_index,
            top,
        }
    }
}

/// Entry of a knowledge-base download.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QnaDocument {
    pub id: u64,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub questions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateAnswerResponse {
    #[serde(default)]
    answers: Vec<ServiceAnswer>,
}

#[derive(Debug, Deserialize)]
struct ServiceAnswer {
    #[serde(default)]
    questions: Vec<String>,
    #[serde(default)]
    answer: String,
    #[serde(default)]
    score: f64,
    id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DownloadResponse {
    #[serde(default)]
    qna_documents: Vec<QnaDocument>,
}

pub struct HttpKnowledgeClient {
    http: Client,
    settings: KnowledgeSettings,
    article_index: OnceLock<ArticleIndex>,
}

impl HttpKnowledgeClient {
    pub fn new(settings: KnowledgeSettings) -> Result<Self, KnowledgeError> {
        let http = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|error| KnowledgeError::Client(error.to_string()))?;
        Ok(Self { http, settings, article_index: OnceLock::new() })
    }

    /// Downloads every entry of the given index.
    pub async fn download(
        &self,
        environment: KnowledgeEnvironment,
    ) -> Result<Vec<QnaDocument>, KnowledgeError> {
        let url = format!("{}/{}/qna", self.knowledge_base_url(), environment.as_str());
        let request = self.management(self.http.get(url));
        let response = send("download", request).await?;
        let body: DownloadResponse = response
            .json()
            .await
            .map_err(|error| KnowledgeError::from_reqwest("download", error))?;
        Ok(body.qna_documents)
    }

    pub fn article_index(&self) -> Option<&ArticleIndex> {
        self.article_index.get()
    }

    fn knowledge_base_url(&self) -> String {
        let settings = &self.settings;
        format!("{}/knowledgebases/{}", settings.management_url, settings.knowledge_base_id)
    }

    fn management(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("Ocp-Apim-Subscription-Key", self.settings.subscription_key.expose_secret())
    }

    fn resolve_entry(&self, target: &EntryRef) -> Result<u64, KnowledgeError> {
        match target {
            EntryRef::ById(id) => Ok(*id),
            EntryRef::ByArticle(article_id) => self
                .article_index
                .get()
                .and_then(|index| index.entry_id(article_id))
                .ok_or_else(|| KnowledgeError::UnknownArticle(article_id.clone())),
        }
    }
}

#[async_trait]
impl KnowledgeClient for HttpKnowledgeClient {
    async fn ask(&self, question: &str) -> Result<Vec<AnswerCandidate>, KnowledgeError> {
        let url = format!(
            "{}/knowledgebases/{}/generateAnswer",
            self.settings.runtime_url, self.settings.knowledge_base_id
        );
        let body = json!({
            "question": question,
            "top": self.settings.top,
            "isTest": self.settings.query_test_index,
        });
        let request = self
            .http
            .post(url)
            .header(
                "Authorization",
                format!("EndpointKey {}", self.settings.endpoint_key.expose_secret()),
            )
            .json(&body);

        let response = send("generate answer", request).await?;
        let payload: GenerateAnswerResponse = response
            .json()
            .await
            .map_err(|error| KnowledgeError::from_reqwest("generate answer", error))?;

        let candidates: Vec<AnswerCandidate> = payload
            .answers
            .into_iter()
            .filter_map(|answer| {
                // Negative ids mark the service's "no good match" placeholder.
                let entry_id = u64::try_from(answer.id).ok()?;
                let representative = answer.questions.into_iter().next().unwrap_or_default();
                let answer_ref = AnswerRef::from_service_answer(&answer.answer);
                Some(
                    AnswerCandidate::new(answer_ref, answer.score, representative)
                        .with_entry_id(entry_id),
                )
            })
            .collect();

        debug!(candidates = candidates.len(), "knowledge base answered");
        Ok(candidates)
    }

    async fn add_alternate_questions(
        &self,
        target: &EntryRef,
        questions: &[String],
    ) -> Result<(), KnowledgeError> {
        let entry_id = self.resolve_entry(target)?;
        let body = json!({
            "update": {
                "qnaList": [{
                    "id": entry_id,
                    "questions": { "add": questions },
                }],
            },
        });

        let request = self.management(self.http.patch(self.knowledge_base_url())).json(&body);
        send("add alternate questions", request).await?;
        info!(
            event_name = "knowledge.alternate_questions.added",
            entry_id,
            questions = questions.len(),
            "alternate questions staged"
        );
        Ok(())
    }

    async fn add_new_answer(
        &self,
        questions: &[String],
        answer: &str,
        creator_id: &str,
    ) -> Result<u64, KnowledgeError> {
        let entry_id = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
        let body = json!({
            "add": {
                "qnaList": [{
                    "id": entry_id,
                    "answer": answer,
                    "questions": questions,
                    "source": NEW_ANSWER_SOURCE,
                    "metadata": [{ "name": "creator", "value": creator_id }],
                }],
            },
        });

        let request = self.management(self.http.patch(self.knowledge_base_url())).json(&body);
        send("add new answer", request).await?;
        info!(
            event_name = "knowledge.answer.added",
            entry_id,
            creator_id,
            "new answer staged"
        );
        Ok(entry_id)
    }

    async fn publish(&self) -> Result<(), KnowledgeError> {
        if !self.settings.publish_delay.is_zero() {
            tokio::time::sleep(self.settings.publish_delay).await;
        }

        let request = self.management(self.http.post(self.knowledge_base_url()));
        send("publish", request).await?;
        info!(event_name = "knowledge.published", "knowledge base published");
        Ok(())
    }

    async fn load_article_index(&self) -> Result<usize, KnowledgeError> {
        if let Some(index) = self.article_index.get() {
            return Ok(index.len());
        }

        let environment = KnowledgeEnvironment::queried(self.settings.query_test_index);
        let documents = self.download(environment).await?;
        let index = ArticleIndex::from_documents(&documents, &self.settings.import_source);
        let indexed = index.len();
        if self.article_index.set(index).is_err() {
            warn!("article index was initialized concurrently; keeping the first one");
        }

        info!(
            event_name = "knowledge.article_index.loaded",
            documents = documents.len(),
            articles = indexed,
            "article index loaded"
        );
        Ok(indexed)
    }
}

async fn send(
    operation: &'static str,
    request: RequestBuilder,
) -> Result<Response, KnowledgeError> {
    let response =
        request.send().await.map_err(|error| KnowledgeError::from_reqwest(operation, error))?;

    let status = response.status();
    if !status.is_success() {
        warn!(operation, status = %status, "knowledge service request failed");
        return Err(KnowledgeError::Status { operation, status: status.as_u16() });
    }

    Ok(response)
}
