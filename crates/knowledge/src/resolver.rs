use std::time::Duration;

use async_trait::async_trait;
use faqbot_core::config::AnswersConfig;
use faqbot_core::AnswerRef;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::errors::KnowledgeError;
use crate::markup::normalize_markup;

#[async_trait]
pub trait AnswerResolver: Send + Sync {
    /// Display-ready answer HTML for a support article.
    async fn lookup(&self, article_id: &str) -> Result<String, KnowledgeError>;
}

/// Turns any answer reference into display text. Direct answers are returned
/// as stored; articles go through the resolver.
pub async fn resolve_answer(
    resolver: &dyn AnswerResolver,
    answer: &AnswerRef,
) -> Result<String, KnowledgeError> {
    match answer {
        AnswerRef::Text(text) => Ok(text.clone()),
        AnswerRef::Article(article_id) => resolver.lookup(article_id).await,
    }
}

/// Scrapes the public support page of an article. The answer body is the
/// first `div` following the content anchor.
pub struct SupportPageResolver {
    http: Client,
    base_url: String,
    article_path: String,
    content_anchor: String,
}

impl SupportPageResolver {
    pub fn new(config: &AnswersConfig) -> Result<Self, KnowledgeError> {
        Selector::parse(&config.content_anchor)
            .map_err(|_| KnowledgeError::InvalidSelector(config.content_anchor.clone()))?;

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| KnowledgeError::Client(error.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            article_path: config.article_path.clone(),
            content_anchor: config.content_anchor.clone(),
        })
    }

    fn extract(&self, article_id: &str, page: &str) -> Result<String, KnowledgeError> {
        let selector = Selector::parse(&self.content_anchor)
            .map_err(|_| KnowledgeError::InvalidSelector(self.content_anchor.clone()))?;
        let document = Html::parse_document(page);

        let body = document
            .select(&selector)
            .next()
            .and_then(|anchor| {
                anchor
                    .next_siblings()
                    .filter_map(ElementRef::wrap)
                    .find(|element| element.value().name() == "div")
            })
            .ok_or_else(|| KnowledgeError::ArticleNotFound(article_id.to_owned()))?;

        Ok(normalize_markup(&body.inner_html(), &self.base_url))
    }
}

#[async_trait]
impl AnswerResolver for SupportPageResolver {
    async fn lookup(&self, article_id: &str) -> Result<String, KnowledgeError> {
        let url = format!("{}{}{}", self.base_url, self.article_path, article_id);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|error| KnowledgeError::from_reqwest("article page", error))?;

        let status = response.status();
        if !status.is_success() {
            let status = status.as_u16();
            return Err(KnowledgeError::Status { operation: "article page", status });
        }

        let page = response
            .text()
            .await
            .map_err(|error| KnowledgeError::from_reqwest("article page", error))?;
        debug!(article_id, bytes = page.len(), "article page fetched");

        self.extract(article_id, &page)
    }
}
