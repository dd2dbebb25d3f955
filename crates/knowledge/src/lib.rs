//! Knowledge-base access for the FAQ bot: the hosted Q&A service client,
//! the article-identifier index, and the support-page answer resolver with
//! its markup normalizer.

pub mod article_index;
pub mod client;
pub mod errors;
pub mod markup;
pub mod resolver;

pub use article_index::ArticleIndex;
pub use client::{
    teach, HttpKnowledgeClient, KnowledgeClient, KnowledgeEnvironment, KnowledgeSettings, Lesson,
    QnaDocument,
};
pub use errors::KnowledgeError;
pub use markup::normalize_markup;
pub use resolver::{resolve_answer, AnswerResolver, SupportPageResolver};
