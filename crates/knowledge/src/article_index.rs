use std::collections::HashMap;

use crate::client::QnaDocument;

/// Maps support-article identifiers onto knowledge-base entry ids.
///
/// Built once from the entries created by the FAQ article import, whose
/// answer text is the bare article identifier. Never mutated afterwards.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArticleIndex {
    entries: HashMap<String, u64>,
}

impl ArticleIndex {
    pub fn from_documents(documents: &[QnaDocument], import_source: &str) -> Self {
        let entries = documents
            .iter()
            .filter(|document| document.source == import_source)
            .map(|document| (document.answer.trim().to_owned(), document.id))
            .collect();
        Self { entries }
    }

    pub fn entry_id(&self, article_id: &str) -> Option<u64> {
        self.entries.get(article_id.trim()).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
