//! Mention parsing and question clean-up for rich-text items.
//!
//! Mentions arrive as `<span class="mention" abbr="{user id}">@Name</span>`.

use std::sync::OnceLock;

use html2text::render::text_renderer::TrivialDecorator;
use regex::Regex;
use scraper::{Html, Selector};

const TEXT_WIDTH: usize = 10_000;

/// User ids mentioned in a rich-text body, in order of appearance.
pub fn mentioned_user_ids(content: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse("span.mention[abbr]") else {
        return Vec::new();
    };

    let fragment = Html::parse_fragment(content);
    let mut ids: Vec<String> = Vec::new();
    for mention in fragment.select(&selector) {
        if let Some(user_id) = mention.value().attr("abbr").map(str::trim) {
            if !user_id.is_empty() && !ids.iter().any(|known| known == user_id) {
                ids.push(user_id.to_owned());
            }
        }
    }
    ids
}

pub fn mentions_user(content: &str, user_id: &str) -> bool {
    mentioned_user_ids(content).iter().any(|mentioned| mentioned == user_id)
}

/// Plain-text question: mention spans removed, markup converted to text and
/// whitespace collapsed.
pub fn normalize_question(content: &str) -> String {
    static SPAN: OnceLock<Option<Regex>> = OnceLock::new();
    let span = SPAN.get_or_init(|| Regex::new(r"<span[^>]*>[^<]+</span>").ok());
    let without_mentions = match span {
        Some(span) => span.replace_all(content, "").into_owned(),
        None => content.to_owned(),
    };

    let text = html2text::from_read_with_decorator(
        without_mentions.as_bytes(),
        TEXT_WIDTH,
        TrivialDecorator::new(),
    );
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
